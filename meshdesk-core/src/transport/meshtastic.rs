use anyhow::{Context, Result};
use async_trait::async_trait;
use meshtastic::Message as ProstMessage;
use meshtastic::api::state::Configured;
use meshtastic::api::{ConnectedStreamApi, StreamApi};
use meshtastic::packet::{PacketDestination, PacketReceiver, PacketRouter};
use meshtastic::protobufs;
use meshtastic::types::NodeId;
use meshtastic::utils;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    AppPort, BROADCAST_ADDR, DiscoveredDevice, EventSink, TextPacket, Transport, TransportEvent,
};
use crate::config::{ModemPreset, RadioConfig};
use crate::node::{NodeKey, NodeMetrics, NodeUpdate, PositionFix, UserInfo};
use crate::telemetry::TelemetryReading;

#[cfg(feature = "bluetooth")]
const BLE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport over a Meshtastic radio reached by BLE, TCP, or serial port
#[derive(Debug, Default, Clone, Copy)]
pub struct MeshtasticTransport;

impl MeshtasticTransport {
    pub fn new() -> Self {
        Self
    }
}

/// An open, configured radio link
pub struct RadioLink {
    api: Mutex<Option<ConnectedStreamApi<Configured>>>,
    packets: Mutex<Option<PacketReceiver>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

/// How a device address is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp:host:port`
    Tcp(String),
    /// `/dev/...` or `COMn`
    Serial(String),
    /// BLE MAC address or advertised name
    Ble(String),
}

impl Endpoint {
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        if let Some(host) = address.strip_prefix("tcp:") {
            Endpoint::Tcp(host.to_string())
        } else if address.starts_with("/dev/") || address.to_ascii_uppercase().starts_with("COM")
        {
            Endpoint::Serial(address.to_string())
        } else {
            Endpoint::Ble(address.to_string())
        }
    }
}

/// Router used for outbound sends; inbound packets arrive on the receiver
struct LinkRouter;

impl PacketRouter<(), std::convert::Infallible> for LinkRouter {
    fn handle_packet_from_radio(
        &mut self,
        _packet: protobufs::FromRadio,
    ) -> std::result::Result<(), std::convert::Infallible> {
        Ok(())
    }

    fn handle_mesh_packet(
        &mut self,
        _packet: protobufs::MeshPacket,
    ) -> std::result::Result<(), std::convert::Infallible> {
        Ok(())
    }

    fn source_node_id(&self) -> NodeId {
        0u32.into()
    }
}

#[async_trait]
impl Transport for MeshtasticTransport {
    type Handle = RadioLink;

    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        let serial: Vec<DiscoveredDevice> = utils::stream::available_serial_ports()
            .context("Failed to list serial ports")?
            .into_iter()
            .map(|port| DiscoveredDevice {
                name: port.clone(),
                address: port,
            })
            .collect();

        #[cfg(feature = "bluetooth")]
        let devices = {
            let mut devices = serial;
            devices.extend(ble::discover(timeout).await?);
            devices
        };
        #[cfg(not(feature = "bluetooth"))]
        let devices = {
            debug!("Bluetooth disabled; skipped {timeout:?} BLE scan");
            serial
        };

        Ok(devices)
    }

    async fn open(&self, address: &str) -> Result<RadioLink> {
        let stream_api = StreamApi::new();

        let (packet_receiver, connected_api) = match Endpoint::parse(address) {
            Endpoint::Tcp(host) => {
                info!("Connecting via TCP to {host}");
                let stream = utils::stream::build_tcp_stream(host)
                    .await
                    .context("Failed to connect via TCP")?;
                stream_api.connect(stream).await
            }
            Endpoint::Serial(port) => {
                info!("Connecting via serial port {port}");
                let stream = utils::stream::build_serial_stream(port, None, None, None)
                    .context("Failed to connect via serial")?;
                stream_api.connect(stream).await
            }
            Endpoint::Ble(_id) => {
                #[cfg(feature = "bluetooth")]
                {
                    info!("Connecting via Bluetooth to {_id}");
                    let ble_id = utils::stream::BleId::from_mac_address(&_id)
                        .unwrap_or_else(|_| utils::stream::BleId::from_name(&_id));
                    let stream = utils::stream::build_ble_stream(&ble_id, BLE_CONNECT_TIMEOUT)
                        .await
                        .context("Failed to connect via Bluetooth")?;
                    stream_api.connect(stream).await
                }
                #[cfg(not(feature = "bluetooth"))]
                {
                    anyhow::bail!("Bluetooth support not compiled. Build with --features bluetooth");
                }
            }
        };

        debug!("Configuring radio link...");
        let config_id = utils::generate_rand_id();
        let configured_api = connected_api
            .configure(config_id)
            .await
            .context("Failed to configure connection")?;

        Ok(RadioLink {
            api: Mutex::new(Some(configured_api)),
            packets: Mutex::new(Some(packet_receiver)),
            forwarder: Mutex::new(None),
        })
    }

    async fn close(&self, handle: RadioLink) -> Result<()> {
        stop_forwarder(&handle).await;

        if let Some(api) = handle.api.lock().await.take() {
            api.disconnect().await?;
        }

        Ok(())
    }

    async fn send_text(
        &self,
        handle: &RadioLink,
        text: &str,
        channel: u32,
        destination: u32,
    ) -> Result<()> {
        let mut api = handle.api.lock().await;
        let api = api.as_mut().context("Radio link already closed")?;

        let dest = if destination == BROADCAST_ADDR {
            PacketDestination::Broadcast
        } else {
            PacketDestination::Node(destination.into())
        };

        let mut router = LinkRouter;
        api.send_text(&mut router, text.to_string(), dest, false, channel.into())
            .await?;

        debug!("Text message sent to {dest:?} on channel {channel}");
        Ok(())
    }

    async fn send_config(&self, handle: &RadioLink, config: &RadioConfig) -> Result<()> {
        let mut api = handle.api.lock().await;
        let api = api.as_mut().context("Radio link already closed")?;

        let lora = protobufs::config::LoRaConfig {
            use_preset: true,
            modem_preset: modem_preset(config.modem_preset) as i32,
            region: config.region,
            ..Default::default()
        };

        let admin_msg = protobufs::AdminMessage {
            payload_variant: Some(protobufs::admin_message::PayloadVariant::SetConfig(
                protobufs::Config {
                    payload_variant: Some(protobufs::config::PayloadVariant::Lora(lora)),
                },
            )),
            session_passkey: Vec::new(),
        };

        let mesh_packet = protobufs::MeshPacket {
            payload_variant: Some(protobufs::mesh_packet::PayloadVariant::Decoded(
                protobufs::Data {
                    portnum: protobufs::PortNum::AdminApp as i32,
                    payload: admin_msg.encode_to_vec(),
                    ..Default::default()
                },
            )),
            to: 0, // Local destination
            priority: protobufs::mesh_packet::Priority::Default as i32,
            ..Default::default()
        };

        api.send_to_radio_packet(Some(protobufs::to_radio::PayloadVariant::Packet(
            mesh_packet,
        )))
        .await?;

        info!(
            "Sent radio config (region {}, preset {})",
            config.region, config.modem_preset
        );
        Ok(())
    }

    async fn subscribe(&self, handle: &RadioLink, sink: EventSink) -> Result<()> {
        let mut receiver = handle
            .packets
            .lock()
            .await
            .take()
            .context("Radio link already subscribed")?;

        let forwarder = tokio::spawn(async move {
            debug!("Starting radio packet forwarder");

            while let Some(packet) = receiver.recv().await {
                let Some(event) = translate(packet) else {
                    continue;
                };
                if sink.send(event).is_err() {
                    debug!("Event sink closed; stopping forwarder");
                    return;
                }
            }

            warn!("Radio packet stream ended");
            let _ = sink.send(TransportEvent::LinkLost);
        });

        *handle.forwarder.lock().await = Some(forwarder);
        Ok(())
    }

    async fn unsubscribe(&self, handle: &RadioLink) -> Result<()> {
        stop_forwarder(handle).await;
        Ok(())
    }
}

async fn stop_forwarder(handle: &RadioLink) {
    if let Some(forwarder) = handle.forwarder.lock().await.take() {
        forwarder.abort();
        let _ = forwarder.await;
    }
}

fn modem_preset(preset: ModemPreset) -> protobufs::config::lo_ra_config::ModemPreset {
    use protobufs::config::lo_ra_config::ModemPreset as Proto;

    match preset {
        ModemPreset::LongFast => Proto::LongFast,
        ModemPreset::MediumSlow => Proto::MediumSlow,
        ModemPreset::ShortFast => Proto::ShortFast,
    }
}

/// Map one packet from the radio onto a transport event
pub(crate) fn translate(from_radio: protobufs::FromRadio) -> Option<TransportEvent> {
    match from_radio.payload_variant? {
        protobufs::from_radio::PayloadVariant::MyInfo(my_info) => Some(TransportEvent::LocalNode {
            num: my_info.my_node_num,
        }),

        protobufs::from_radio::PayloadVariant::NodeInfo(node_info) => {
            Some(TransportEvent::NodeUpdate(NodeUpdate {
                num: Some(node_info.num),
                user: node_info.user.map(user_info),
                snr: Some(node_info.snr),
                rssi: None, // NodeInfo doesn't have RSSI
                device_metrics: node_info.device_metrics.map(|m| NodeMetrics {
                    battery_level: m.battery_level,
                    voltage: m.voltage,
                }),
                position: node_info.position.as_ref().map(position_fix),
                last_heard: (node_info.last_heard > 0).then_some(u64::from(node_info.last_heard)),
            }))
        }

        protobufs::from_radio::PayloadVariant::Packet(mesh_packet) => {
            translate_mesh_packet(mesh_packet)
        }

        _ => None,
    }
}

fn translate_mesh_packet(mesh_packet: protobufs::MeshPacket) -> Option<TransportEvent> {
    let data = match mesh_packet.payload_variant? {
        protobufs::mesh_packet::PayloadVariant::Decoded(data) => data,
        // Can't process encrypted packets
        protobufs::mesh_packet::PayloadVariant::Encrypted(_) => return None,
    };

    let heard = (mesh_packet.rx_time > 0).then_some(u64::from(mesh_packet.rx_time));
    let rssi = (mesh_packet.rx_rssi != 0).then_some(mesh_packet.rx_rssi);

    match data.portnum() {
        protobufs::PortNum::PositionApp => {
            let position = protobufs::Position::decode(data.payload.as_slice()).ok()?;
            Some(TransportEvent::NodeUpdate(NodeUpdate {
                num: Some(mesh_packet.from),
                snr: Some(mesh_packet.rx_snr),
                rssi,
                position: Some(position_fix(&position)),
                last_heard: heard,
                ..Default::default()
            }))
        }

        protobufs::PortNum::NodeinfoApp => {
            let user = protobufs::User::decode(data.payload.as_slice()).ok()?;
            Some(TransportEvent::NodeUpdate(NodeUpdate {
                num: Some(mesh_packet.from),
                user: Some(user_info(user)),
                snr: Some(mesh_packet.rx_snr),
                rssi,
                last_heard: heard,
                ..Default::default()
            }))
        }

        protobufs::PortNum::TelemetryApp => {
            let telemetry = protobufs::Telemetry::decode(data.payload.as_slice()).ok()?;
            match telemetry.variant? {
                protobufs::telemetry::Variant::DeviceMetrics(m) => {
                    Some(TransportEvent::Telemetry(TelemetryReading {
                        from: Some(mesh_packet.from),
                        voltage: m.voltage,
                        battery_level: m.battery_level,
                        rssi,
                    }))
                }
                _ => None,
            }
        }

        portnum => Some(TransportEvent::Message(TextPacket {
            port: if portnum == protobufs::PortNum::TextMessageApp {
                AppPort::TextMessage
            } else {
                AppPort::Other(data.portnum)
            },
            from: Some(mesh_packet.from),
            from_id: Some(NodeKey::hex_for(mesh_packet.from)),
            channel: Some(mesh_packet.channel),
            payload: data.payload,
        })),
    }
}

fn user_info(user: protobufs::User) -> UserInfo {
    UserInfo {
        id: Some(user.id),
        long_name: Some(user.long_name),
        short_name: Some(user.short_name),
    }
}

fn position_fix(position: &protobufs::Position) -> PositionFix {
    PositionFix {
        latitude_i: position.latitude_i,
        longitude_i: position.longitude_i,
        ..Default::default()
    }
}

#[cfg(feature = "bluetooth")]
mod ble {
    use anyhow::{Context, Result};
    use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
    use btleplug::platform::Manager;
    use std::time::Duration;
    use tracing::debug;

    use crate::transport::DiscoveredDevice;

    pub(super) async fn discover(scan: Duration) -> Result<Vec<DiscoveredDevice>> {
        let manager = Manager::new()
            .await
            .context("Failed to create BLE manager")?;
        let adapter = manager
            .adapters()
            .await
            .context("Failed to get BLE adapters")?
            .into_iter()
            .next()
            .context("No BLE adapters available")?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .context("Failed to start BLE scan")?;
        tokio::time::sleep(scan).await;

        let mut devices = Vec::new();
        for peripheral in adapter.peripherals().await? {
            if let Ok(Some(properties)) = peripheral.properties().await
                && let Some(name) = properties.local_name
            {
                devices.push(DiscoveredDevice {
                    name,
                    address: peripheral.address().to_string(),
                });
            }
        }

        if let Err(e) = adapter.stop_scan().await {
            debug!("Failed to stop BLE scan: {e}");
        }

        debug!("BLE scan found {} named peripherals", devices.len());
        Ok(devices)
    }
}
