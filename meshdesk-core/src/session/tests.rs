use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Phase, SessionManager};
use crate::config::{ModemPreset, RadioConfig, SessionConfig};
use crate::error::SessionError;
use crate::message::{LOCAL_SENDER_ID, LOCAL_USER_LABEL, Role};
use crate::node::{NodeRecord, NodeUpdate, PositionFix, UserInfo};
use crate::notify::{Notification, NotificationLoop};
use crate::store::{MemoryStore, Store};
use crate::telemetry::TelemetryReading;
use crate::transport::{
    AppPort, BROADCAST_ADDR, DiscoveredDevice, EventSink, TextPacket, Transport, TransportEvent,
};

/// What the mock transport should do
#[derive(Default)]
struct Script {
    devices: Vec<DiscoveredDevice>,
    fail_discover: bool,
    fail_open: bool,
    fail_send: bool,
    open_delay: Duration,
    close_delay: Duration,
    send_delay: Duration,
}

/// What the mock transport was asked to do
#[derive(Default)]
struct Calls {
    discover: Vec<Duration>,
    opens: Vec<String>,
    closes: usize,
    subscribes: usize,
    unsubscribes: usize,
    sent: Vec<(String, u32, u32)>,
    configs: Vec<RadioConfig>,
}

#[derive(Clone, Default)]
struct MockTransport {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Calls>>,
    sink: Arc<Mutex<Option<EventSink>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    fn script(&self) -> MutexGuard<'_, Script> {
        lock(&self.script)
    }

    fn calls(&self) -> MutexGuard<'_, Calls> {
        lock(&self.calls)
    }

    /// Push an inbound event the way the radio library would. Returns
    /// `false` once nobody is listening.
    fn inject(&self, event: TransportEvent) -> bool {
        lock(&self.sink)
            .as_ref()
            .is_some_and(|sink| sink.send(event).is_ok())
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Handle = u32;

    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        self.calls().discover.push(timeout);
        let script = self.script();
        if script.fail_discover {
            bail!("adapter powered off");
        }
        Ok(script.devices.clone())
    }

    async fn open(&self, address: &str) -> Result<u32> {
        let (delay, fail) = {
            let script = self.script();
            (script.open_delay, script.fail_open)
        };
        let id = {
            let mut calls = self.calls();
            calls.opens.push(address.to_string());
            calls.opens.len() as u32
        };
        tokio::time::sleep(delay).await;
        if fail {
            bail!("no such device: {address}");
        }
        Ok(id)
    }

    async fn close(&self, _handle: u32) -> Result<()> {
        self.calls().closes += 1;
        let delay = self.script().close_delay;
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn send_text(
        &self,
        _handle: &u32,
        text: &str,
        channel: u32,
        destination: u32,
    ) -> Result<()> {
        let (delay, fail) = {
            let script = self.script();
            (script.send_delay, script.fail_send)
        };
        tokio::time::sleep(delay).await;
        if fail {
            return Err(anyhow!("radio busy"));
        }
        self.calls()
            .sent
            .push((text.to_string(), channel, destination));
        Ok(())
    }

    async fn send_config(&self, _handle: &u32, config: &RadioConfig) -> Result<()> {
        let delay = self.script().send_delay;
        tokio::time::sleep(delay).await;
        self.calls().configs.push(*config);
        Ok(())
    }

    async fn subscribe(&self, _handle: &u32, sink: EventSink) -> Result<()> {
        self.calls().subscribes += 1;
        *lock(&self.sink) = Some(sink);
        Ok(())
    }

    async fn unsubscribe(&self, _handle: &u32) -> Result<()> {
        self.calls().unsubscribes += 1;
        lock(&self.sink).take();
        Ok(())
    }
}

type Session = SessionManager<MockTransport, MemoryStore>;

struct Harness {
    session: Session,
    notifications: NotificationLoop,
    transport: MockTransport,
    store: Arc<MemoryStore>,
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with(MockTransport::default(), MemoryStore::new(), fast_config())
    }

    fn with(transport: MockTransport, store: MemoryStore, config: SessionConfig) -> Self {
        let store = Arc::new(store);
        let (session, notifications) =
            SessionManager::new(transport.clone(), Arc::clone(&store), config);

        let seen: Arc<Mutex<Vec<Notification>>> = Arc::default();
        let sink = Arc::clone(&seen);
        session.on_message(move |m| lock(&sink).push(Notification::Message(m)));
        let sink = Arc::clone(&seen);
        session.on_node_update(move |n| lock(&sink).push(Notification::NodeUpdate(n)));
        let sink = Arc::clone(&seen);
        session.on_telemetry(move |t| lock(&sink).push(Notification::Telemetry(t)));

        Self {
            session,
            notifications,
            transport,
            store,
            seen,
        }
    }

    /// Wait for the next notification and return it
    async fn next(&mut self) -> Result<Notification> {
        let delivered = tokio::time::timeout(
            Duration::from_secs(2),
            self.notifications.dispatch_next(),
        )
        .await
        .context("Timed out waiting for a notification")?;
        if !delivered {
            bail!("Notification channel closed");
        }
        lock(&self.seen)
            .pop()
            .context("Notification had no registered handler")
    }

    fn seen(&self) -> usize {
        lock(&self.seen).len()
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        warmup_scan: Duration::from_millis(10),
        scan: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(2),
        close_timeout: Duration::from_secs(2),
        command_timeout: Duration::from_secs(2),
    }
}

fn text_packet(from_id: &str, text: &str, channel: u32) -> TransportEvent {
    TransportEvent::Message(TextPacket {
        port: AppPort::TextMessage,
        from: None,
        from_id: Some(from_id.to_string()),
        channel: Some(channel),
        payload: text.as_bytes().to_vec(),
    })
}

fn alice() -> NodeUpdate {
    NodeUpdate {
        num: Some(10),
        user: Some(UserInfo {
            id: Some("!0a".to_string()),
            long_name: Some("Alice".to_string()),
            short_name: Some("AL".to_string()),
        }),
        ..Default::default()
    }
}

async fn wait_for_phase(session: &Session, phase: Phase) -> Result<()> {
    for _ in 0..200 {
        if session.state().await.phase == phase {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bail!("Session never reached {phase}")
}

#[tokio::test]
async fn test_send_while_disconnected_is_rejected() -> Result<()> {
    let mut h = Harness::new();

    let err = h
        .session
        .send("hello", 0, None)
        .await
        .expect_err("send must fail while disconnected");
    assert!(matches!(err, SessionError::InvalidOperation(_)));

    assert!(h.transport.calls().sent.is_empty());
    assert!(h.store.load_messages()?.is_empty());
    assert_eq!(h.notifications.dispatch_pending(), 0);
    Ok(())
}

#[tokio::test]
async fn test_send_defaults_to_broadcast() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    h.session.send("hello", 0, None).await?;
    assert_eq!(
        h.transport.calls().sent,
        vec![("hello".to_string(), 0, BROADCAST_ADDR)]
    );

    let Notification::Message(message) = h.next().await? else {
        bail!("Expected a message notification");
    };
    assert_eq!(message.sender_label, LOCAL_USER_LABEL);
    assert_eq!(message.role, Role::Local);

    let stored = h.store.load_messages()?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sender_id, LOCAL_SENDER_ID);
    assert_eq!(stored[0].role, Role::Local);
    assert_eq!(stored[0].payload, "hello");
    Ok(())
}

#[tokio::test]
async fn test_send_to_explicit_destination() -> Result<()> {
    let h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    h.session.send("psst", 2, Some(0x0a)).await?;
    assert_eq!(
        h.transport.calls().sent,
        vec![("psst".to_string(), 2, 0x0a)]
    );
    Ok(())
}

#[tokio::test]
async fn test_send_empty_text_is_rejected() -> Result<()> {
    let h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    let result = h.session.send("", 0, None).await;
    assert!(matches!(result, Err(SessionError::InvalidOperation(_))));
    assert!(h.transport.calls().sent.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_send_failure_has_no_side_effects() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;
    h.transport.script().fail_send = true;

    let result = h.session.send("hello", 0, None).await;
    assert!(matches!(result, Err(SessionError::TransportUnavailable(_))));
    assert!(h.store.load_messages()?.is_empty());
    assert_eq!(h.notifications.dispatch_pending(), 0);
    Ok(())
}

#[tokio::test]
async fn test_stalled_send_times_out() -> Result<()> {
    let transport = MockTransport::default();
    let config = SessionConfig {
        command_timeout: Duration::from_millis(30),
        ..fast_config()
    };
    let mut h = Harness::with(transport, MemoryStore::new(), config);
    h.session.connect("tcp:radio:4403").await?;
    h.transport.script().send_delay = Duration::from_secs(5);

    let result = h.session.send("hello", 0, None).await;
    assert_eq!(
        result,
        Err(SessionError::ConnectionTimeout {
            action: "sending a message",
            millis: 30,
        })
    );
    assert!(h.transport.calls().sent.is_empty());
    assert!(h.store.load_messages()?.is_empty());
    assert_eq!(h.notifications.dispatch_pending(), 0);

    let radio = RadioConfig {
        region: 3,
        modem_preset: ModemPreset::LongFast,
    };
    assert_eq!(
        h.session.send_config(&radio).await,
        Err(SessionError::ConnectionTimeout {
            action: "sending radio config",
            millis: 30,
        })
    );

    // The link stays usable
    assert_eq!(h.session.state().await.phase, Phase::Connected);
    h.transport.script().send_delay = Duration::ZERO;
    h.session.send("again", 0, None).await?;
    Ok(())
}

#[tokio::test]
async fn test_inbound_message_is_persisted_and_labelled() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    assert!(h.transport.inject(TransportEvent::NodeUpdate(alice())));
    h.next().await?;

    assert!(h.transport.inject(text_packet("!0a", "hi", 1)));
    let Notification::Message(message) = h.next().await? else {
        bail!("Expected a message notification");
    };

    let stored = h.store.load_messages()?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sender_id, "!0a");
    assert_eq!(stored[0].role, Role::Remote);
    assert_eq!(stored[0].payload, "hi");
    assert_eq!(stored[0].channel, 1);

    assert_eq!(message.sender_label, "Alice (!0a)");
    assert_eq!(
        message.sender_label,
        h.session.get_node_display_name("!0a").await
    );
    assert_eq!(message.text, "hi");
    assert_eq!(message.channel, 1);
    Ok(())
}

#[tokio::test]
async fn test_message_from_unknown_sender_uses_fallback_label() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    assert!(h.transport.inject(TransportEvent::Message(TextPacket {
        port: AppPort::TextMessage,
        from: Some(0x1234),
        from_id: None,
        channel: None,
        payload: b"yo".to_vec(),
    })));

    let Notification::Message(message) = h.next().await? else {
        bail!("Expected a message notification");
    };
    assert_eq!(message.sender_id, "!00001234");
    assert_eq!(message.sender_label, "Unknown (4660)");
    assert_eq!(message.channel, 0);
    Ok(())
}

#[tokio::test]
async fn test_empty_and_non_text_messages_are_dropped() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    assert!(h.transport.inject(text_packet("!0a", "", 0)));
    assert!(h.transport.inject(TransportEvent::Message(TextPacket {
        port: AppPort::Other(67),
        from: Some(10),
        from_id: None,
        channel: Some(0),
        payload: b"binary".to_vec(),
    })));
    // Events are handled in order, so this arrives after both drops
    assert!(h.transport.inject(TransportEvent::NodeUpdate(alice())));

    let notification = h.next().await?;
    assert!(matches!(notification, Notification::NodeUpdate(_)));
    assert!(h.store.load_messages()?.is_empty());
    assert_eq!(h.seen(), 0);
    Ok(())
}

#[tokio::test]
async fn test_node_update_reaches_cache_before_notification() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    let update = NodeUpdate {
        num: Some(10),
        position: Some(PositionFix {
            latitude: Some(37.7749),
            longitude: Some(-122.4194),
            ..Default::default()
        }),
        ..alice()
    };
    assert!(h.transport.inject(TransportEvent::NodeUpdate(update)));

    let Notification::NodeUpdate(node) = h.next().await? else {
        bail!("Expected a node update notification");
    };
    assert_eq!(node.latitude, Some(37.7749));
    assert_eq!(node.longitude, Some(-122.4194));

    let cached = h.session.nodes().await;
    assert_eq!(cached, vec![node.clone()]);

    let stored = h.store.load_all_nodes()?;
    assert_eq!(stored.get("10"), Some(&node));
    Ok(())
}

#[tokio::test]
async fn test_node_update_without_identifier_is_dropped() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    assert!(h.transport.inject(TransportEvent::NodeUpdate(NodeUpdate {
        snr: Some(4.0),
        ..Default::default()
    })));
    assert!(h.transport.inject(TransportEvent::NodeUpdate(alice())));

    let Notification::NodeUpdate(node) = h.next().await? else {
        bail!("Expected a node update notification");
    };
    assert_eq!(node.num, Some(10));
    assert_eq!(h.session.nodes().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_telemetry_is_forwarded_not_persisted() -> Result<()> {
    let mut h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    assert!(h.transport.inject(TransportEvent::Telemetry(TelemetryReading {
        from: Some(10),
        voltage: Some(4.1),
        battery_level: Some(90),
        rssi: Some(-80),
    })));

    let Notification::Telemetry(sample) = h.next().await? else {
        bail!("Expected a telemetry notification");
    };
    assert_eq!(sample.from, Some(10));
    assert_eq!(sample.voltage, Some(4.1));
    assert_eq!(sample.rssi, Some(-80));
    assert!(h.store.load_all_nodes()?.is_empty());
    assert!(h.session.nodes().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_disconnect_twice_closes_once() -> Result<()> {
    let h = Harness::new();
    h.session.disconnect().await;

    h.session.connect("tcp:radio:4403").await?;
    h.session.disconnect().await;
    h.session.disconnect().await;

    let calls = h.transport.calls();
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.closes, 1);
    drop(calls);
    assert_eq!(h.session.state().await.phase, Phase::Disconnected);
    Ok(())
}

#[tokio::test]
async fn test_no_inbound_delivery_after_disconnect() -> Result<()> {
    let h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    // Keep a sink the transport "forgot" to drop
    let leaked = lock(&h.transport.sink)
        .clone()
        .context("Transport was never subscribed")?;
    h.session.disconnect().await;

    assert!(leaked.send(TransportEvent::NodeUpdate(alice())).is_err());
    assert!(h.session.nodes().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_connect_opens_once() -> Result<()> {
    let transport = MockTransport::default();
    transport.script().open_delay = Duration::from_millis(50);
    let h = Harness::with(transport, MemoryStore::new(), fast_config());

    let (first, second) = tokio::join!(
        h.session.connect("tcp:radio:4403"),
        h.session.connect("tcp:radio:4403")
    );

    first?;
    assert!(matches!(second, Err(SessionError::InvalidOperation(_))));
    assert_eq!(h.transport.calls().opens.len(), 1);
    assert_eq!(h.session.state().await.phase, Phase::Connected);
    Ok(())
}

#[tokio::test]
async fn test_connect_while_connected_is_rejected() -> Result<()> {
    let h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;

    let result = h.session.connect("/dev/ttyUSB0").await;
    assert!(matches!(result, Err(SessionError::InvalidOperation(_))));

    let status = h.session.state().await;
    assert_eq!(status.address.as_deref(), Some("tcp:radio:4403"));
    Ok(())
}

#[tokio::test]
async fn test_failed_connect_leaves_no_state() -> Result<()> {
    let transport = MockTransport::default();
    transport.script().fail_open = true;
    let h = Harness::with(transport, MemoryStore::new(), fast_config());

    let result = h.session.connect("tcp:nowhere:4403").await;
    assert!(matches!(result, Err(SessionError::TransportUnavailable(_))));

    let status = h.session.state().await;
    assert_eq!(status.phase, Phase::Disconnected);
    assert_eq!(status.address, None);
    assert_eq!(h.transport.calls().subscribes, 0);

    // A later attempt is allowed
    h.transport.script().fail_open = false;
    h.session.connect("tcp:radio:4403").await?;
    Ok(())
}

#[tokio::test]
async fn test_connect_timeout() -> Result<()> {
    let transport = MockTransport::default();
    transport.script().open_delay = Duration::from_secs(5);
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(30),
        ..fast_config()
    };
    let h = Harness::with(transport, MemoryStore::new(), config);

    let result = h.session.connect("tcp:radio:4403").await;
    assert_eq!(
        result,
        Err(SessionError::ConnectionTimeout {
            action: "connecting",
            millis: 30,
        })
    );
    assert_eq!(h.session.state().await.phase, Phase::Disconnected);
    Ok(())
}

#[tokio::test]
async fn test_disconnect_during_connect_is_ignored() -> Result<()> {
    let transport = MockTransport::default();
    transport.script().open_delay = Duration::from_millis(50);
    let h = Harness::with(transport, MemoryStore::new(), fast_config());

    let (connected, ()) = tokio::join!(h.session.connect("tcp:radio:4403"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.session.state().await.phase, Phase::Connecting);
        h.session.disconnect().await;
    });

    connected?;
    assert_eq!(h.session.state().await.phase, Phase::Connected);
    assert_eq!(h.transport.calls().closes, 0);

    h.session.disconnect().await;
    assert_eq!(h.transport.calls().closes, 1);
    Ok(())
}

#[tokio::test]
async fn test_slow_close_is_forced() -> Result<()> {
    let transport = MockTransport::default();
    transport.script().close_delay = Duration::from_secs(10);
    let config = SessionConfig {
        close_timeout: Duration::from_millis(30),
        ..fast_config()
    };
    let h = Harness::with(transport, MemoryStore::new(), config);
    h.session.connect("tcp:radio:4403").await?;

    tokio::time::timeout(Duration::from_secs(1), h.session.disconnect())
        .await
        .context("Disconnect hung on a slow close")?;

    assert_eq!(h.session.state().await.phase, Phase::Disconnected);
    assert_eq!(h.transport.calls().closes, 1);
    Ok(())
}

#[tokio::test]
async fn test_link_lost_tears_down() -> Result<()> {
    let h = Harness::new();
    h.session.connect("tcp:radio:4403").await?;
    assert!(h.transport.inject(TransportEvent::LocalNode { num: 10 }));
    assert!(h.transport.inject(TransportEvent::LinkLost));

    wait_for_phase(&h.session, Phase::Disconnected).await?;
    {
        let calls = h.transport.calls();
        assert_eq!(calls.unsubscribes, 1);
        assert_eq!(calls.closes, 1);
    }
    assert_eq!(h.session.get_local_node_name().await, None);

    // The caller's own disconnect afterwards is a no-op
    h.session.disconnect().await;
    assert_eq!(h.transport.calls().closes, 1);

    h.session.connect("tcp:radio:4403").await?;
    assert_eq!(h.transport.calls().opens.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_scan_discards_warmup_and_unnamed() -> Result<()> {
    let transport = MockTransport::default();
    transport.script().devices = vec![
        DiscoveredDevice {
            name: "Meshtastic_1a2b".to_string(),
            address: "AA:BB:CC:DD:EE:FF".to_string(),
        },
        DiscoveredDevice {
            name: String::new(),
            address: "11:22:33:44:55:66".to_string(),
        },
        DiscoveredDevice {
            name: "  ".to_string(),
            address: "77:88:99:AA:BB:CC".to_string(),
        },
    ];
    let h = Harness::with(transport, MemoryStore::new(), fast_config());

    let devices = h.session.scan().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Meshtastic_1a2b");

    let config = fast_config();
    assert_eq!(
        h.transport.calls().discover,
        vec![config.warmup_scan, config.scan]
    );
    Ok(())
}

#[tokio::test]
async fn test_scan_error_yields_empty() -> Result<()> {
    let transport = MockTransport::default();
    transport.script().fail_discover = true;
    let h = Harness::with(transport, MemoryStore::new(), fast_config());

    assert!(h.session.scan().await.is_empty());
    assert_eq!(h.transport.calls().discover.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_local_node_name() -> Result<()> {
    let mut h = Harness::new();
    assert_eq!(h.session.get_local_node_name().await, None);

    h.session.connect("tcp:radio:4403").await?;
    assert!(h.transport.inject(TransportEvent::LocalNode { num: 0x0a }));
    // Wait on a later event so the local node has been recorded
    assert!(h.transport.inject(TransportEvent::NodeUpdate(NodeUpdate {
        num: Some(0x0b),
        ..Default::default()
    })));
    h.next().await?;
    assert_eq!(
        h.session.get_local_node_name().await.as_deref(),
        Some("!0000000a")
    );

    assert!(h.transport.inject(TransportEvent::NodeUpdate(alice())));
    h.next().await?;
    assert_eq!(
        h.session.get_local_node_name().await.as_deref(),
        Some("Alice")
    );

    h.session.disconnect().await;
    assert_eq!(h.session.get_local_node_name().await, None);
    Ok(())
}

#[tokio::test]
async fn test_cache_prewarmed_from_store() -> Result<()> {
    let store = MemoryStore::with_nodes([NodeRecord {
        num: Some(10),
        id: Some("!0a".to_string()),
        long_name: Some("Alice".to_string()),
        ..Default::default()
    }])?;
    let h = Harness::with(MockTransport::default(), store, fast_config());

    assert_eq!(h.session.get_node_display_name(10).await, "Alice (!0a)");
    assert_eq!(h.session.get_node_display_name("!0a").await, "Alice (!0a)");
    assert_eq!(h.session.get_node_display_name(11).await, "Unknown (11)");
    Ok(())
}

#[tokio::test]
async fn test_send_config() -> Result<()> {
    let h = Harness::new();
    let config = RadioConfig {
        region: 1,
        modem_preset: ModemPreset::MediumSlow,
    };

    let result = h.session.send_config(&config).await;
    assert!(matches!(result, Err(SessionError::InvalidOperation(_))));

    h.session.connect("/dev/ttyUSB0").await?;
    h.session.send_config(&config).await?;
    assert_eq!(h.transport.calls().configs, vec![config]);
    assert!(h.store.load_messages()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_replaced_handler_wins() -> Result<()> {
    let mut h = Harness::new();
    let replaced: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&replaced);
    h.session.on_message(move |m| lock(&sink).push(m.text));

    h.session.connect("tcp:radio:4403").await?;
    h.session.send("first", 0, None).await?;

    assert_eq!(h.notifications.dispatch_pending(), 1);
    assert_eq!(*lock(&replaced), vec!["first".to_string()]);
    assert_eq!(h.seen(), 0);
    Ok(())
}
