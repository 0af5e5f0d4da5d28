use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use strum::Display;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cache::NodeCache;
use crate::config::{RadioConfig, SessionConfig};
use crate::error::SessionError;
use crate::message::{ChatMessage, LOCAL_SENDER_ID, Role};
use crate::node::{NodeKey, NodeRecord, NodeUpdate};
use crate::notify::{self, Dispatcher, EventKind, Notification, NotificationLoop};
use crate::store::Store;
use crate::telemetry::{TelemetryReading, TelemetrySample};
use crate::transport::{
    AppPort, BROADCAST_ADDR, DiscoveredDevice, TextPacket, Transport, TransportEvent,
};

/// Connection lifecycle as seen by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot for status displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub phase: Phase,
    /// Target address while connecting or connected
    pub address: Option<String>,
}

enum Link<H> {
    Idle,
    Opening {
        address: String,
    },
    Bound {
        address: String,
        handle: H,
        pump: JoinHandle<()>,
        id: u64,
    },
}

/// Owns one device connection at a time and everything that flows over it.
///
/// Consumer calls and inbound transport events run on different tasks. The
/// link state is only touched by consumer calls and link-loss teardown; the
/// node cache is shared with the inbound pump behind a lock. Notifications
/// leave through a [`Dispatcher`] and are run by the [`NotificationLoop`]
/// returned from [`SessionManager::new`].
pub struct SessionManager<T: Transport, S: Store> {
    inner: Arc<Inner<T, S>>,
}

impl<T: Transport, S: Store> Clone for SessionManager<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: Transport, S: Store> {
    transport: T,
    config: SessionConfig,
    link: Mutex<Link<T::Handle>>,
    shared: Arc<Shared<S>>,
    sessions: AtomicU64,
}

/// State the inbound pump needs
struct Shared<S> {
    store: Arc<S>,
    cache: RwLock<NodeCache>,
    dispatcher: Dispatcher,
    local_node: RwLock<Option<u32>>,
}

impl<T: Transport, S: Store> SessionManager<T, S> {
    /// Build a session and pre-warm its node cache from `store`.
    ///
    /// The returned loop must be driven by the consumer for registered
    /// handlers to run.
    pub fn new(transport: T, store: Arc<S>, config: SessionConfig) -> (Self, NotificationLoop) {
        let cache = match store.load_all_nodes() {
            Ok(nodes) => {
                debug!("Loaded {} stored nodes", nodes.len());
                NodeCache::from_records(nodes.into_values())
            }
            Err(e) => {
                warn!("Failed to load stored nodes: {e:#}");
                NodeCache::new()
            }
        };

        let (dispatcher, notifications) = notify::channel();
        let shared = Arc::new(Shared {
            store,
            cache: RwLock::new(cache),
            dispatcher,
            local_node: RwLock::new(None),
        });

        let session = Self {
            inner: Arc::new(Inner {
                transport,
                config,
                link: Mutex::new(Link::Idle),
                shared,
                sessions: AtomicU64::new(0),
            }),
        };
        (session, notifications)
    }

    /// Discover nearby devices. Never fails: a transport error yields an
    /// empty list.
    pub async fn scan(&self) -> Vec<DiscoveredDevice> {
        let transport = &self.inner.transport;

        // The first pass warms the platform discovery cache; its result is stale
        if let Err(e) = transport.discover(self.inner.config.warmup_scan).await {
            debug!("Warm-up scan failed: {e:#}");
        }

        match transport.discover(self.inner.config.scan).await {
            Ok(devices) => {
                let devices: Vec<_> = devices
                    .into_iter()
                    .filter(|device| !device.name.trim().is_empty())
                    .collect();
                info!("Scan found {} named devices", devices.len());
                devices
            }
            Err(e) => {
                warn!("Scan failed: {e:#}");
                Vec::new()
            }
        }
    }

    /// Open a link to `address` and start receiving from it.
    ///
    /// Rejected while another connect is in flight or a link is up.
    pub async fn connect(&self, address: &str) -> Result<(), SessionError> {
        {
            let mut link = self.inner.link.lock().await;
            if !matches!(*link, Link::Idle) {
                return Err(SessionError::InvalidOperation(
                    "connect already in progress or connected",
                ));
            }
            *link = Link::Opening {
                address: address.to_string(),
            };
        }

        info!("Connecting to {address}...");
        let bound = self.inner.config.connect_timeout;
        let handle = match timeout(bound, self.inner.transport.open(address)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                error!("Failed to connect to {address}: {e:#}");
                *self.inner.link.lock().await = Link::Idle;
                return Err(SessionError::TransportUnavailable(format!("{e:#}")));
            }
            Err(_) => {
                let err = SessionError::timeout("connecting", bound);
                error!("Failed to connect to {address}: {err}");
                *self.inner.link.lock().await = Link::Idle;
                return Err(err);
            }
        };

        let mut link = self.inner.link.lock().await;
        let id = self.inner.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let (sink, events) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.shared),
            events,
            id,
        ));

        // Subscribe before reporting success so nothing is missed in between
        if let Err(e) = self.inner.transport.subscribe(&handle, sink).await {
            error!("Failed to subscribe to {address}: {e:#}");
            pump.abort();
            self.inner.close_handle(handle, address).await;
            *link = Link::Idle;
            return Err(SessionError::TransportUnavailable(format!("{e:#}")));
        }

        *link = Link::Bound {
            address: address.to_string(),
            handle,
            pump,
            id,
        };
        info!("Connected to {address}");
        Ok(())
    }

    /// Tear down the current link. A no-op when disconnected, and while a
    /// connect is still in flight.
    pub async fn disconnect(&self) {
        let mut link = self.inner.link.lock().await;
        match std::mem::replace(&mut *link, Link::Idle) {
            Link::Idle => debug!("Already disconnected"),
            opening @ Link::Opening { .. } => {
                debug!("Connect in flight; ignoring disconnect");
                *link = opening;
            }
            Link::Bound {
                address,
                handle,
                pump,
                ..
            } => {
                info!("Disconnecting from {address}...");
                self.inner.release(handle, pump, &address).await;
            }
        }
    }

    /// Send a text message on `channel`. `None` broadcasts.
    ///
    /// Success means the transport accepted it, not that it was delivered.
    pub async fn send(
        &self,
        text: &str,
        channel: u32,
        destination: Option<u32>,
    ) -> Result<(), SessionError> {
        if text.is_empty() {
            return Err(SessionError::InvalidOperation("message text is empty"));
        }
        let destination = destination.unwrap_or(BROADCAST_ADDR);

        {
            let link = self.inner.link.lock().await;
            let Link::Bound { handle, .. } = &*link else {
                return Err(SessionError::InvalidOperation("not connected"));
            };

            let bound = self.inner.config.command_timeout;
            let sent = self
                .inner
                .transport
                .send_text(handle, text, channel, destination);
            match timeout(bound, sent).await {
                Ok(Ok(())) => debug!("Sent {} bytes to {destination:#x}", text.len()),
                Ok(Err(e)) => {
                    error!("Failed to send message: {e:#}");
                    return Err(SessionError::TransportUnavailable(format!("{e:#}")));
                }
                Err(_) => {
                    warn!("Send timed out after {bound:?}");
                    return Err(SessionError::timeout("sending a message", bound));
                }
            }
        }

        let shared = &self.inner.shared;
        shared
            .save_message(LOCAL_SENDER_ID.to_string(), Role::Local, text.to_string(), channel)
            .await;
        shared
            .dispatcher
            .emit(Notification::Message(ChatMessage::local(text.to_string(), channel)));
        Ok(())
    }

    /// Push radio settings to the attached device
    pub async fn send_config(&self, config: &RadioConfig) -> Result<(), SessionError> {
        let link = self.inner.link.lock().await;
        let Link::Bound { handle, .. } = &*link else {
            return Err(SessionError::InvalidOperation("not connected"));
        };

        let bound = self.inner.config.command_timeout;
        match timeout(bound, self.inner.transport.send_config(handle, config)).await {
            Ok(Ok(())) => {
                info!(
                    "Sent radio config: region {}, preset {}",
                    config.region, config.modem_preset
                );
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Failed to send radio config: {e:#}");
                Err(SessionError::TransportUnavailable(format!("{e:#}")))
            }
            Err(_) => {
                warn!("Radio config timed out after {bound:?}");
                Err(SessionError::timeout("sending radio config", bound))
            }
        }
    }

    /// Name of the node this client is attached to, once the radio reported it
    pub async fn get_local_node_name(&self) -> Option<String> {
        let num = (*self.inner.shared.local_node.read().await)?;
        let cache = self.inner.shared.cache.read().await;
        let name = cache
            .get(&NodeKey::Num(num))
            .and_then(|node| node.long_name.clone().or_else(|| node.id.clone()))
            .unwrap_or_else(|| NodeKey::hex_for(num));
        Some(name)
    }

    pub async fn get_node_display_name(&self, key: impl Into<NodeKey>) -> String {
        self.inner.shared.cache.read().await.display_name(&key.into())
    }

    /// Snapshot of every known node in stable order
    pub async fn nodes(&self) -> Vec<NodeRecord> {
        self.inner.shared.cache.read().await.all().cloned().collect()
    }

    pub async fn state(&self) -> SessionStatus {
        match &*self.inner.link.lock().await {
            Link::Idle => SessionStatus {
                phase: Phase::Disconnected,
                address: None,
            },
            Link::Opening { address } => SessionStatus {
                phase: Phase::Connecting,
                address: Some(address.clone()),
            },
            Link::Bound { address, .. } => SessionStatus {
                phase: Phase::Connected,
                address: Some(address.clone()),
            },
        }
    }

    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(ChatMessage) + Send + 'static,
    {
        self.inner.shared.dispatcher.on_message(handler);
    }

    pub fn on_node_update<F>(&self, handler: F)
    where
        F: FnMut(NodeRecord) + Send + 'static,
    {
        self.inner.shared.dispatcher.on_node_update(handler);
    }

    pub fn on_telemetry<F>(&self, handler: F)
    where
        F: FnMut(TelemetrySample) + Send + 'static,
    {
        self.inner.shared.dispatcher.on_telemetry(handler);
    }

    pub fn unregister(&self, kind: EventKind) {
        self.inner.shared.dispatcher.unregister(kind);
    }
}

impl<T: Transport, S: Store> Inner<T, S> {
    /// Release a bound link: stop inbound delivery, then close.
    ///
    /// Once this returns the pump is gone, so no further inbound event is
    /// handled for this link.
    async fn release(&self, handle: T::Handle, pump: JoinHandle<()>, address: &str) {
        let bound = self.config.command_timeout;
        match timeout(bound, self.transport.unsubscribe(&handle)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to unsubscribe from {address}: {e:#}"),
            Err(_) => warn!("{}", SessionError::timeout("unsubscribing", bound)),
        }

        pump.abort();
        if let Err(e) = pump.await
            && !e.is_cancelled()
        {
            warn!("Inbound pump for {address} failed: {e}");
        }

        self.close_handle(handle, address).await;
        *self.shared.local_node.write().await = None;
    }

    /// Close with a bounded wait. A timeout is logged and treated as closed.
    async fn close_handle(&self, handle: T::Handle, address: &str) {
        let bound = self.config.close_timeout;
        match timeout(bound, self.transport.close(handle)).await {
            Ok(Ok(())) => info!("Disconnected from {address}"),
            Ok(Err(e)) => warn!("Close of {address} failed: {e:#}"),
            Err(_) => warn!(
                "{}; forcing disconnect from {address}",
                SessionError::timeout("closing the link", bound)
            ),
        }
    }

    /// Teardown triggered by the transport reporting the link gone
    async fn teardown_lost(&self, session: u64) {
        let mut link = self.link.lock().await;
        match std::mem::replace(&mut *link, Link::Idle) {
            Link::Bound {
                address,
                handle,
                pump,
                id,
            } if id == session => {
                warn!("Link to {address} lost");
                self.release(handle, pump, &address).await;
            }
            other => *link = other,
        }
    }
}

impl<T: Transport, S: Store> Drop for Inner<T, S> {
    fn drop(&mut self) {
        if let Link::Bound { address, pump, .. } = self.link.get_mut() {
            warn!("Session dropped while connected to {address}");
            pump.abort();
        }
    }
}

/// Drains one link's inbound events in delivery order
async fn pump<T: Transport, S: Store>(
    inner: Weak<Inner<T, S>>,
    shared: Arc<Shared<S>>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    id: u64,
) {
    while let Some(event) = events.recv().await {
        if event == TransportEvent::LinkLost {
            // Teardown awaits this task, so it runs on its own
            if let Some(inner) = inner.upgrade() {
                tokio::spawn(async move { inner.teardown_lost(id).await });
            }
            return;
        }

        if let Err(e) = shared.handle_event(event).await {
            debug!("Dropped inbound event: {e}");
        }
    }
    debug!("Inbound event stream for session {id} closed");
}

impl<S: Store> Shared<S> {
    async fn handle_event(&self, event: TransportEvent) -> Result<(), SessionError> {
        match event {
            TransportEvent::Message(packet) => self.handle_message(packet).await,
            TransportEvent::NodeUpdate(update) => self.handle_node_update(update).await,
            TransportEvent::Telemetry(reading) => self.handle_telemetry(&reading),
            TransportEvent::LocalNode { num } => {
                debug!("Attached to node {}", NodeKey::hex_for(num));
                *self.local_node.write().await = Some(num);
                Ok(())
            }
            TransportEvent::LinkLost => Ok(()),
        }
    }

    async fn handle_message(&self, packet: TextPacket) -> Result<(), SessionError> {
        if packet.port != AppPort::TextMessage {
            debug!("Ignoring packet on port {:?}", packet.port);
            return Ok(());
        }

        let text = String::from_utf8_lossy(&packet.payload).into_owned();
        if text.is_empty() {
            debug!("Dropping empty text message");
            return Ok(());
        }

        let key = packet
            .sender_key()
            .ok_or(SessionError::MalformedEvent("text message without sender"))?;
        let sender_id = match &key {
            NodeKey::Hex(id) => id.clone(),
            NodeKey::Num(num) => NodeKey::hex_for(*num),
        };
        let channel = packet.channel.unwrap_or(0);

        self.save_message(sender_id.clone(), Role::Remote, text.clone(), channel)
            .await;

        let sender_label = self.cache.read().await.display_name(&key);
        self.dispatcher.emit(Notification::Message(ChatMessage {
            sender_id,
            sender_label,
            role: Role::Remote,
            text,
            channel,
        }));
        Ok(())
    }

    /// Cache, then persist, then notify
    async fn handle_node_update(&self, update: NodeUpdate) -> Result<(), SessionError> {
        let node = self
            .cache
            .write()
            .await
            .upsert(&update)
            .ok_or(SessionError::MalformedEvent("node update without identifier"))?;

        let stored = node.clone();
        self.persist("node", move |store| store.save_node(&stored))
            .await;

        self.dispatcher.emit(Notification::NodeUpdate(node));
        Ok(())
    }

    fn handle_telemetry(&self, reading: &TelemetryReading) -> Result<(), SessionError> {
        let sample = TelemetrySample::from_reading(reading)
            .ok_or(SessionError::MalformedEvent("telemetry without metrics"))?;
        self.dispatcher.emit(Notification::Telemetry(sample));
        Ok(())
    }

    async fn save_message(&self, sender_id: String, role: Role, payload: String, channel: u32) {
        self.persist("message", move |store| {
            store.save_message(&sender_id, role, &payload, channel)
        })
        .await;
    }

    /// Run a store call off the async runtime. Failures are logged only.
    async fn persist<F>(&self, what: &'static str, op: F)
    where
        F: FnOnce(&S) -> anyhow::Result<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || op(&store)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to persist {what}: {e:#}"),
            Err(e) => warn!("Persisting {what} did not complete: {e}"),
        }
    }
}
