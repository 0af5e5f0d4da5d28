//! Hand-off of session events to the consumer's execution context.
//!
//! The session side holds a [`Dispatcher`] and only ever enqueues. The
//! consumer owns the matching [`NotificationLoop`] and drives it from its own
//! context (an async task, or a UI tick via [`NotificationLoop::dispatch_pending`]),
//! so handlers never run on the transport's delivery context.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strum::Display;
use tokio::sync::mpsc;
use tracing::debug;

use crate::message::ChatMessage;
use crate::node::NodeRecord;
use crate::telemetry::TelemetrySample;

/// Event kinds a consumer can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EventKind {
    Message,
    NodeUpdate,
    Telemetry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    Message(ChatMessage),
    NodeUpdate(NodeRecord),
    Telemetry(TelemetrySample),
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        match self {
            Notification::Message(_) => EventKind::Message,
            Notification::NodeUpdate(_) => EventKind::NodeUpdate,
            Notification::Telemetry(_) => EventKind::Telemetry,
        }
    }
}

type Handler = Box<dyn FnMut(Notification) + Send>;

#[derive(Default)]
struct Handlers {
    active: HashMap<EventKind, Handler>,
    /// Bumped on every register/unregister of a kind
    generations: HashMap<EventKind, u64>,
}

impl Handlers {
    fn bump(&mut self, kind: EventKind) -> u64 {
        let generation = self.generations.entry(kind).or_default();
        *generation += 1;
        *generation
    }

    fn generation(&self, kind: EventKind) -> u64 {
        self.generations.get(&kind).copied().unwrap_or_default()
    }
}

/// One handler per event kind; registering again replaces the previous one.
#[derive(Clone, Default)]
struct Registry {
    handlers: Arc<Mutex<Handlers>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, kind: EventKind, handler: Handler) {
        let mut handlers = self.lock();
        handlers.bump(kind);
        if handlers.active.insert(kind, handler).is_some() {
            debug!("Replaced {kind} handler");
        }
    }

    fn clear(&self, kind: EventKind) {
        let mut handlers = self.lock();
        handlers.bump(kind);
        handlers.active.remove(&kind);
    }

    /// Lend out the handler together with the generation it was taken at
    fn take(&self, kind: EventKind) -> Option<(Handler, u64)> {
        let mut handlers = self.lock();
        let generation = handlers.generation(kind);
        handlers.active.remove(&kind).map(|handler| (handler, generation))
    }

    /// Put a handler back after running it, unless it was replaced or
    /// unregistered meanwhile
    fn restore(&self, kind: EventKind, handler: Handler, taken_at: u64) {
        let mut handlers = self.lock();
        if handlers.generation(kind) != taken_at {
            debug!("Dropping stale {kind} handler");
            return;
        }
        handlers.active.entry(kind).or_insert(handler);
    }
}

/// Producer half. Cheap to clone and never waits on the consumer.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Notification>,
    registry: Registry,
}

/// Consumer half. Runs registered handlers on whatever context drives it.
pub struct NotificationLoop {
    rx: mpsc::UnboundedReceiver<Notification>,
    registry: Registry,
}

/// Create a connected dispatcher/loop pair
pub fn channel() -> (Dispatcher, NotificationLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = Registry::default();
    (
        Dispatcher {
            tx,
            registry: registry.clone(),
        },
        NotificationLoop { rx, registry },
    )
}

impl Dispatcher {
    /// Queue a notification for the consumer context. Fire-and-forget.
    pub fn emit(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification loop gone; dropping event");
        }
    }

    pub fn on_message<F>(&self, mut handler: F)
    where
        F: FnMut(ChatMessage) + Send + 'static,
    {
        self.registry.set(
            EventKind::Message,
            Box::new(move |n| {
                if let Notification::Message(message) = n {
                    handler(message);
                }
            }),
        );
    }

    pub fn on_node_update<F>(&self, mut handler: F)
    where
        F: FnMut(NodeRecord) + Send + 'static,
    {
        self.registry.set(
            EventKind::NodeUpdate,
            Box::new(move |n| {
                if let Notification::NodeUpdate(node) = n {
                    handler(node);
                }
            }),
        );
    }

    pub fn on_telemetry<F>(&self, mut handler: F)
    where
        F: FnMut(TelemetrySample) + Send + 'static,
    {
        self.registry.set(
            EventKind::Telemetry,
            Box::new(move |n| {
                if let Notification::Telemetry(sample) = n {
                    handler(sample);
                }
            }),
        );
    }

    pub fn unregister(&self, kind: EventKind) {
        self.registry.clear(kind);
    }
}

impl NotificationLoop {
    /// Deliver notifications until every [`Dispatcher`] is dropped
    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            self.deliver(notification);
        }
        debug!("Notification loop finished");
    }

    /// Wait for the next notification and deliver it. Returns `false` once
    /// the producer side is gone.
    pub async fn dispatch_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(notification) => {
                self.deliver(notification);
                true
            }
            None => false,
        }
    }

    /// Deliver everything already queued without waiting. Returns the number
    /// of notifications taken off the queue.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(notification) = self.rx.try_recv() {
            self.deliver(notification);
            delivered += 1;
        }
        delivered
    }

    fn deliver(&self, notification: Notification) {
        let kind = notification.kind();
        // Run outside the registry lock so a handler may re-register or unregister
        let Some((mut handler, generation)) = self.registry.take(kind) else {
            debug!("No {kind} handler registered");
            return;
        };
        handler(notification);
        self.registry.restore(kind, handler, generation);
    }
}
