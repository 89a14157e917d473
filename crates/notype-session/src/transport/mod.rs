//! Host transport abstractions behind the command/event bridge.
//!
//! A `Transport` is whatever the host exposes for invoking backend commands
//! and delivering push events. Transports are located at startup by an
//! ordered list of `TransportProbe`s; see [`crate::bridge::Bridge::probe`].

pub mod loopback;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use notype_core::error::Result;

pub use loopback::{LoopbackTransport, MemoryWindow};

/// Callback for raw event payloads.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Identifies one registered listener on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Command and event transport exposed by the host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Invoke a backend command and return its raw result.
    async fn invoke(&self, command: &str, args: Value) -> Result<Value>;

    /// Register `handler` for events on `channel`.
    fn listen(&self, channel: &str, handler: EventHandler) -> Result<ListenerId>;

    /// Remove a listener. Unknown ids are ignored.
    fn unlisten(&self, channel: &str, id: ListenerId);

    /// Handle to the window hosting the client, if the host has one.
    fn current_window(&self) -> Option<Arc<dyn WindowHandle>>;
}

/// Position queries and drag initiation for the current window.
///
/// Both operations may be unsupported by the host; callers treat failures
/// as non-fatal.
#[async_trait]
pub trait WindowHandle: Send + Sync {
    /// Outer position of the window as reported by the window manager.
    async fn outer_position(&self) -> Result<(f64, f64)>;

    /// Hand the current pointer gesture to the window manager as a move.
    async fn start_dragging(&self) -> Result<()>;
}

/// One attempt at locating a transport.
#[async_trait]
pub trait TransportProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self) -> Option<Arc<dyn Transport>>;
}

struct Listener {
    id: ListenerId,
    active: Arc<AtomicBool>,
    handler: EventHandler,
}

/// Channel → listeners table shared by transport implementations.
///
/// Dispatch runs handlers outside the lock, in registration order, so a
/// handler may unsubscribe itself. A removed listener is never invoked
/// again, even by a dispatch that had already taken its snapshot.
#[derive(Default)]
pub struct ListenerRegistry {
    channels: Mutex<HashMap<String, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, channel: &str, handler: EventHandler) -> ListenerId {
        let id = ListenerId::new();
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.entry(channel.to_string()).or_default().push(Listener {
            id,
            active: Arc::new(AtomicBool::new(true)),
            handler,
        });
        id
    }

    /// Returns whether the listener was registered.
    pub fn remove(&self, channel: &str, id: ListenerId) -> bool {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(listeners) = channels.get_mut(channel) else {
            return false;
        };
        let Some(idx) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };
        let removed = listeners.remove(idx);
        removed.active.store(false, Ordering::SeqCst);
        if listeners.is_empty() {
            channels.remove(channel);
        }
        true
    }

    /// Deliver `payload` to every listener of `channel`. Returns the number
    /// of handlers invoked.
    pub fn dispatch(&self, channel: &str, payload: &Value) -> usize {
        let snapshot: Vec<(Arc<AtomicBool>, EventHandler)> = {
            let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            match channels.get(channel) {
                Some(listeners) => listeners
                    .iter()
                    .map(|l| (Arc::clone(&l.active), Arc::clone(&l.handler)))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (active, handler) in snapshot {
            if active.load(Ordering::SeqCst) {
                handler(payload.clone());
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.get(channel).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for listener in channels.values().flatten() {
            listener.active.store(false, Ordering::SeqCst);
        }
        channels.clear();
    }
}
