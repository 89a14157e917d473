//! In-process transport.
//!
//! Commands are answered by registered handlers and events are emitted
//! directly into the listener registry. Used as the backend double in tests
//! and by the offline mode of the pill binary.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use notype_core::error::{NotypeError, Result};
use notype_core::events::PushEvent;

use super::{EventHandler, ListenerId, ListenerRegistry, Transport, WindowHandle};

type CommandFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type CommandHandler = Arc<dyn Fn(Value) -> CommandFuture + Send + Sync>;

/// Transport that keeps the "backend" in the same process.
pub struct LoopbackTransport {
    commands: Mutex<HashMap<String, CommandHandler>>,
    calls: Mutex<Vec<(String, Value)>>,
    listeners: ListenerRegistry,
    window: Mutex<Option<Arc<dyn WindowHandle>>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            listeners: ListenerRegistry::new(),
            window: Mutex::new(None),
        }
    }

    /// Answer `command` with an async handler.
    pub fn on_command<F, Fut>(&self, command: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: CommandHandler = Arc::new(move |args| -> CommandFuture { Box::pin(handler(args)) });
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(command.to_string(), handler);
    }

    /// Answer `command` with a fixed value.
    pub fn respond(&self, command: &str, value: Value) {
        self.on_command(command, move |_| {
            let value = value.clone();
            async move { Ok::<Value, NotypeError>(value) }
        });
    }

    /// Reject `command` with a backend-style error string.
    pub fn fail(&self, command: &str, message: &str) {
        let name = command.to_string();
        let message = message.to_string();
        self.on_command(command, move |_| {
            let err = NotypeError::command(name.clone(), message.clone());
            async move { Err::<Value, NotypeError>(err) }
        });
    }

    /// Attach a window handle.
    pub fn set_window(&self, window: Arc<dyn WindowHandle>) {
        *self.window.lock().unwrap_or_else(|e| e.into_inner()) = Some(window);
    }

    /// Emit a raw payload on `channel`. Returns the number of handlers run.
    pub fn emit(&self, channel: &str, payload: Value) -> usize {
        self.listeners.dispatch(channel, &payload)
    }

    /// Emit a typed push event on its channel.
    pub fn emit_event(&self, event: &PushEvent) -> Result<usize> {
        Ok(self.emit(event.channel(), event.payload()?))
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners.listener_count(channel)
    }

    /// Every command invoked so far, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Arguments of every call to `command`.
    pub fn calls_to(&self, command: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == command)
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((command.to_string(), args.clone()));

        let handler = self
            .commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(command)
            .cloned();

        match handler {
            Some(handler) => handler(args).await,
            None => Err(NotypeError::command(command, "unknown command")),
        }
    }

    fn listen(&self, channel: &str, handler: EventHandler) -> Result<ListenerId> {
        Ok(self.listeners.add(channel, handler))
    }

    fn unlisten(&self, channel: &str, id: ListenerId) {
        self.listeners.remove(channel, id);
    }

    fn current_window(&self) -> Option<Arc<dyn WindowHandle>> {
        self.window.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Window handle backed by plain memory.
///
/// Dragging or position queries can be switched off to mimic hosts that
/// do not support them.
pub struct MemoryWindow {
    position: Mutex<(f64, f64)>,
    drag_supported: AtomicBool,
    position_supported: AtomicBool,
    drags: AtomicUsize,
}

impl MemoryWindow {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: Mutex::new((x, y)),
            drag_supported: AtomicBool::new(true),
            position_supported: AtomicBool::new(true),
            drags: AtomicUsize::new(0),
        }
    }

    /// Simulate the window manager moving the window.
    pub fn move_to(&self, x: f64, y: f64) {
        *self.position.lock().unwrap_or_else(|e| e.into_inner()) = (x, y);
    }

    pub fn set_drag_supported(&self, supported: bool) {
        self.drag_supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_position_supported(&self, supported: bool) {
        self.position_supported.store(supported, Ordering::SeqCst);
    }

    /// Number of successful `start_dragging` calls.
    pub fn drag_count(&self) -> usize {
        self.drags.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowHandle for MemoryWindow {
    async fn outer_position(&self) -> Result<(f64, f64)> {
        if !self.position_supported.load(Ordering::SeqCst) {
            return Err(NotypeError::BestEffortIo(
                "outer position is not supported".to_string(),
            ));
        }
        Ok(*self.position.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn start_dragging(&self) -> Result<()> {
        if !self.drag_supported.load(Ordering::SeqCst) {
            return Err(NotypeError::BestEffortIo(
                "dragging is not supported".to_string(),
            ));
        }
        self.drags.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
