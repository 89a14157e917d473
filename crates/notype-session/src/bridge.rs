//! Command/event bridge.
//!
//! Uniform access to backend commands, push-event channels and the current
//! window, over whichever transport the host exposes. The bridge is plumbing
//! only: retry and fallback policy belongs to its callers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use notype_core::error::{NotypeError, Result};

use crate::transport::{EventHandler, ListenerId, Transport, TransportProbe, WindowHandle};

/// Backend command names.
pub mod command {
    pub const START_RECORDING: &str = "start_recording";
    pub const STOP_RECORDING: &str = "stop_recording";
    pub const GET_RUNTIME_STATE: &str = "get_runtime_state";
    pub const CHECK_RUNTIME_DEPENDENCIES: &str = "check_runtime_dependencies";
    pub const SET_PILL_POSITION: &str = "set_pill_position";
    pub const SHOW_SETTINGS: &str = "show_settings";
    pub const GET_CONFIG: &str = "get_config";
    pub const UPDATE_CONFIG: &str = "update_config";
}

/// Cheaply cloneable handle to the transport chosen at startup.
#[derive(Clone, Default)]
pub struct Bridge {
    transport: Option<Arc<dyn Transport>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("transport", &self.transport_name())
            .finish()
    }
}

impl Bridge {
    /// Run `probes` in order and keep the first transport found.
    ///
    /// Probing happens once; the result is cached in the returned bridge.
    pub async fn probe(probes: &[Box<dyn TransportProbe>]) -> Self {
        for probe in probes {
            match probe.probe().await {
                Some(transport) => {
                    tracing::info!(
                        probe = probe.name(),
                        transport = transport.name(),
                        "Bridge transport located"
                    );
                    return Self::with_transport(transport);
                }
                None => tracing::debug!(probe = probe.name(), "Transport probe found nothing"),
            }
        }
        tracing::warn!("No bridge transport available; commands will fail");
        Self::unavailable()
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    pub fn unavailable() -> Self {
        Self { transport: None }
    }

    pub fn is_available(&self) -> bool {
        self.transport.is_some()
    }

    pub fn transport_name(&self) -> Option<&str> {
        self.transport.as_deref().map(|t| t.name())
    }

    /// Invoke `command`. Missing arguments are sent as an empty object.
    pub async fn invoke(&self, command: &str, args: Option<Value>) -> Result<Value> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(NotypeError::BridgeUnavailable)?;
        let args = args.unwrap_or_else(|| Value::Object(Map::new()));
        tracing::trace!(command, "Invoking backend command");
        transport.invoke(command, args).await
    }

    /// Invoke `command` and deserialize its result.
    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Option<Value>,
    ) -> Result<T> {
        let value = self.invoke(command, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribe to raw payloads on `channel`.
    ///
    /// Never fails: without a transport, or if the transport refuses the
    /// listener, the returned subscription is inert.
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let Some(transport) = self.transport.as_ref() else {
            tracing::debug!(channel, "No transport; subscription is a no-op");
            return Subscription::noop(channel);
        };

        let handler: EventHandler = Arc::new(handler);
        match transport.listen(channel, handler) {
            Ok(id) => Subscription {
                channel: channel.to_string(),
                inner: Some((Arc::clone(transport), id)),
            },
            Err(e) => {
                tracing::warn!(channel, error = %e, "Subscription refused by transport");
                Subscription::noop(channel)
            }
        }
    }

    /// Subscribe to typed payloads on `channel`. Payloads that do not
    /// deserialize into `T` are logged and dropped.
    pub fn subscribe_typed<T, F>(&self, channel: &str, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = channel.to_string();
        self.subscribe(channel, move |payload| {
            match serde_json::from_value::<T>(payload) {
                Ok(event) => handler(event),
                Err(e) => tracing::warn!(channel = %name, error = %e, "Dropping malformed event"),
            }
        })
    }

    pub fn current_window(&self) -> Option<Arc<dyn WindowHandle>> {
        self.transport.as_ref().and_then(|t| t.current_window())
    }
}

/// Live registration of a handler on one channel.
///
/// `unsubscribe` is idempotent and also runs on drop. Once it returns, the
/// handler is not invoked again.
pub struct Subscription {
    channel: String,
    inner: Option<(Arc<dyn Transport>, ListenerId)>,
}

impl Subscription {
    fn noop(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            inner: None,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some((transport, id)) = self.inner.take() {
            transport.unlisten(&self.channel, id);
            tracing::debug!(channel = %self.channel, "Unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("active", &self.is_active())
            .finish()
    }
}
