//! Session-bus transport for the command/event bridge.
//!
//! The backend object exposes `Invoke(command, argsJson) -> resultJson` and
//! emits `Event(name, payloadJson)` signals. Which interface carries them is
//! discovered by introspection, from an ordered list of candidates.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use notype_core::config::BusConfig;
use notype_core::error::{NotypeError, Result};
use notype_core::events::{PushEvent, CHANNEL_PREFIX};
use notype_session::transport::{
    EventHandler, ListenerId, ListenerRegistry, Transport, TransportProbe, WindowHandle,
};

const INVOKE_METHOD: &str = "Invoke";
const EVENT_SIGNAL: &str = "Event";

pub struct DbusTransport {
    proxy: zbus::Proxy<'static>,
    interface: String,
    listeners: Arc<ListenerRegistry>,
    pump: JoinHandle<()>,
    timeout: Option<Duration>,
}

impl DbusTransport {
    /// Bind to `interface` on the backend object and start the event pump.
    pub async fn connect(
        conn: &zbus::Connection,
        bus: &BusConfig,
        interface: &str,
    ) -> zbus::Result<Self> {
        let proxy = zbus::Proxy::new(
            conn,
            bus.bus_name.clone(),
            bus.object_path.clone(),
            interface.to_string(),
        )
        .await?;

        let mut signals = proxy.receive_signal(EVENT_SIGNAL).await?;
        let listeners = Arc::new(ListenerRegistry::new());
        let registry = Arc::clone(&listeners);
        let pump = tokio::spawn(async move {
            while let Some(message) = signals.next().await {
                let (name, payload) = match message.body().deserialize::<(String, String)>() {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(error = %e, "Malformed Event signal");
                        continue;
                    }
                };
                route_event(&registry, &name, &payload);
            }
            tracing::debug!("Event signal stream closed");
        });

        Ok(Self {
            proxy,
            interface: interface.to_string(),
            listeners,
            pump,
            timeout: bus.invoke_timeout(),
        })
    }
}

impl Drop for DbusTransport {
    fn drop(&mut self) {
        self.pump.abort();
        self.listeners.clear();
    }
}

#[async_trait]
impl Transport for DbusTransport {
    fn name(&self) -> &str {
        &self.interface
    }

    async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
        let args = serde_json::to_string(&args)?;
        let body = (command, args.as_str());
        let call = self.proxy.call(INVOKE_METHOD, &body);
        let reply: String = bounded(command, self.timeout, call).await?;
        if reply.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&reply)?)
    }

    fn listen(&self, channel: &str, handler: EventHandler) -> Result<ListenerId> {
        Ok(self.listeners.add(channel, handler))
    }

    fn unlisten(&self, channel: &str, id: ListenerId) {
        self.listeners.remove(channel, id);
    }

    fn current_window(&self) -> Option<Arc<dyn WindowHandle>> {
        None
    }
}

/// Locates the backend on the session bus.
pub struct DbusProbe {
    bus: BusConfig,
}

impl DbusProbe {
    pub fn new(bus: BusConfig) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl TransportProbe for DbusProbe {
    fn name(&self) -> &str {
        "session-bus"
    }

    async fn probe(&self) -> Option<Arc<dyn Transport>> {
        let conn = match zbus::Connection::session().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(error = %e, "Session bus unavailable");
                return None;
            }
        };

        let xml = match introspect(&conn, &self.bus).await {
            Ok(xml) => xml,
            Err(e) => {
                tracing::debug!(bus_name = %self.bus.bus_name, error = %e, "Backend object not found");
                return None;
            }
        };

        let interface = self
            .bus
            .bridge_interfaces
            .iter()
            .find(|candidate| exports_invoke(&xml, candidate))?;

        match DbusTransport::connect(&conn, &self.bus, interface).await {
            Ok(transport) => Some(Arc::new(transport)),
            Err(e) => {
                tracing::warn!(%interface, error = %e, "Could not bind bridge interface");
                None
            }
        }
    }
}

async fn introspect(conn: &zbus::Connection, bus: &BusConfig) -> zbus::Result<String> {
    let proxy = zbus::fdo::IntrospectableProxy::builder(conn)
        .destination(bus.bus_name.as_str())?
        .path(bus.object_path.as_str())?
        .build()
        .await?;
    Ok(proxy.introspect().await?)
}

/// Whether the introspection `xml` declares `interface` with an `Invoke` method.
fn exports_invoke(xml: &str, interface: &str) -> bool {
    let open = format!("<interface name=\"{interface}\"");
    let Some(start) = xml.find(&open) else {
        return false;
    };
    let block = &xml[start..];
    let end = block.find("</interface>").unwrap_or(block.len());
    block[..end].contains(&format!("<method name=\"{INVOKE_METHOD}\""))
}

/// Signals may name the channel with or without the `notype://` prefix.
fn channel_name(name: &str) -> String {
    if name.starts_with(CHANNEL_PREFIX) {
        name.to_string()
    } else {
        format!("{CHANNEL_PREFIX}{name}")
    }
}

/// Validate one `Event` signal and deliver it. Returns the number of
/// listeners reached.
fn route_event(registry: &ListenerRegistry, name: &str, payload: &str) -> usize {
    let channel = channel_name(name);
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(%channel, error = %e, "Event payload is not JSON");
            return 0;
        }
    };
    // Unknown channels and malformed payloads stop at the bus.
    if let Err(e) = PushEvent::decode(&channel, value.clone()) {
        tracing::warn!(%channel, error = %e, "Dropping backend event");
        return 0;
    }
    let delivered = registry.dispatch(&channel, &value);
    tracing::trace!(%channel, delivered, "Event dispatched");
    delivered
}

/// Await a bus call, failing with `timed out` once `limit` elapses.
async fn bounded<T, F>(command: &str, limit: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = zbus::Result<T>>,
{
    let reply = match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            NotypeError::command(
                command,
                format!("timed out (no reply within {} ms)", limit.as_millis()),
            )
        })?,
        None => call.await,
    };
    reply.map_err(|e| call_error(command, e))
}

fn call_error(command: &str, err: zbus::Error) -> NotypeError {
    match err {
        zbus::Error::MethodError(_, Some(message), _) => NotypeError::command(command, message),
        other => NotypeError::Bus(other.to_string()),
    }
}
