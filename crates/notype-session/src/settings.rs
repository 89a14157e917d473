//! Backend configuration access.
//!
//! The backend configuration object is opaque to the client except for
//! `autoType`, which must be on for the floating pill to type into the
//! focused application.

use serde_json::{json, Map, Value};

use notype_core::error::Result;

use crate::bridge::{command, Bridge};

pub const AUTO_TYPE_KEY: &str = "autoType";

#[derive(Debug, Clone)]
pub struct SettingsSync {
    bridge: Bridge,
}

impl SettingsSync {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    /// Fetch the backend configuration object. Anything but a JSON object
    /// is a serialization error.
    pub async fn load(&self) -> Result<Value> {
        let cfg: Map<String, Value> = self.bridge.invoke_as(command::GET_CONFIG, None).await?;
        Ok(Value::Object(cfg))
    }

    /// Write a full configuration object back.
    pub async fn save(&self, cfg: &Value) -> Result<()> {
        self.bridge
            .invoke(command::UPDATE_CONFIG, Some(json!({ "cfg": cfg })))
            .await?;
        Ok(())
    }

    /// Make sure `autoType` is on. Returns `true` if it had to be changed.
    ///
    /// Every other field is written back exactly as it was read.
    pub async fn ensure_auto_type(&self) -> Result<bool> {
        let mut cfg = self.load().await?;
        if auto_type_enabled(&cfg) {
            return Ok(false);
        }
        if let Some(map) = cfg.as_object_mut() {
            map.insert(AUTO_TYPE_KEY.to_string(), Value::Bool(true));
        }
        self.save(&cfg).await?;
        tracing::info!("autoType was off; enabled for direct input");
        Ok(true)
    }

    /// Ask the backend to open its settings window.
    pub async fn open(&self) -> Result<()> {
        self.bridge.invoke(command::SHOW_SETTINGS, None).await?;
        Ok(())
    }
}

pub fn auto_type_enabled(cfg: &Value) -> bool {
    cfg.get(AUTO_TYPE_KEY).and_then(Value::as_bool) == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use notype_core::error::NotypeError;
    use std::sync::Arc;

    fn sync_with(cfg: Value) -> (Arc<LoopbackTransport>, SettingsSync) {
        let transport = Arc::new(LoopbackTransport::new());
        transport.respond(command::GET_CONFIG, cfg);
        transport.respond(command::UPDATE_CONFIG, Value::Null);
        let sync = SettingsSync::new(Bridge::with_transport(transport.clone()));
        (transport, sync)
    }

    #[test]
    fn test_auto_type_enabled() {
        assert!(auto_type_enabled(&json!({ "autoType": true })));
        assert!(!auto_type_enabled(&json!({ "autoType": false })));
        assert!(!auto_type_enabled(&json!({ "autoType": "yes" })));
        assert!(!auto_type_enabled(&json!({})));
    }

    #[tokio::test]
    async fn test_ensure_auto_type_preserves_other_fields() {
        let (transport, sync) = sync_with(json!({
            "autoType": false,
            "model": "base",
            "hotkey": { "toggle": "Alt+X" },
            "futureField": [1, 2, 3]
        }));

        assert!(sync.ensure_auto_type().await.unwrap());
        assert_eq!(
            transport.calls_to(command::UPDATE_CONFIG),
            vec![json!({
                "cfg": {
                    "autoType": true,
                    "model": "base",
                    "hotkey": { "toggle": "Alt+X" },
                    "futureField": [1, 2, 3]
                }
            })]
        );
    }

    #[tokio::test]
    async fn test_ensure_auto_type_noop_when_on() {
        let (transport, sync) = sync_with(json!({ "autoType": true }));
        assert!(!sync.ensure_auto_type().await.unwrap());
        assert!(transport.calls_to(command::UPDATE_CONFIG).is_empty());
    }

    #[tokio::test]
    async fn test_ensure_auto_type_adds_missing_key() {
        let (transport, sync) = sync_with(json!({ "model": "small" }));
        assert!(sync.ensure_auto_type().await.unwrap());
        assert_eq!(
            transport.calls_to(command::UPDATE_CONFIG),
            vec![json!({ "cfg": { "model": "small", "autoType": true } })]
        );
    }

    #[tokio::test]
    async fn test_load_rejects_non_object() {
        let (_transport, sync) = sync_with(json!("nope"));
        assert!(matches!(
            sync.load().await.unwrap_err(),
            NotypeError::Serialization(_)
        ));
    }

    #[tokio::test]
    async fn test_open_settings_failure_propagates() {
        let transport = Arc::new(LoopbackTransport::new());
        transport.fail(command::SHOW_SETTINGS, "window not found");
        let sync = SettingsSync::new(Bridge::with_transport(transport));
        assert_eq!(sync.open().await.unwrap_err().user_message(), "window not found");
    }
}
