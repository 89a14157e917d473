use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NotypeError, Result};

/// Top-level configuration for the pill client.
///
/// Loaded from `~/.config/notype/client.toml` by default. This is the
/// client's own file; the backend's configuration object is opaque here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NotypeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// How early the pill shows a transition for a user command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTiming {
    /// Contract v1: wait for the command result or a push event.
    EventDriven,
    /// Contract v2: show the target state as soon as the command is issued.
    #[default]
    Optimistic,
}

impl TransitionTiming {
    pub fn contract_version(&self) -> u8 {
        match self {
            TransitionTiming::EventDriven => 1,
            TransitionTiming::Optimistic => 2,
        }
    }
}

/// Session reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval of the `get_runtime_state` fallback poll.
    pub poll_interval_ms: u64,
    /// A poll result is ignored if a push event arrived within this window.
    pub push_grace_ms: u64,
    /// Transition timing contract for user commands.
    pub transition_timing: TransitionTiming,
    /// Hotkey label shown in status hints.
    pub hotkey_label: String,
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn push_grace(&self) -> Duration {
        Duration::from_millis(self.push_grace_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1200,
            push_grace_ms: 1200,
            transition_timing: TransitionTiming::Optimistic,
            hotkey_label: "Alt+X".to_string(),
        }
    }
}

/// Floating pill window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Force the backend's `autoType` on when the pill starts.
    pub enforce_auto_type: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            enforce_auto_type: true,
        }
    }
}

/// Session bus coordinates of the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub bus_name: String,
    pub object_path: String,
    /// Interface exposing `ToggleRecording`, `ShowSettings` and `Quit`.
    pub control_interface: String,
    /// Candidate interfaces for the command/event bridge, probed in order.
    pub bridge_interfaces: Vec<String>,
    /// Timeout of control calls such as `ToggleRecording`.
    pub call_timeout_ms: u64,
    /// Timeout of bridge `Invoke` calls. `stop_recording` only answers once
    /// transcription and typing are done. 0 disables the limit.
    pub invoke_timeout_ms: u64,
}

impl BusConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn invoke_timeout(&self) -> Option<Duration> {
        (self.invoke_timeout_ms > 0).then(|| Duration::from_millis(self.invoke_timeout_ms))
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_name: "dev.notype.app".to_string(),
            object_path: "/dev/notype/app".to_string(),
            control_interface: "dev.notype.app".to_string(),
            bridge_interfaces: vec![
                "dev.notype.app.Bridge".to_string(),
                "dev.notype.app".to_string(),
            ],
            call_timeout_ms: 1500,
            invoke_timeout_ms: 120_000,
        }
    }
}

/// Resolve the config file path.
///
/// Priority: explicit path > `NOTYPE_CLIENT_CONFIG` env var >
/// `$HOME/.config/notype/client.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(p) = std::env::var("NOTYPE_CLIENT_CONFIG") {
        return PathBuf::from(p);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("notype")
            .join("client.toml");
    }
    PathBuf::from("client.toml")
}
