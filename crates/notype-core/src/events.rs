//! Push event payloads delivered by the backend.
//!
//! The backend emits each payload on a namespaced channel
//! (`notype://<name>`). Payloads use camelCase field names on the wire.

use serde::{Deserialize, Serialize};

use crate::error::{NotypeError, Result};
use crate::types::SessionState;

/// Prefix of every backend event channel.
pub const CHANNEL_PREFIX: &str = "notype://";

/// Wire names of the channels the client consumes.
pub mod channel {
    pub const TRANSCRIPT: &str = "notype://transcript";
    pub const ERROR: &str = "notype://error";
    pub const MODEL_DOWNLOAD: &str = "notype://model-download";
    pub const DEPENDENCY_WARNING: &str = "notype://dependency-warning";

    pub const ALL: [&str; 4] = [TRANSCRIPT, ERROR, MODEL_DOWNLOAD, DEPENDENCY_WARNING];
}

/// A recording/processing cycle advanced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Live partial hypothesis; the pill does not render it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub partial_text: String,
}

impl TranscriptEvent {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            final_text: None,
            latency_ms: None,
            partial_text: String::new(),
        }
    }

    pub fn with_final_text(mut self, text: impl Into<String>) -> Self {
        self.final_text = Some(text.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Whether the cycle produced any text worth typing.
    pub fn has_final_text(&self) -> bool {
        self.final_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// A backend failure. `details` is diagnostic-only and never rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub user_message: String,
    #[serde(default)]
    pub details: String,
}

/// Progress of an out-of-band model download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDownloadEvent {
    pub status: String,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ModelDownloadEvent {
    /// Progress clamped to `0..=100` and rounded for display.
    pub fn percent(&self) -> u8 {
        if !self.progress.is_finite() {
            return 0;
        }
        self.progress.clamp(0.0, 100.0).round() as u8
    }
}

/// Runtime prerequisites the backend could not find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyWarningEvent {
    pub missing: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_hint: Option<String>,
}

/// Any event the client consumes, tagged by channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Transcript(TranscriptEvent),
    Error(ErrorEvent),
    ModelDownload(ModelDownloadEvent),
    DependencyWarning(DependencyWarningEvent),
}

impl PushEvent {
    /// Channel this event is delivered on.
    pub fn channel(&self) -> &'static str {
        match self {
            PushEvent::Transcript(_) => channel::TRANSCRIPT,
            PushEvent::Error(_) => channel::ERROR,
            PushEvent::ModelDownload(_) => channel::MODEL_DOWNLOAD,
            PushEvent::DependencyWarning(_) => channel::DEPENDENCY_WARNING,
        }
    }

    /// Decode a raw payload received on `channel`.
    pub fn decode(channel_name: &str, payload: serde_json::Value) -> Result<Self> {
        let event = match channel_name {
            channel::TRANSCRIPT => PushEvent::Transcript(serde_json::from_value(payload)?),
            channel::ERROR => PushEvent::Error(serde_json::from_value(payload)?),
            channel::MODEL_DOWNLOAD => PushEvent::ModelDownload(serde_json::from_value(payload)?),
            channel::DEPENDENCY_WARNING => {
                PushEvent::DependencyWarning(serde_json::from_value(payload)?)
            }
            other => {
                return Err(NotypeError::SubscriptionUnavailable(other.to_string()));
            }
        };
        Ok(event)
    }

    /// Encode the payload for the wire.
    pub fn payload(&self) -> Result<serde_json::Value> {
        let value = match self {
            PushEvent::Transcript(e) => serde_json::to_value(e)?,
            PushEvent::Error(e) => serde_json::to_value(e)?,
            PushEvent::ModelDownload(e) => serde_json::to_value(e)?,
            PushEvent::DependencyWarning(e) => serde_json::to_value(e)?,
        };
        Ok(value)
    }
}
