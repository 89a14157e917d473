//! Shared domain types for the notype client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Status of the current recording/transcription cycle shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SessionState {
    /// Nothing in progress; initial and "at rest" state.
    #[default]
    Idle,
    /// Audio capture is running.
    Recording,
    /// Capture stopped, transcription in progress.
    Processing,
    /// A cycle finished and its result was delivered.
    Ready,
    /// The last action failed; display-only, behaves like `Idle` for the toggle.
    Error,
    /// Runtime prerequisites are missing; the toggle is disabled.
    MissingDependencies,
}

impl SessionState {
    pub const ALL: [SessionState; 6] = [
        SessionState::Idle,
        SessionState::Recording,
        SessionState::Processing,
        SessionState::Ready,
        SessionState::Error,
        SessionState::MissingDependencies,
    ];

    /// Canonical name, as rendered in the status label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Processing => "Processing",
            SessionState::Ready => "Ready",
            SessionState::Error => "Error",
            SessionState::MissingDependencies => "MissingDependencies",
        }
    }

    /// CSS-style class for the status dot (`state-dot <class>`).
    pub fn dot_class(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Processing => "processing",
            SessionState::Ready => "ready",
            SessionState::Error => "error",
            SessionState::MissingDependencies => "missing",
        }
    }

    /// States from which a toggle starts a new recording.
    pub fn is_at_rest(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Ready | SessionState::Error
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl fmt::Display for UnknownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session state: {:?}", self.0)
    }
}

impl std::error::Error for UnknownState {}

impl FromStr for SessionState {
    type Err = UnknownState;

    /// Accepts the canonical names as well as the backend's camelCase and
    /// snake_case spellings (`"idle"`, `"missing_dependencies"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        SessionState::ALL
            .into_iter()
            .find(|state| state.as_str().to_lowercase() == folded)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for SessionState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Screen coordinates of the floating pill window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

impl WindowPosition {
    /// Convert raw coordinates reported by the host window manager.
    ///
    /// Returns `None` unless both values are finite and fit in `i32`.
    pub fn from_raw(x: f64, y: f64) -> Option<Self> {
        let in_range = |v: f64| v.is_finite() && v >= i32::MIN as f64 && v <= i32::MAX as f64;
        if in_range(x) && in_range(y) {
            Some(Self {
                x: x.round() as i32,
                y: y.round() as i32,
            })
        } else {
            None
        }
    }
}

/// Where an update to the session state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    /// Explicit local transition (user command or its result).
    Local,
    /// Backend push event.
    Push,
    /// Periodic status poll.
    Poll,
    /// Dependency gate.
    Gate,
}

impl fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateSource::Local => "local",
            UpdateSource::Push => "push",
            UpdateSource::Poll => "poll",
            UpdateSource::Gate => "gate",
        };
        f.write_str(name)
    }
}
