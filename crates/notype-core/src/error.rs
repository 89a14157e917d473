use thiserror::Error;

/// Top-level error type for the notype client.
///
/// Variants follow the propagation policy of the client: anything a user
/// action triggers is shown as a short message, background failures are only
/// logged. See [`NotypeError::user_message`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotypeError {
    #[error("Bridge unavailable: no command transport was found")]
    BridgeUnavailable,

    #[error("Command {command} failed: {message}")]
    CommandFailure { command: String, message: String },

    #[error("Subscription unavailable for channel {0}")]
    SubscriptionUnavailable(String),

    #[error("Best-effort I/O failed: {0}")]
    BestEffortIo(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NotypeError {
    /// Build a `CommandFailure` from anything the backend rejected with.
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        NotypeError::CommandFailure {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Short, human-readable text for the status hint.
    ///
    /// Backend rejections are formatted `<userMessage> (<details>)`; only the
    /// user-facing part is returned, the details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            NotypeError::CommandFailure { message, .. } => strip_details(message).to_string(),
            NotypeError::BridgeUnavailable => "backend is not reachable".to_string(),
            other => other.to_string(),
        }
    }
}

/// Drop a trailing `" (<details>)"` group from a backend error string.
fn strip_details(message: &str) -> &str {
    let trimmed = message.trim_end();
    if !trimmed.ends_with(')') {
        return trimmed;
    }
    match trimmed.rfind(" (") {
        Some(idx) if idx > 0 => &trimmed[..idx],
        _ => trimmed,
    }
}

impl From<toml::de::Error> for NotypeError {
    fn from(err: toml::de::Error) -> Self {
        NotypeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NotypeError {
    fn from(err: toml::ser::Error) -> Self {
        NotypeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for NotypeError {
    fn from(err: serde_json::Error) -> Self {
        NotypeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for notype client operations.
pub type Result<T> = std::result::Result<T, NotypeError>;
