//! Runtime dependency gate.

use serde_json::Value;

use notype_core::error::Result;

use crate::bridge::{command, Bridge};

/// Queries the backend for missing runtime prerequisites.
///
/// The gate only fetches and interprets the list; the session machine
/// decides what the result does to the toggle and the displayed state.
#[derive(Debug, Clone)]
pub struct DependencyGate {
    bridge: Bridge,
}

impl DependencyGate {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    /// Invoke `check_runtime_dependencies`.
    ///
    /// `Ok(None)` means the backend answered with something other than a
    /// list, which carries no information.
    pub async fn check(&self) -> Result<Option<Vec<String>>> {
        let result = self
            .bridge
            .invoke(command::CHECK_RUNTIME_DEPENDENCIES, None)
            .await?;
        let missing = parse_missing(result);
        match &missing {
            Some(list) if !list.is_empty() => {
                tracing::warn!(missing = ?list, "Runtime dependencies missing")
            }
            Some(_) => tracing::debug!("All runtime dependencies available"),
            None => tracing::debug!("Dependency check returned no list"),
        }
        Ok(missing)
    }
}

/// Interpret a dependency check result. Non-string entries are skipped.
pub fn parse_missing(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Status hint for a non-empty missing list.
pub fn missing_message(missing: &[String]) -> String {
    format!("missing: {}", missing.join(", "))
}

/// One line per missing item, as shown in the settings view.
pub fn report_lines(missing: &[String]) -> Vec<String> {
    if missing.is_empty() {
        return vec!["All runtime dependencies are available.".to_string()];
    }
    missing.iter().map(|m| format!("missing: {m}")).collect()
}
