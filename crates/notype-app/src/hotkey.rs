//! Control calls forwarded to the running backend over the session bus.
//!
//! A desktop global hotkey runs `notype-pill toggle`, which lands here. The
//! call never blocks for long and never retries; on failure the user gets a
//! desktop notification.

use notype_core::config::BusConfig;
use notype_core::error::{NotypeError, Result};

pub const TOGGLE_RECORDING: &str = "ToggleRecording";
pub const SHOW_SETTINGS: &str = "ShowSettings";
pub const QUIT: &str = "Quit";

/// Call a no-argument method on the backend's control interface.
pub async fn call_control(bus: &BusConfig, method: &str) -> Result<()> {
    let call = async {
        let conn = zbus::Connection::session().await?;
        conn.call_method(
            Some(bus.bus_name.as_str()),
            bus.object_path.as_str(),
            Some(bus.control_interface.as_str()),
            method,
            &(),
        )
        .await?;
        Ok::<(), zbus::Error>(())
    };

    match tokio::time::timeout(bus.call_timeout(), call).await {
        Ok(Ok(())) => {
            tracing::info!(method, "Control call delivered");
            Ok(())
        }
        Ok(Err(e)) => Err(NotypeError::Bus(format!("{method}: {e}"))),
        Err(_) => Err(NotypeError::Bus(format!(
            "{method}: no reply within {} ms",
            bus.call_timeout_ms
        ))),
    }
}

/// Raise a desktop notification. Failures are only logged.
pub async fn notify(summary: &str, body: &str) {
    let status = tokio::process::Command::new("notify-send")
        .arg("--app-name=notype")
        .arg(summary)
        .arg(body)
        .status()
        .await;
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::debug!(%status, "notify-send exited unsuccessfully"),
        Err(e) => tracing::debug!(error = %e, "notify-send unavailable"),
    }
}

/// Forward a toggle request. Failure is reported by notification only.
pub async fn toggle(bus: &BusConfig) {
    if let Err(e) = call_control(bus, TOGGLE_RECORDING).await {
        tracing::warn!(error = %e, "Toggle request failed");
        notify("notype", &format!("toggle failed: {}", e.user_message())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_bus_fails_fast() {
        let bus = BusConfig {
            bus_name: "dev.notype.test.nonexistent".to_string(),
            call_timeout_ms: 200,
            ..BusConfig::default()
        };
        let err = call_control(&bus, QUIT).await.unwrap_err();
        assert!(matches!(err, NotypeError::Bus(_)));
        assert!(err.to_string().contains("Quit"));
    }
}
