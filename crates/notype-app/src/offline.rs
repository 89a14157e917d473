//! Simulated backend for `--offline` runs.
//!
//! Answers every bridge command in-process and emits the same push events
//! a real backend would, with a short artificial transcription delay.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::{json, Value};

use notype_core::error::NotypeError;
use notype_core::events::{PushEvent, TranscriptEvent};
use notype_core::SessionState;
use notype_session::bridge::command;
use notype_session::transport::{LoopbackTransport, MemoryWindow};

const TRANSCRIBE_DELAY: Duration = Duration::from_millis(600);
const SAMPLE_TEXT: &str = "offline dictation sample";

struct Backend {
    state: SessionState,
    config: Value,
}

/// Build a loopback transport wired to a simulated backend.
pub fn simulated_backend() -> Arc<LoopbackTransport> {
    let transport = Arc::new(LoopbackTransport::new());
    transport.set_window(Arc::new(MemoryWindow::new(24.0, 24.0)));
    let backend = Arc::new(Mutex::new(Backend {
        state: SessionState::Idle,
        config: json!({ "autoType": false, "model": "base", "textCleanup": true }),
    }));

    let weak = Arc::downgrade(&transport);
    let shared = Arc::clone(&backend);
    transport.on_command(command::START_RECORDING, move |_| {
        let result = transition(&shared, &weak, SessionState::Idle, SessionState::Recording);
        async move { result }
    });

    let weak = Arc::downgrade(&transport);
    let shared = Arc::clone(&backend);
    transport.on_command(command::STOP_RECORDING, move |_| {
        let stopped = transition(&shared, &weak, SessionState::Recording, SessionState::Processing);
        let weak = weak.clone();
        let shared = Arc::clone(&shared);
        // Like the real backend, the command resolves once transcription is done.
        async move {
            stopped?;
            tokio::time::sleep(TRANSCRIBE_DELAY).await;
            lock(&shared).state = SessionState::Ready;
            let ready = TranscriptEvent::new(SessionState::Ready)
                .with_final_text(SAMPLE_TEXT)
                .with_latency(TRANSCRIBE_DELAY.as_millis() as u64);
            emit(&weak, PushEvent::Transcript(ready));
            Ok::<Value, NotypeError>(json!(SAMPLE_TEXT))
        }
    });

    let shared = Arc::clone(&backend);
    transport.on_command(command::GET_RUNTIME_STATE, move |_| {
        let state = lock(&shared).state;
        async move { Ok::<Value, NotypeError>(json!(runtime_name(state))) }
    });

    transport.respond(command::CHECK_RUNTIME_DEPENDENCIES, json!([]));
    transport.respond(command::SHOW_SETTINGS, Value::Null);
    transport.respond(command::SET_PILL_POSITION, Value::Null);

    let shared = Arc::clone(&backend);
    transport.on_command(command::GET_CONFIG, move |_| {
        let config = lock(&shared).config.clone();
        async move { Ok::<Value, NotypeError>(config) }
    });

    let shared = Arc::clone(&backend);
    transport.on_command(command::UPDATE_CONFIG, move |args| {
        let result = match args.get("cfg") {
            Some(cfg) if cfg.is_object() => {
                lock(&shared).config = cfg.clone();
                Ok(Value::Null)
            }
            _ => Err(NotypeError::command(
                command::UPDATE_CONFIG,
                "設定が不正です (cfg must be an object)",
            )),
        };
        async move { result }
    });

    transport
}

fn lock(backend: &Mutex<Backend>) -> std::sync::MutexGuard<'_, Backend> {
    backend.lock().unwrap_or_else(|e| e.into_inner())
}

/// Move `from` → `to` and announce it, or reject like the real backend.
fn transition(
    backend: &Mutex<Backend>,
    transport: &Weak<LoopbackTransport>,
    from: SessionState,
    to: SessionState,
) -> notype_core::Result<Value> {
    {
        let mut backend = lock(backend);
        let ready_to_start = from == SessionState::Idle && backend.state == SessionState::Ready;
        if backend.state != from && !ready_to_start {
            let name = if to == SessionState::Recording {
                command::START_RECORDING
            } else {
                command::STOP_RECORDING
            };
            return Err(NotypeError::command(
                name,
                format!("操作できません (state is {})", runtime_name(backend.state)),
            ));
        }
        backend.state = to;
    }
    emit(transport, PushEvent::Transcript(TranscriptEvent::new(to)));
    Ok(Value::Null)
}

fn emit(transport: &Weak<LoopbackTransport>, event: PushEvent) {
    let Some(transport) = transport.upgrade() else {
        return;
    };
    if let Err(e) = transport.emit_event(&event) {
        tracing::warn!(error = %e, "Simulated event not emitted");
    }
}

/// The backend reports its state in camelCase.
fn runtime_name(state: SessionState) -> String {
    let name = state.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notype_core::ClientConfig;
    use notype_session::{Bridge, SessionClient};

    #[test]
    fn test_runtime_name() {
        assert_eq!(runtime_name(SessionState::Idle), "idle");
        assert_eq!(
            runtime_name(SessionState::MissingDependencies),
            "missingDependencies"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_full_cycle_against_simulated_backend() {
        let transport = simulated_backend();
        let client = SessionClient::new(
            Bridge::with_transport(transport.clone()),
            &ClientConfig::default(),
        );
        client.startup().await;
        assert_eq!(
            client.view().hint,
            "auto_type was OFF, enabled for direct input"
        );

        client.toggle().await;
        assert_eq!(client.state(), SessionState::Recording);
        client.toggle().await;

        let mut rx = client.watch();
        let ready = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|view| view.state == SessionState::Ready),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(
            ready.hint,
            "typed to focused app (latency 600 ms) / Alt+X: start"
        );
        client.teardown();
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_rejected() {
        let transport = simulated_backend();
        let bridge = Bridge::with_transport(transport);
        let err = bridge
            .invoke(command::STOP_RECORDING, None)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "操作できません");
    }
}
