//! Session client: the context object tying the pill together.
//!
//! Owns the bridge, the state machine, the dependency gate, the position
//! controller, the push subscriptions and the poll task. The machine sits
//! behind one short-held mutex that is never locked across an await; every
//! mutation publishes a fresh [`StatusView`] on a `watch` channel.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use notype_core::config::ClientConfig;
use notype_core::error::{NotypeError, Result};
use notype_core::events::{
    channel, DependencyWarningEvent, ErrorEvent, ModelDownloadEvent, TranscriptEvent,
};
use notype_core::{SessionState, UpdateSource};

use crate::bridge::{command, Bridge, Subscription};
use crate::gate::{report_lines, DependencyGate};
use crate::position::PositionController;
use crate::settings::SettingsSync;
use crate::state::{PollOutcome, SessionMachine, StatusView, ToggleAction};

const AUTO_TYPE_ENABLED_HINT: &str = "auto_type was OFF, enabled for direct input";

struct Shared {
    machine: Mutex<SessionMachine>,
    view_tx: watch::Sender<StatusView>,
}

impl Shared {
    /// Run `f` against the machine and publish the resulting view.
    fn update<R>(&self, f: impl FnOnce(&mut SessionMachine, Instant) -> R) -> R {
        let now = tokio::time::Instant::now().into_std();
        let (result, view) = {
            let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
            let result = f(&mut machine, now);
            (result, machine.view())
        };
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
        result
    }

    fn view(&self) -> StatusView {
        self.machine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .view()
    }
}

pub struct SessionClient {
    bridge: Bridge,
    shared: Arc<Shared>,
    gate: DependencyGate,
    settings: SettingsSync,
    position: PositionController,
    config: ClientConfig,
    subscriptions: Mutex<Vec<Subscription>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("bridge", &self.bridge)
            .field("view", &self.shared.view())
            .finish()
    }
}

impl SessionClient {
    pub fn new(bridge: Bridge, config: &ClientConfig) -> Arc<Self> {
        let machine = SessionMachine::new(&config.session);
        let (view_tx, _) = watch::channel(machine.view());
        tracing::info!(
            transport = bridge.transport_name().unwrap_or("none"),
            timing_contract = config.session.transition_timing.contract_version(),
            "Session client created"
        );
        Arc::new(Self {
            gate: DependencyGate::new(bridge.clone()),
            settings: SettingsSync::new(bridge.clone()),
            position: PositionController::new(bridge.clone()),
            bridge,
            shared: Arc::new(Shared {
                machine: Mutex::new(machine),
                view_tx,
            }),
            config: config.clone(),
            subscriptions: Mutex::new(Vec::new()),
            poll_task: Mutex::new(None),
        })
    }

    /// Receiver that observes every published [`StatusView`].
    pub fn watch(&self) -> watch::Receiver<StatusView> {
        self.shared.view_tx.subscribe()
    }

    pub fn view(&self) -> StatusView {
        self.shared.view()
    }

    pub fn state(&self) -> SessionState {
        self.view().state
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn position(&self) -> &PositionController {
        &self.position
    }

    pub fn settings(&self) -> &SettingsSync {
        &self.settings
    }

    /// Initialize the pill: subscribe to push channels, force `autoType`
    /// on, check runtime dependencies and start the fallback poll.
    pub async fn startup(self: &Arc<Self>) {
        self.subscribe_events();
        if self.config.window.enforce_auto_type {
            if let Err(e) = self.ensure_auto_type().await {
                tracing::warn!(error = %e, "Could not verify autoType");
            }
        }
        self.check_dependencies().await;
        self.start_polling();
    }

    /// Subscribe the machine to the four backend channels.
    ///
    /// Replaces any earlier subscriptions. Without a transport the client
    /// runs on the poll alone.
    pub fn subscribe_events(&self) {
        if !self.bridge.is_available() {
            tracing::warn!("No push transport; relying on the status poll");
        }

        let shared = Arc::clone(&self.shared);
        let transcript = self.bridge.subscribe_typed(
            channel::TRANSCRIPT,
            move |event: TranscriptEvent| {
                shared.update(|m, now| m.apply_transcript(&event, now));
            },
        );

        let shared = Arc::clone(&self.shared);
        let error = self
            .bridge
            .subscribe_typed(channel::ERROR, move |event: ErrorEvent| {
                tracing::error!(
                    user_message = %event.user_message,
                    details = %event.details,
                    "Backend reported an error"
                );
                shared.update(|m, now| m.apply_error(&event, now));
            });

        let shared = Arc::clone(&self.shared);
        let download = self.bridge.subscribe_typed(
            channel::MODEL_DOWNLOAD,
            move |event: ModelDownloadEvent| {
                shared.update(|m, _| m.apply_model_download(&event));
            },
        );

        let shared = Arc::clone(&self.shared);
        let dependencies = self.bridge.subscribe_typed(
            channel::DEPENDENCY_WARNING,
            move |event: DependencyWarningEvent| {
                if let Some(hint) = event.install_hint.as_deref() {
                    tracing::info!(install_hint = hint, "Backend suggested an install command");
                }
                shared.update(|m, now| m.apply_dependencies(event.missing, UpdateSource::Push, now));
            },
        );

        let previous = std::mem::replace(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
            vec![transcript, error, download, dependencies],
        );
        drop(previous);
    }

    /// Handle a press of the record toggle.
    pub async fn toggle(&self) -> ToggleAction {
        let action = self.shared.update(|m, now| m.request_toggle(now));
        match action {
            ToggleAction::Start(ticket) => {
                let result = self
                    .bridge
                    .invoke(command::START_RECORDING, None)
                    .await
                    .map(|_| ())
                    .map_err(|e| command_failure(command::START_RECORDING, &e));
                self.shared
                    .update(|m, now| m.finish_start(ticket, result, now));
            }
            ToggleAction::Stop(ticket) => {
                let result = self
                    .bridge
                    .invoke(command::STOP_RECORDING, None)
                    .await
                    .map(|value| value.as_str().map(str::to_string))
                    .map_err(|e| command_failure(command::STOP_RECORDING, &e));
                self.shared
                    .update(|m, now| m.finish_stop(ticket, result, now));
            }
            ToggleAction::Ignored(_) | ToggleAction::Blocked => {}
        }
        action
    }

    /// One round of the fallback status poll. Failures are swallowed.
    pub async fn poll_once(&self) -> PollOutcome {
        let ticket = self.shared.update(|m, now| m.begin_poll(now));
        match self.bridge.invoke(command::GET_RUNTIME_STATE, None).await {
            Ok(Value::String(raw)) => self.shared.update(|m, now| m.apply_poll(ticket, &raw, now)),
            Ok(other) => {
                tracing::debug!(result = %other, "Runtime state is not a string");
                PollOutcome::Unrecognized
            }
            Err(e) => {
                tracing::debug!(error = %e, "Status poll failed");
                PollOutcome::Failed
            }
        }
    }

    /// Spawn the fixed-interval poll. The task holds only a weak reference
    /// and stops once the client is gone.
    pub fn start_polling(self: &Arc<Self>) {
        let period = self.config.session.poll_interval();
        let client = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(client) = client.upgrade() else {
                    break;
                };
                let outcome = client.poll_once().await;
                tracing::trace!(?outcome, "Status poll");
            }
        });

        let previous = self
            .poll_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::debug!(interval_ms = period.as_millis() as u64, "Status poll started");
    }

    /// Query the dependency gate and feed the result to the machine.
    ///
    /// Returns the missing list, or `None` when the check produced no
    /// information or failed.
    pub async fn check_dependencies(&self) -> Option<Vec<String>> {
        match self.gate.check().await {
            Ok(Some(missing)) => {
                let applied = missing.clone();
                self.shared
                    .update(|m, now| m.apply_dependencies(applied, UpdateSource::Gate, now));
                Some(missing)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Dependency check failed");
                None
            }
        }
    }

    /// Dependency check for the settings view, one line per item.
    pub async fn dependency_report(&self) -> Result<Vec<String>> {
        let missing = self.gate.check().await?.unwrap_or_default();
        self.shared
            .update(|m, now| m.apply_dependencies(missing.clone(), UpdateSource::Gate, now));
        Ok(report_lines(&missing))
    }

    /// Ask the backend to open the settings window.
    pub async fn open_settings(&self) -> Result<()> {
        if let Err(e) = self.settings.open().await {
            tracing::warn!(error = %e, "Could not open settings");
            let message = format!("settings open failed: {}", e.user_message());
            self.shared.update(|m, _| m.note_failure(&message));
            return Err(e);
        }
        Ok(())
    }

    /// Force the backend's `autoType` on. Returns whether it was changed.
    pub async fn ensure_auto_type(&self) -> Result<bool> {
        let changed = self.settings.ensure_auto_type().await?;
        if changed {
            self.shared.update(|m, _| m.note_info(AUTO_TYPE_ENABLED_HINT));
        }
        Ok(changed)
    }

    /// Release every subscription and stop the poll. Idempotent.
    pub fn teardown(&self) {
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        let released = subscriptions.len();
        for mut subscription in subscriptions {
            subscription.unsubscribe();
        }

        if let Some(task) = self
            .poll_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        if released > 0 {
            tracing::debug!(released, "Session client torn down");
        }
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn command_failure(command: &str, err: &NotypeError) -> String {
    tracing::warn!(command, error = %err, "Command failed");
    err.user_message()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PointerTarget;
    use crate::transport::{LoopbackTransport, MemoryWindow};
    use notype_core::config::TransitionTiming;
    use notype_core::events::PushEvent;
    use notype_core::WindowPosition;
    use serde_json::json;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn setup_with(config: ClientConfig) -> (Arc<LoopbackTransport>, Arc<SessionClient>) {
        let transport = Arc::new(LoopbackTransport::new());
        transport.respond(command::START_RECORDING, Value::Null);
        transport.respond(command::STOP_RECORDING, json!("hello world"));
        transport.respond(command::GET_RUNTIME_STATE, json!("idle"));
        transport.respond(command::CHECK_RUNTIME_DEPENDENCIES, json!([]));
        transport.respond(command::GET_CONFIG, json!({ "autoType": true }));
        transport.respond(command::UPDATE_CONFIG, Value::Null);
        transport.respond(command::SHOW_SETTINGS, Value::Null);
        let client = SessionClient::new(Bridge::with_transport(transport.clone()), &config);
        (transport, client)
    }

    fn setup() -> (Arc<LoopbackTransport>, Arc<SessionClient>) {
        setup_with(ClientConfig::default())
    }

    fn push(transport: &LoopbackTransport, event: PushEvent) {
        transport.emit_event(&event).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_recording_beats_poll_idle_50ms_later() {
        let (transport, client) = setup();
        client.subscribe_events();

        push(
            &transport,
            PushEvent::Transcript(TranscriptEvent::new(SessionState::Recording)),
        );
        tokio::time::advance(ms(50)).await;

        assert_eq!(client.poll_once().await, PollOutcome::WithinPushGrace);
        assert_eq!(client.state(), SessionState::Recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_applies_after_quiet_period() {
        let (transport, client) = setup();
        client.subscribe_events();
        push(
            &transport,
            PushEvent::Transcript(TranscriptEvent::new(SessionState::Recording)),
        );
        transport.respond(command::GET_RUNTIME_STATE, json!("processing"));

        tokio::time::advance(ms(1200)).await;
        assert_eq!(
            client.poll_once().await,
            PollOutcome::Applied(SessionState::Processing)
        );
        assert_eq!(client.state(), SessionState::Processing);
    }

    #[tokio::test]
    async fn test_poll_failure_is_swallowed() {
        let (transport, client) = setup();
        transport.fail(command::GET_RUNTIME_STATE, "backend busy");
        let before = client.view();

        assert_eq!(client.poll_once().await, PollOutcome::Failed);
        assert_eq!(client.view(), before);
    }

    #[tokio::test]
    async fn test_poll_non_string_result() {
        let (transport, client) = setup();
        transport.respond(command::GET_RUNTIME_STATE, json!({ "state": "idle" }));
        assert_eq!(client.poll_once().await, PollOutcome::Unrecognized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_poll_recovers_missed_push() {
        let (transport, client) = setup();
        transport.respond(command::GET_RUNTIME_STATE, json!("recording"));
        client.start_polling();

        tokio::time::sleep(ms(1300)).await;
        assert_eq!(client.state(), SessionState::Recording);
        assert_eq!(transport.calls_to(command::GET_RUNTIME_STATE).len(), 1);
        client.teardown();
    }

    #[tokio::test]
    async fn test_start_then_stop_ends_ready() {
        let (transport, client) = setup();

        assert!(matches!(client.toggle().await, ToggleAction::Start(_)));
        assert_eq!(client.state(), SessionState::Recording);
        assert!(matches!(client.toggle().await, ToggleAction::Stop(_)));

        let view = client.view();
        assert_eq!(view.state, SessionState::Ready);
        assert_eq!(view.hint, "typed to focused app / Alt+X: start");
        assert_eq!(transport.calls_to(command::START_RECORDING), vec![json!({})]);
        assert_eq!(transport.calls_to(command::STOP_RECORDING).len(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_returns_to_idle_with_message() {
        let (transport, client) = setup();
        transport.fail(
            command::START_RECORDING,
            "録音を開始できません (arecord: device busy)",
        );

        client.toggle().await;
        let view = client.view();
        assert_eq!(view.state, SessionState::Idle);
        assert_eq!(view.hint, "録音を開始できません / Alt+X: retry");
        assert!(view.toggle_enabled);
    }

    #[tokio::test]
    async fn test_toggle_without_transport_stays_actionable() {
        let client = SessionClient::new(Bridge::unavailable(), &ClientConfig::default());
        client.subscribe_events();

        client.toggle().await;
        let view = client.view();
        assert_eq!(view.state, SessionState::Idle);
        assert_eq!(view.hint, "backend is not reachable / Alt+X: retry");
        assert_eq!(client.poll_once().await, PollOutcome::Failed);
    }

    #[tokio::test]
    async fn test_stale_start_result_is_discarded() {
        let mut config = ClientConfig::default();
        config.session.transition_timing = TransitionTiming::EventDriven;
        let (transport, client) = setup_with(config);
        client.subscribe_events();

        // The backend pushes a finished cycle before the command resolves.
        let weak = Arc::downgrade(&transport);
        transport.on_command(command::START_RECORDING, move |_| {
            if let Some(t) = weak.upgrade() {
                let ready = TranscriptEvent::new(SessionState::Ready).with_final_text("hi");
                t.emit_event(&PushEvent::Transcript(ready)).unwrap();
            }
            async { Ok::<Value, NotypeError>(Value::Null) }
        });

        client.toggle().await;
        assert_eq!(client.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_dependencies_gate_toggle() {
        let (transport, client) = setup();

        transport.respond(command::CHECK_RUNTIME_DEPENDENCIES, json!(["a", "b"]));
        assert_eq!(
            client.check_dependencies().await,
            Some(vec!["a".to_string(), "b".to_string()])
        );
        let view = client.view();
        assert!(!view.toggle_enabled);
        assert_eq!(view.hint, "missing: a, b");
        assert_eq!(client.toggle().await, ToggleAction::Blocked);
        assert!(transport.calls_to(command::START_RECORDING).is_empty());

        transport.respond(command::CHECK_RUNTIME_DEPENDENCIES, json!([]));
        assert_eq!(client.check_dependencies().await, Some(vec![]));
        let view = client.view();
        assert!(view.toggle_enabled);
        assert_eq!(view.state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_dependency_check_without_list_changes_nothing() {
        let (transport, client) = setup();
        transport.respond(command::CHECK_RUNTIME_DEPENDENCIES, json!("ok"));
        let before = client.view();
        assert_eq!(client.check_dependencies().await, None);
        assert_eq!(client.view(), before);
    }

    #[tokio::test]
    async fn test_dependency_warning_push_feeds_gate() {
        let (transport, client) = setup();
        client.subscribe_events();

        push(
            &transport,
            PushEvent::DependencyWarning(DependencyWarningEvent {
                missing: vec!["wtype".to_string()],
                install_hint: Some("sudo apt-get install -y wtype".to_string()),
            }),
        );
        let view = client.view();
        assert_eq!(view.state, SessionState::MissingDependencies);
        assert_eq!(view.hint, "missing: wtype");
        assert!(!view.toggle_enabled);
    }

    #[tokio::test]
    async fn test_dependency_warning_while_recording_still_allows_stop() {
        let (transport, client) = setup();
        client.subscribe_events();
        assert!(matches!(client.toggle().await, ToggleAction::Start(_)));

        push(
            &transport,
            PushEvent::DependencyWarning(DependencyWarningEvent {
                missing: vec!["wtype".to_string()],
                install_hint: None,
            }),
        );
        assert_eq!(client.state(), SessionState::Recording);
        assert!(client.view().toggle_enabled);

        assert!(matches!(client.toggle().await, ToggleAction::Stop(_)));
        assert_eq!(transport.calls_to(command::STOP_RECORDING).len(), 1);
        assert_eq!(client.state(), SessionState::Ready);
        assert_eq!(client.toggle().await, ToggleAction::Blocked);
    }

    #[tokio::test]
    async fn test_stop_timeout_after_push_keeps_processing() {
        let (transport, client) = setup();
        client.subscribe_events();
        client.toggle().await;

        let weak = Arc::downgrade(&transport);
        transport.on_command(command::STOP_RECORDING, move |_| {
            if let Some(t) = weak.upgrade() {
                let processing = TranscriptEvent::new(SessionState::Processing);
                t.emit_event(&PushEvent::Transcript(processing)).unwrap();
            }
            async {
                Err::<Value, NotypeError>(NotypeError::command(
                    command::STOP_RECORDING,
                    "timed out",
                ))
            }
        });

        assert!(matches!(client.toggle().await, ToggleAction::Stop(_)));
        let view = client.view();
        assert_eq!(view.state, SessionState::Processing);
        assert_eq!(view.hint, "timed out / Alt+X: retry");

        push(
            &transport,
            PushEvent::Transcript(TranscriptEvent::new(SessionState::Ready).with_final_text("late")),
        );
        assert_eq!(client.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_dependency_report_lines() {
        let (transport, client) = setup();
        transport.respond(command::CHECK_RUNTIME_DEPENDENCIES, json!(["wtype"]));
        assert_eq!(
            client.dependency_report().await.unwrap(),
            vec!["missing: wtype".to_string()]
        );
    }

    #[tokio::test]
    async fn test_error_and_download_events() {
        let (transport, client) = setup();
        client.subscribe_events();

        push(
            &transport,
            PushEvent::ModelDownload(ModelDownloadEvent {
                status: "downloading".to_string(),
                progress: 12.0,
                message: None,
            }),
        );
        assert_eq!(client.view().hint, "downloading 12%");
        assert_eq!(client.state(), SessionState::Idle);

        push(
            &transport,
            PushEvent::Error(ErrorEvent {
                user_message: "文字起こしに失敗しました".to_string(),
                details: "whisper exited 2".to_string(),
            }),
        );
        let view = client.view();
        assert_eq!(view.state, SessionState::Error);
        assert_eq!(view.hint, "文字起こしに失敗しました / Alt+X: retry");
    }

    #[tokio::test]
    async fn test_watch_publishes_changes() {
        let (_transport, client) = setup();
        let mut rx = client.watch();
        assert!(!rx.has_changed().unwrap());

        client.toggle().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state, SessionState::Recording);
    }

    #[tokio::test]
    async fn test_startup_enforces_auto_type_and_checks_dependencies() {
        let (transport, client) = setup();
        transport.respond(command::GET_CONFIG, json!({ "autoType": false, "model": "base" }));

        client.startup().await;

        assert_eq!(
            transport.calls_to(command::UPDATE_CONFIG),
            vec![json!({ "cfg": { "autoType": true, "model": "base" } })]
        );
        assert_eq!(transport.calls_to(command::CHECK_RUNTIME_DEPENDENCIES).len(), 1);
        assert_eq!(client.view().hint, AUTO_TYPE_ENABLED_HINT);
        for name in channel::ALL {
            assert_eq!(transport.listener_count(name), 1);
        }
        client.teardown();
    }

    #[tokio::test]
    async fn test_startup_respects_disabled_enforcement() {
        let mut config = ClientConfig::default();
        config.window.enforce_auto_type = false;
        let (transport, client) = setup_with(config);

        client.startup().await;
        assert!(transport.calls_to(command::GET_CONFIG).is_empty());
        client.teardown();
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_handlers() {
        let (transport, client) = setup();
        client.subscribe_events();
        client.subscribe_events();
        assert_eq!(transport.listener_count(channel::TRANSCRIPT), 1);
    }

    #[tokio::test]
    async fn test_open_settings_failure_shows_message() {
        let (transport, client) = setup();
        transport.fail(command::SHOW_SETTINGS, "window not found");

        assert!(client.open_settings().await.is_err());
        let view = client.view();
        assert_eq!(view.hint, "settings open failed: window not found");
        assert_eq!(view.state, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_handlers_and_poll() {
        let (transport, client) = setup();
        client.subscribe_events();
        client.start_polling();
        client.teardown();

        for name in channel::ALL {
            assert_eq!(transport.listener_count(name), 0);
        }
        let delivered = transport
            .emit_event(&PushEvent::Transcript(TranscriptEvent::new(
                SessionState::Recording,
            )))
            .unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(client.state(), SessionState::Idle);

        tokio::time::sleep(ms(5000)).await;
        assert!(transport.calls_to(command::GET_RUNTIME_STATE).is_empty());
    }

    #[tokio::test]
    async fn test_drop_releases_subscriptions() {
        let (transport, client) = setup();
        client.subscribe_events();
        drop(client);
        assert_eq!(transport.listener_count(channel::ERROR), 0);
    }

    #[tokio::test]
    async fn test_drag_through_client_persists_once() {
        let transport = Arc::new(LoopbackTransport::new());
        transport.respond(command::SET_PILL_POSITION, Value::Null);
        let window = Arc::new(MemoryWindow::new(0.0, 0.0));
        transport.set_window(window.clone());
        let client = SessionClient::new(
            Bridge::with_transport(transport.clone()),
            &ClientConfig::default(),
        );

        client.position().pointer_down(PointerTarget::Surface).await;
        window.move_to(200.0, 30.0);
        assert_eq!(
            client.position().pointer_up().await,
            Some(WindowPosition { x: 200, y: 30 })
        );
        assert_eq!(transport.calls_to(command::SET_PILL_POSITION).len(), 1);
    }
}
