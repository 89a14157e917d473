//! Session state machine.
//!
//! Reconciles three asynchronous inputs into one displayed state:
//! - local user commands (`start_recording` / `stop_recording` and their results)
//! - backend push events, which are authoritative
//! - the periodic `get_runtime_state` poll, a safety net for missed pushes
//!
//! Every change of the state value goes through [`SessionMachine::set_state`],
//! which records the update source and a monotonically increasing sequence
//! number. Poll results and command results carry tickets taken when they
//! were issued; comparing a ticket against the machine's sequence numbers is
//! how stale data is detected.
//!
//! The machine is a plain struct with no I/O. Callers pass the current time
//! in, so precedence rules can be tested without sleeping.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use notype_core::config::{SessionConfig, TransitionTiming};
use notype_core::events::{ErrorEvent, ModelDownloadEvent, TranscriptEvent};
use notype_core::{SessionState, UpdateSource};

use crate::gate::missing_message;

/// The most recent update applied to the state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastUpdate {
    pub source: UpdateSource,
    pub at: Instant,
    pub seq: u64,
}

/// User command awaiting its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Stop,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Start => write!(f, "start"),
            CommandKind::Stop => write!(f, "stop"),
        }
    }
}

/// Issued when a user command is dispatched; returned with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTicket {
    pub kind: CommandKind,
    seq: u64,
}

/// Issued when a poll request is sent; returned with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    seq: u64,
    pub issued_at: Instant,
}

/// What a toggle request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    /// Invoke `start_recording`.
    Start(CommandTicket),
    /// Invoke `stop_recording`.
    Stop(CommandTicket),
    /// Nothing to do in the given state.
    Ignored(SessionState),
    /// Runtime dependencies are missing; the toggle is disabled.
    Blocked,
}

/// Result of offering a poll response to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The poll moved the state.
    Applied(SessionState),
    /// The poll agreed with the displayed state.
    Unchanged,
    /// Another update was applied after the poll was issued.
    Superseded,
    /// A push event arrived recently and takes precedence.
    WithinPushGrace,
    /// A user command is awaiting its result.
    CommandInFlight,
    /// The backend answered with something that is not a state name.
    Unrecognized,
    /// The request itself failed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HintKind {
    Status,
    Error,
    Info,
    Download,
    Missing,
}

/// Snapshot rendered by the pill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub state: SessionState,
    pub label: String,
    pub dot_class: &'static str,
    pub hint: String,
    pub toggle_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl StatusView {
    /// Human-readable label for a state.
    pub fn label_for(state: SessionState) -> String {
        match state {
            SessionState::MissingDependencies => "Missing deps".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.label, self.hint)?;
        if !self.toggle_enabled {
            write!(f, " (toggle disabled)")?;
        }
        Ok(())
    }
}

/// Authoritative session state and its update rules.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    hint: String,
    hint_kind: HintKind,
    missing: Vec<String>,
    seq: u64,
    last_update: Option<LastUpdate>,
    last_push: Option<(u64, Instant)>,
    in_flight: Option<CommandKind>,
    timing: TransitionTiming,
    push_grace: Duration,
    hotkey: String,
    updated_at: DateTime<Utc>,
}

impl SessionMachine {
    pub fn new(config: &SessionConfig) -> Self {
        let hotkey = config.hotkey_label.clone();
        Self {
            state: SessionState::Idle,
            hint: format!("{hotkey}: start/stop"),
            hint_kind: HintKind::Status,
            missing: Vec::new(),
            seq: 0,
            last_update: None,
            last_push: None,
            in_flight: None,
            timing: config.transition_timing,
            push_grace: config.push_grace(),
            hotkey,
            updated_at: Utc::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Whether a press of the toggle would do something. Latched
    /// dependencies disable starting, never stopping.
    pub fn toggle_enabled(&self) -> bool {
        self.missing.is_empty() || self.state == SessionState::Recording
    }

    pub fn last_update(&self) -> Option<LastUpdate> {
        self.last_update
    }

    pub fn in_flight(&self) -> Option<CommandKind> {
        self.in_flight
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            state: self.state,
            label: StatusView::label_for(self.state),
            dot_class: self.state.dot_class(),
            hint: self.hint.clone(),
            toggle_enabled: self.toggle_enabled(),
            updated_at: self.updated_at,
        }
    }

    // ------------------------------------------------------------------
    // User commands
    // ------------------------------------------------------------------

    /// Decide what a press of the record toggle does.
    ///
    /// Missing dependencies only block starting; a recording that is
    /// already running can always be stopped.
    pub fn request_toggle(&mut self, now: Instant) -> ToggleAction {
        if let Some(kind) = self.in_flight {
            tracing::debug!(command = %kind, "Toggle ignored: command in flight");
            return ToggleAction::Ignored(self.state);
        }

        match self.state {
            SessionState::Recording => {
                self.in_flight = Some(CommandKind::Stop);
                self.set_state(SessionState::Processing, UpdateSource::Local, now);
                self.set_hint(HintKind::Status, "processing...".to_string());
                ToggleAction::Stop(self.ticket(CommandKind::Stop))
            }
            SessionState::Processing => {
                tracing::debug!("Toggle ignored while processing");
                ToggleAction::Ignored(SessionState::Processing)
            }
            _ if !self.missing.is_empty() => {
                tracing::warn!(missing = ?self.missing, "Toggle rejected: runtime dependencies missing");
                ToggleAction::Blocked
            }
            state if state.is_at_rest() => {
                self.in_flight = Some(CommandKind::Start);
                if self.timing == TransitionTiming::Optimistic {
                    self.set_state(SessionState::Recording, UpdateSource::Local, now);
                    self.set_hint(HintKind::Status, self.recording_hint());
                }
                ToggleAction::Start(self.ticket(CommandKind::Start))
            }
            state => ToggleAction::Ignored(state),
        }
    }

    /// Apply the result of `start_recording`.
    ///
    /// `Err` carries the user-facing message of the failure.
    pub fn finish_start(&mut self, ticket: CommandTicket, result: Result<(), String>, now: Instant) {
        self.clear_in_flight(ticket.kind);
        let stale = self.is_stale(&ticket);
        match result {
            Ok(()) if stale => {
                tracing::debug!("Discarding stale start_recording result");
            }
            Ok(()) => {
                self.set_state(SessionState::Recording, UpdateSource::Local, now);
                self.set_hint(HintKind::Status, self.recording_hint());
            }
            Err(message) => {
                if !stale || self.holds_optimistic_state() {
                    self.set_state(SessionState::Idle, UpdateSource::Local, now);
                } else {
                    tracing::debug!(
                        command = %ticket.kind,
                        state = %self.state,
                        "Stale failure; keeping pushed state"
                    );
                }
                self.set_hint(HintKind::Error, self.error_hint(&message));
            }
        }
    }

    /// Apply the result of `stop_recording`, which may carry the final text.
    pub fn finish_stop(
        &mut self,
        ticket: CommandTicket,
        result: Result<Option<String>, String>,
        now: Instant,
    ) {
        self.clear_in_flight(ticket.kind);
        let stale = self.is_stale(&ticket);
        match result {
            Ok(text) => {
                if stale && self.state != SessionState::Processing {
                    tracing::debug!("Discarding stale stop_recording result");
                    return;
                }
                self.set_state(SessionState::Ready, UpdateSource::Local, now);
                let typed = text.as_deref().is_some_and(|t| !t.trim().is_empty());
                let hint = self.ready_hint(typed, None);
                self.set_hint(HintKind::Status, hint);
            }
            Err(message) => {
                if !stale || self.holds_optimistic_state() {
                    self.set_state(SessionState::Idle, UpdateSource::Local, now);
                } else {
                    tracing::debug!(
                        command = %ticket.kind,
                        state = %self.state,
                        "Stale failure; keeping pushed state"
                    );
                }
                self.set_hint(HintKind::Error, self.error_hint(&message));
            }
        }
    }

    // ------------------------------------------------------------------
    // Push events
    // ------------------------------------------------------------------

    pub fn apply_transcript(&mut self, event: &TranscriptEvent, now: Instant) {
        self.set_state(event.state, UpdateSource::Push, now);
        let hint = match self.state {
            SessionState::Recording => self.recording_hint(),
            SessionState::Processing => "processing...".to_string(),
            SessionState::Ready => self.ready_hint(event.has_final_text(), event.latency_ms),
            SessionState::Error => self.error_hint("error"),
            SessionState::MissingDependencies => missing_message(&self.missing),
            _ => match event.latency_ms {
                Some(ms) => format!("latency {ms} ms"),
                None => self.idle_hint(),
            },
        };
        let kind = match self.state {
            SessionState::Error => HintKind::Error,
            SessionState::MissingDependencies => HintKind::Missing,
            _ => HintKind::Status,
        };
        self.set_hint(kind, hint);
    }

    /// Show a backend failure. `details` is for logs only.
    pub fn apply_error(&mut self, event: &ErrorEvent, now: Instant) {
        self.set_state(SessionState::Error, UpdateSource::Push, now);
        self.set_hint(HintKind::Error, self.error_hint(&event.user_message));
    }

    /// Model download progress only changes the hint.
    pub fn apply_model_download(&mut self, event: &ModelDownloadEvent) {
        let mut hint = format!("{} {}%", event.status, event.percent());
        if let Some(message) = event.message.as_deref().filter(|m| !m.is_empty()) {
            hint.push_str(": ");
            hint.push_str(message);
        }
        self.set_hint(HintKind::Download, hint);
    }

    /// Apply a dependency check result or warning.
    pub fn apply_dependencies(&mut self, missing: Vec<String>, source: UpdateSource, now: Instant) {
        if missing.is_empty() {
            let was_latched = !self.missing.is_empty();
            self.missing.clear();
            if self.state == SessionState::MissingDependencies {
                self.set_state(SessionState::Idle, source, now);
            }
            if self.hint_kind == HintKind::Missing {
                self.set_hint(HintKind::Status, self.idle_hint());
            } else if was_latched {
                self.touch();
            }
            return;
        }

        self.set_hint(HintKind::Missing, missing_message(&missing));
        self.missing = missing;
        if self.state == SessionState::Idle {
            self.set_state(SessionState::MissingDependencies, source, now);
        }
    }

    // ------------------------------------------------------------------
    // Hints without a state change
    // ------------------------------------------------------------------

    /// Surface a failure message without touching the state.
    pub fn note_failure(&mut self, message: &str) {
        self.set_hint(HintKind::Error, message.to_string());
    }

    /// Surface an informational message without touching the state.
    pub fn note_info(&mut self, message: &str) {
        self.set_hint(HintKind::Info, message.to_string());
    }

    // ------------------------------------------------------------------
    // Poll
    // ------------------------------------------------------------------

    pub fn begin_poll(&self, now: Instant) -> PollTicket {
        PollTicket {
            seq: self.seq,
            issued_at: now,
        }
    }

    /// Offer a `get_runtime_state` answer.
    ///
    /// The poll only wins when nothing more recent is known: no update since
    /// the ticket was issued, no push within the grace window, no command in
    /// flight. Before the first push ever arrives the poll is authoritative.
    pub fn apply_poll(&mut self, ticket: PollTicket, raw: &str, now: Instant) -> PollOutcome {
        if self.seq > ticket.seq {
            return PollOutcome::Superseded;
        }
        if let Some((_, at)) = self.last_push {
            if now.saturating_duration_since(at) < self.push_grace {
                return PollOutcome::WithinPushGrace;
            }
        }
        if self.in_flight.is_some() {
            return PollOutcome::CommandInFlight;
        }
        let Ok(next) = raw.parse::<SessionState>() else {
            tracing::debug!(raw, "Ignoring unrecognized runtime state");
            return PollOutcome::Unrecognized;
        };

        let effective = self.effective(next);
        // The backend reports idle after a failure; keep the error visible.
        let error_shown = self.state == SessionState::Error && effective == SessionState::Idle;
        if effective == self.state || error_shown {
            return PollOutcome::Unchanged;
        }

        tracing::info!(from = %self.state, to = %effective, "Poll recovered state");
        self.set_state(next, UpdateSource::Poll, now);
        let hint = match self.state {
            SessionState::Recording => self.recording_hint(),
            SessionState::Processing => "processing...".to_string(),
            SessionState::Ready => format!("{}: start", self.hotkey),
            SessionState::Error => self.error_hint("error"),
            SessionState::MissingDependencies => missing_message(&self.missing),
            _ => self.idle_hint(),
        };
        let kind = if self.state == SessionState::MissingDependencies {
            HintKind::Missing
        } else {
            HintKind::Status
        };
        self.set_hint(kind, hint);
        PollOutcome::Applied(self.state)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Single entry point for changing the state value.
    ///
    /// `Idle` renders as `MissingDependencies` while dependencies are
    /// latched, and a reported `MissingDependencies` with nothing latched
    /// renders as `Idle`. Poll updates that change nothing are dropped without
    /// advancing the sequence.
    fn set_state(&mut self, next: SessionState, source: UpdateSource, now: Instant) {
        let effective = self.effective(next);
        if source == UpdateSource::Poll && effective == self.state {
            return;
        }

        self.seq += 1;
        let previous = self.state;
        self.state = effective;
        self.last_update = Some(LastUpdate {
            source,
            at: now,
            seq: self.seq,
        });
        if source == UpdateSource::Push {
            self.last_push = Some((self.seq, now));
        }
        self.updated_at = Utc::now();

        if previous != effective {
            tracing::debug!(%source, "Session state: {} -> {}", previous, effective);
        }
    }

    /// `Idle` and `MissingDependencies` follow the latched list, not the
    /// reported value.
    fn effective(&self, next: SessionState) -> SessionState {
        match next {
            SessionState::Idle | SessionState::MissingDependencies => {
                if self.missing.is_empty() {
                    SessionState::Idle
                } else {
                    SessionState::MissingDependencies
                }
            }
            other => other,
        }
    }

    fn ticket(&self, kind: CommandKind) -> CommandTicket {
        CommandTicket {
            kind,
            seq: self.seq,
        }
    }

    /// A command result is stale once a push was applied after dispatch.
    fn is_stale(&self, ticket: &CommandTicket) -> bool {
        self.last_push.is_some_and(|(seq, _)| seq > ticket.seq)
    }

    /// `Recording`/`Processing` shown ahead of the backend by a local command.
    fn holds_optimistic_state(&self) -> bool {
        matches!(
            self.state,
            SessionState::Recording | SessionState::Processing
        ) && self
            .last_update
            .is_some_and(|update| update.source == UpdateSource::Local)
    }

    fn clear_in_flight(&mut self, kind: CommandKind) {
        if self.in_flight == Some(kind) {
            self.in_flight = None;
        }
    }

    fn set_hint(&mut self, kind: HintKind, hint: String) {
        self.hint = hint;
        self.hint_kind = kind;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn recording_hint(&self) -> String {
        format!("recording... / {}: stop", self.hotkey)
    }

    fn idle_hint(&self) -> String {
        format!("{}: start/stop", self.hotkey)
    }

    fn error_hint(&self, message: &str) -> String {
        format!("{message} / {}: retry", self.hotkey)
    }

    fn ready_hint(&self, typed: bool, latency_ms: Option<u64>) -> String {
        if !typed {
            return format!("no speech / {}: retry", self.hotkey);
        }
        match latency_ms {
            Some(ms) => format!("typed to focused app (latency {ms} ms) / {}: start", self.hotkey),
            None => format!("typed to focused app / {}: start", self.hotkey),
        }
    }
}
