//! Capture state machine
//!
//! ```text
//! Idle ──begin──► Starting ──Started──► Listening
//!                    ▲                     │ Ended (recoverable / non-continuous)
//!                    └──RestartDue── RestartScheduled
//!
//! Starting | Listening ──stop / terminal error──► Stopping ──Ended──► Stopped
//! RestartScheduled ──stop──► Stopped
//! ```
//!
//! A recoverable error (`no-speech`, `network` under the ceiling) aborts the
//! engine; the restart is scheduled when that engine reports `Ended`.
//!
//! The machine performs no I/O. Every transition returns the effects the
//! driver must carry out, so transitions can be tested without an engine or
//! a clock.

use super::config::{RestartCause, RetryPolicy};
use super::listener::CaptureEvent;
use super::state::{CaptureSession, CaptureState};
use crate::error::CaptureError;
use crate::recognition::{EngineErrorKind, RecognitionEvent};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Input consumed by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Event from the current engine instance
    Engine(RecognitionEvent),
    /// Constructing or starting the engine instance failed
    LaunchFailed(String),
    /// The scheduled restart delay elapsed
    RestartDue,
    /// The caller asked to stop
    StopRequested,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Build and start a fresh engine instance
    LaunchEngine,
    /// Ask the engine to stop gracefully
    StopEngine,
    /// Ask the engine to stop immediately
    AbortEngine,
    /// Drop the engine instance, which has ended
    ReleaseEngine,
    /// Arm the restart timer, replacing any armed one
    ScheduleRestart(Duration),
    /// Disarm the restart timer
    CancelRestart,
    /// Deliver a notification to the caller
    Notify(CaptureEvent),
}

pub struct CaptureMachine {
    continuous: bool,
    policy: RetryPolicy,
    state: CaptureState,
    session: Option<CaptureSession>,
}

impl CaptureMachine {
    pub fn new(continuous: bool, policy: RetryPolicy) -> Self {
        Self {
            continuous,
            policy,
            state: CaptureState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Whether the engine is listening (false while a restart is pending)
    pub fn is_active(&self) -> bool {
        self.state == CaptureState::Listening
    }

    /// Begin a new capture
    ///
    /// Returns no effects if a capture is already running.
    pub fn begin(&mut self) -> Vec<Effect> {
        if self.is_running() {
            warn!("Capture already running");
            return Vec::new();
        }

        let session = CaptureSession::new(self.continuous);
        info!(
            "Starting capture session: {} (continuous={})",
            session.session_id, self.continuous
        );

        self.session = Some(session);
        self.state = CaptureState::Starting;
        vec![Effect::LaunchEngine]
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        if !self.is_running() {
            debug!("Ignoring {:?} in state {:?}", input, self.state);
            return Vec::new();
        }

        match input {
            Input::Engine(RecognitionEvent::Started) => self.on_engine_started(),
            Input::Engine(RecognitionEvent::PartialText(text)) => self.on_partial(text),
            Input::Engine(RecognitionEvent::FinalText(text)) => self.on_final(text),
            Input::Engine(RecognitionEvent::Error(kind)) => self.on_engine_error(kind),
            Input::Engine(RecognitionEvent::Ended) => self.on_engine_ended(),
            Input::LaunchFailed(message) => self.on_launch_failed(message),
            Input::RestartDue => self.on_restart_due(),
            Input::StopRequested => self.on_stop_requested(),
        }
    }

    fn on_engine_started(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if self.state != CaptureState::Starting {
            return Vec::new();
        }

        self.state = CaptureState::Listening;
        if session.start_notified {
            debug!("Engine restarted for {}", session.session_id);
            return Vec::new();
        }

        session.start_notified = true;
        info!("Capture listening: {}", session.session_id);
        vec![Effect::Notify(CaptureEvent::Started)]
    }

    fn on_partial(&mut self, text: String) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.terminal_error.is_some() {
            return Vec::new();
        }

        session.network_failure_count = 0;
        session.results += 1;
        let combined = format!("{}{}", session.accumulated_text, text);
        session.interim_text = text;

        vec![Effect::Notify(CaptureEvent::Result {
            text: combined,
            is_interim: true,
        })]
    }

    fn on_final(&mut self, text: String) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.terminal_error.is_some() {
            return Vec::new();
        }

        session.network_failure_count = 0;
        session.results += 1;
        session.interim_text.clear();
        session.accumulated_text.push_str(&text);
        session.accumulated_text.push(' ');

        vec![Effect::Notify(CaptureEvent::Result {
            text: session.accumulated_text.clone(),
            is_interim: false,
        })]
    }

    fn on_engine_error(&mut self, kind: EngineErrorKind) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if !session.should_continue {
            debug!("Ignoring engine error after stop: {}", kind);
            return Vec::new();
        }

        let error = match kind {
            EngineErrorKind::NoSpeech => {
                debug!("No speech detected, will restart");
                return recover(session, RestartCause::NoSpeech);
            }
            EngineErrorKind::Aborted => {
                debug!("Engine aborted");
                return Vec::new();
            }
            EngineErrorKind::Network => {
                session.network_failure_count += 1;
                let failures = session.network_failure_count;
                if !self.policy.network_exhausted(failures) {
                    warn!(
                        "Network error ({}/{}), will restart",
                        failures, self.policy.network_failure_ceiling
                    );
                    return recover(session, RestartCause::Network(failures));
                }
                CaptureError::NetworkExhausted(failures)
            }
            EngineErrorKind::NotAllowed => CaptureError::PermissionDenied,
            EngineErrorKind::ServiceNotAllowed => CaptureError::ServiceUnavailable,
            other => CaptureError::Engine(other.to_string()),
        };

        warn!("Capture {} failed: {}", session.session_id, error);
        session.should_continue = false;
        session.restart_cause = None;
        session.terminal_error = Some(error);
        self.state = CaptureState::Stopping;
        vec![Effect::AbortEngine]
    }

    fn on_engine_ended(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if !matches!(
            self.state,
            CaptureState::Starting | CaptureState::Listening | CaptureState::Stopping
        ) {
            return Vec::new();
        }

        let mut effects = vec![Effect::ReleaseEngine];
        session.interim_text.clear();

        if let Some(error) = session.terminal_error.clone() {
            self.state = CaptureState::Stopped;
            effects.push(Effect::Notify(CaptureEvent::Error(error)));
            return effects;
        }

        let recoverable = session.restart_cause.is_some();
        if session.should_continue && (recoverable || !session.continuous_mode) {
            let cause = session.restart_cause.take().unwrap_or(RestartCause::NaturalEnd);
            let delay = self.policy.delay_for(cause);
            debug!("Restarting engine in {:?} after {:?}", delay, cause);

            session.pending_restart = Some(delay);
            self.state = CaptureState::RestartScheduled;
            effects.push(Effect::ScheduleRestart(delay));
            return effects;
        }

        info!("Capture session ended: {}", session.session_id);
        session.should_continue = false;
        self.state = CaptureState::Stopped;
        effects.push(Effect::Notify(CaptureEvent::Ended(
            session.accumulated_text.clone(),
        )));
        effects
    }

    fn on_launch_failed(&mut self, message: String) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if self.state != CaptureState::Starting {
            return Vec::new();
        }

        let error = CaptureError::StartFailure(message);
        warn!("Capture {} failed: {}", session.session_id, error);
        session.should_continue = false;
        session.terminal_error = Some(error.clone());
        self.state = CaptureState::Stopped;

        vec![
            Effect::ReleaseEngine,
            Effect::Notify(CaptureEvent::Error(error)),
        ]
    }

    fn on_restart_due(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if self.state != CaptureState::RestartScheduled || !session.should_continue {
            return Vec::new();
        }

        session.pending_restart = None;
        session.restarts += 1;
        self.state = CaptureState::Starting;
        vec![Effect::LaunchEngine]
    }

    fn on_stop_requested(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if !session.should_continue {
            return Vec::new();
        }

        info!("Stopping capture session: {}", session.session_id);
        session.should_continue = false;
        session.restart_cause = None;

        match self.state {
            CaptureState::RestartScheduled => {
                session.pending_restart = None;
                self.state = CaptureState::Stopped;
                vec![
                    Effect::CancelRestart,
                    Effect::Notify(CaptureEvent::Ended(session.accumulated_text.clone())),
                ]
            }
            CaptureState::Starting | CaptureState::Listening => {
                self.state = CaptureState::Stopping;
                vec![Effect::StopEngine]
            }
            _ => Vec::new(),
        }
    }
}

/// Record a recoverable cause and end the current engine so the restart
/// fires on its `Ended`. Engines are not required to end by themselves after
/// reporting an error.
fn recover(session: &mut CaptureSession, cause: RestartCause) -> Vec<Effect> {
    let first = session.restart_cause.is_none();
    session.restart_cause = Some(cause);

    if first {
        vec![Effect::AbortEngine]
    } else {
        Vec::new()
    }
}
