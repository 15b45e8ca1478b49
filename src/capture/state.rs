use super::config::RestartCause;
use crate::error::CaptureError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// No capture has been started yet
    Idle,
    /// An engine instance was launched and has not reported `Started`
    Starting,
    /// The engine is listening
    Listening,
    /// Waiting for the backoff delay before launching a fresh engine
    RestartScheduled,
    /// Waiting for the engine to confirm termination
    Stopping,
    /// Capture ended; `start()` may be called again
    Stopped,
}

impl CaptureState {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            CaptureState::Starting
                | CaptureState::Listening
                | CaptureState::RestartScheduled
                | CaptureState::Stopping
        )
    }
}

/// In-memory state of one logical capture, from `start()` to the end
#[derive(Debug, Clone)]
pub struct CaptureSession {
    /// Unique session identifier for log correlation
    pub session_id: String,

    /// When the capture started
    pub started_at: DateTime<Utc>,

    /// Whether the engine's own continuous mode is in use; a natural end
    /// finishes the capture instead of restarting
    pub continuous_mode: bool,

    /// Final fragments so far, each followed by a space
    pub accumulated_text: String,

    /// Latest interim hypothesis; never part of `accumulated_text`
    pub interim_text: String,

    /// Consecutive network failures since the last recognised text
    pub network_failure_count: u32,

    /// Delay of the currently scheduled restart
    pub pending_restart: Option<Duration>,

    /// Whether `on_start` has fired for this capture
    pub start_notified: bool,

    /// Cooperative intent flag; cleared by `stop()` and terminal errors
    pub should_continue: bool,

    /// Recoverable error waiting for the engine's `Ended`
    pub restart_cause: Option<RestartCause>,

    /// Terminal error waiting for the engine's `Ended`
    pub terminal_error: Option<CaptureError>,

    /// Number of result events delivered
    pub results: usize,

    /// Number of engine restarts
    pub restarts: u32,
}

impl CaptureSession {
    pub fn new(continuous_mode: bool) -> Self {
        Self {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            started_at: Utc::now(),
            continuous_mode,
            accumulated_text: String::new(),
            interim_text: String::new(),
            network_failure_count: 0,
            pending_restart: None,
            start_notified: false,
            should_continue: true,
            restart_cause: None,
            terminal_error: None,
            results: 0,
            restarts: 0,
        }
    }
}

/// Point-in-time view of a controller
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub capture_id: String,
    pub state: CaptureState,
    /// Whether the engine is listening right now
    pub active: bool,
    pub transcript: String,
    pub interim: String,
    /// Code of the last surfaced error, if any
    pub last_error: Option<String>,
    pub results: usize,
    pub restarts: u32,
    pub network_failures: u32,
    pub started_at: Option<DateTime<Utc>>,
}

impl CaptureStatus {
    pub fn idle(capture_id: impl Into<String>) -> Self {
        Self {
            capture_id: capture_id.into(),
            state: CaptureState::Idle,
            active: false,
            transcript: String::new(),
            interim: String::new(),
            last_error: None,
            results: 0,
            restarts: 0,
            network_failures: 0,
            started_at: None,
        }
    }
}
