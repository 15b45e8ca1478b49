//! Speech capture
//!
//! This module provides the `SpeechCaptureController` abstraction that manages:
//! - One recognition engine instance at a time
//! - Automatic, rate-limited restarts on transient engine failures
//! - Transcript accumulation across restarts
//! - Caller notifications (start, result, error, end)

mod config;
mod controller;
mod listener;
mod machine;
mod state;

pub use config::{CaptureConfig, RestartCause, RetryPolicy};
pub use controller::SpeechCaptureController;
pub use listener::{dispatch, CaptureEvent, CaptureListener, ChannelListener, TracingListener};
pub use machine::{CaptureMachine, Effect, Input};
pub use state::{CaptureSession, CaptureState, CaptureStatus};
