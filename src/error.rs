use thiserror::Error;

/// Conditions surfaced to the caller through `on_error`.
///
/// Every variant is terminal for the current capture: the controller ends up
/// `Stopped` and a new `start()` is needed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("speech recognition is not supported in this environment")]
    Unsupported,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("speech recognition service is unavailable")]
    ServiceUnavailable,

    #[error("network unavailable after {0} consecutive failures")]
    NetworkExhausted(u32),

    #[error("speech recognition could not be started: {0}")]
    StartFailure(String),

    #[error("speech recognition error: {0}")]
    Engine(String),
}

impl CaptureError {
    /// Stable machine-readable code, used in status payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::Unsupported => "unsupported",
            CaptureError::PermissionDenied => "permission_denied",
            CaptureError::ServiceUnavailable => "service_unavailable",
            CaptureError::NetworkExhausted(_) => "network_exhausted",
            CaptureError::StartFailure(_) => "start_failure",
            CaptureError::Engine(_) => "engine_error",
        }
    }
}
