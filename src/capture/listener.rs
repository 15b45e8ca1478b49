use crate::error::CaptureError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Notification delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The first engine of this capture began listening
    Started,
    /// Accumulated transcript, plus the interim hypothesis when `is_interim`
    Result { text: String, is_interim: bool },
    /// Terminal error; no further restarts
    Error(CaptureError),
    /// Capture ended with this transcript
    Ended(String),
}

/// Caller callbacks. All methods default to no-ops.
pub trait CaptureListener: Send + Sync {
    fn on_result(&self, _text: &str, _is_interim: bool) {}

    fn on_error(&self, _error: &CaptureError) {}

    fn on_start(&self) {}

    fn on_end(&self, _transcript: &str) {}
}

/// Route an event to the matching callback
pub fn dispatch(listener: &dyn CaptureListener, event: &CaptureEvent) {
    match event {
        CaptureEvent::Started => listener.on_start(),
        CaptureEvent::Result { text, is_interim } => listener.on_result(text, *is_interim),
        CaptureEvent::Error(error) => listener.on_error(error),
        CaptureEvent::Ended(transcript) => listener.on_end(transcript),
    }
}

/// Listener that only logs; status is read from the controller
pub struct TracingListener {
    capture_id: String,
}

impl TracingListener {
    pub fn new(capture_id: impl Into<String>) -> Self {
        Self {
            capture_id: capture_id.into(),
        }
    }
}

impl CaptureListener for TracingListener {
    fn on_result(&self, text: &str, is_interim: bool) {
        debug!("[{}] result (interim={}): {}", self.capture_id, is_interim, text);
    }

    fn on_error(&self, error: &CaptureError) {
        warn!("[{}] capture error: {}", self.capture_id, error);
    }

    fn on_start(&self) {
        info!("[{}] capture started", self.capture_id);
    }

    fn on_end(&self, transcript: &str) {
        info!("[{}] capture ended ({} chars)", self.capture_id, transcript.len());
    }
}

/// Listener that forwards every event onto a channel
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: CaptureEvent) {
        // Receiver gone means nobody is interested any more
        let _ = self.tx.send(event);
    }
}

impl CaptureListener for ChannelListener {
    fn on_result(&self, text: &str, is_interim: bool) {
        self.forward(CaptureEvent::Result {
            text: text.to_string(),
            is_interim,
        });
    }

    fn on_error(&self, error: &CaptureError) {
        self.forward(CaptureEvent::Error(error.clone()));
    }

    fn on_start(&self) {
        self.forward(CaptureEvent::Started);
    }

    fn on_end(&self, transcript: &str) {
        self.forward(CaptureEvent::Ended(transcript.to_string()));
    }
}
