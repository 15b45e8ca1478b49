use crate::capture::{CaptureConfig, SpeechCaptureController};
use crate::recognition::EngineFactory;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Engine backend for new captures
    pub factory: Arc<dyn EngineFactory>,

    /// Defaults applied to new captures
    pub defaults: CaptureConfig,

    /// Known captures (capture_id → controller)
    pub captures: Arc<RwLock<HashMap<String, Arc<SpeechCaptureController>>>>,
}

impl AppState {
    pub fn new(factory: Arc<dyn EngineFactory>, defaults: CaptureConfig) -> Self {
        Self {
            factory,
            defaults,
            captures: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
