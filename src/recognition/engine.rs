use super::events::RecognitionEvent;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Configuration handed to every engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// BCP-47 language tag
    pub language: String,
    /// Use the engine's own continuous mode
    pub continuous: bool,
    /// Report interim hypotheses
    pub interim_results: bool,
    /// Alternatives per result (only the first is used)
    pub max_alternatives: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: "tr-TR".to_string(),
            continuous: false,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

/// Speech recognition engine trait
///
/// An instance serves exactly one listening attempt. The controller builds a
/// fresh one for every restart and drops the previous instance once it has
/// reported `Ended`.
///
/// Implementations:
/// - NATS: remote speech-to-text service
/// - Script: replays a recorded event script (testing/demos)
#[async_trait::async_trait]
pub trait RecognitionEngine: Send {
    /// Start listening
    ///
    /// Returns a channel receiver for the engine's events. A closed channel
    /// is treated as `Ended`.
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognitionEvent>>;

    /// Stop gracefully: pending results are delivered, then `Ended`
    async fn stop(&mut self) -> Result<()>;

    /// Stop immediately, discarding pending results
    async fn abort(&mut self) -> Result<()>;

    /// Check if the engine is currently listening
    fn is_listening(&self) -> bool;

    /// Get engine name for logging
    fn name(&self) -> &str;
}

/// Builds engine instances and reports whether recognition is available
pub trait EngineFactory: Send + Sync {
    /// Whether the host exposes a speech recognition capability
    fn is_supported(&self) -> bool;

    /// Construct a new, not yet started, engine instance
    fn create(&self, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>>;
}
