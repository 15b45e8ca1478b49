use crate::recognition::EngineConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a speech capture controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Rely on the engine's own continuous mode.
    /// When false, the controller restarts the engine after every utterance
    /// and keeps accumulating text across restarts.
    pub continuous: bool,

    /// BCP-47 language tag passed to the engine
    pub language: String,

    /// Whether interim hypotheses are requested from the engine
    pub interim_results: bool,

    /// Restart delays and the network failure ceiling
    pub retry: RetryPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            language: "tr-TR".to_string(),
            interim_results: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl CaptureConfig {
    /// Settings for each engine instance
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            language: self.language.clone(),
            continuous: self.continuous,
            interim_results: self.interim_results,
            max_alternatives: 1,
        }
    }
}

/// Why the engine is being restarted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartCause {
    /// The engine heard nothing
    NoSpeech,
    /// The engine ended an utterance on its own
    NaturalEnd,
    /// Network error; carries the consecutive failure count
    Network(u32),
}

/// Restart backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after a `no-speech` error
    /// Default: 500ms
    pub no_speech_delay_ms: u64,

    /// Delay after the engine ends an utterance
    /// Default: 300ms
    pub natural_end_delay_ms: u64,

    /// Per-failure delay after a network error, multiplied by the number of
    /// consecutive failures
    /// Default: 1000ms
    pub network_base_delay_ms: u64,

    /// Consecutive network failures that end the capture
    /// Default: 3
    pub network_failure_ceiling: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            no_speech_delay_ms: 500,
            natural_end_delay_ms: 300,
            network_base_delay_ms: 1000,
            network_failure_ceiling: 3,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, cause: RestartCause) -> Duration {
        match cause {
            RestartCause::NoSpeech => Duration::from_millis(self.no_speech_delay_ms),
            RestartCause::NaturalEnd => Duration::from_millis(self.natural_end_delay_ms),
            RestartCause::Network(failures) => {
                Duration::from_millis(self.network_base_delay_ms.saturating_mul(failures as u64))
            }
        }
    }

    /// Whether this many consecutive network failures ends the capture
    pub fn network_exhausted(&self, failures: u32) -> bool {
        failures >= self.network_failure_ceiling
    }
}
