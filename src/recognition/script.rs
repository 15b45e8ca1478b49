//! Scripted recognition engine
//!
//! Replays a recorded sequence of engine events, one script per listening
//! attempt. Used by the `replay` command and by tests that need a
//! deterministic engine.
//!
//! ```json
//! {
//!   "attempts": [
//!     { "steps": [ { "emit": "started" }, { "emit": { "final_text": "Merhaba" } },
//!                  { "emit": { "error": "no-speech" } }, { "emit": "ended" } ] },
//!     { "steps": [ { "emit": "started" }, { "wait_ms": 250 },
//!                  { "emit": { "final_text": "nasılsın" } } ] }
//!   ]
//! }
//! ```

use super::engine::{EngineConfig, EngineFactory, RecognitionEngine};
use super::events::{EngineErrorKind, RecognitionEvent};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A full engine script: capability flag plus one entry per attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineScript {
    /// Whether the scripted host supports recognition at all
    #[serde(default = "default_supported")]
    pub supported: bool,

    /// Scripts for successive engine instances
    #[serde(default)]
    pub attempts: Vec<AttemptScript>,
}

fn default_supported() -> bool {
    true
}

impl Default for EngineScript {
    fn default() -> Self {
        Self {
            supported: true,
            attempts: Vec::new(),
        }
    }
}

impl EngineScript {
    pub fn new(attempts: Vec<AttemptScript>) -> Self {
        Self {
            supported: true,
            attempts,
        }
    }

    /// A host without speech recognition
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            attempts: Vec::new(),
        }
    }

    /// Load a script from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine script {}", path.display()))?;

        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse engine script {}", path.display()))
    }
}

/// Script for a single engine instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptScript {
    #[serde(default)]
    pub steps: Vec<ScriptStep>,

    /// When set, `start()` fails with this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_start: Option<String>,
}

impl AttemptScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt that starts and then listens until stopped
    pub fn listening() -> Self {
        Self::new().emit(RecognitionEvent::Started)
    }

    /// Attempt whose engine cannot be started
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            fail_start: Some(message.into()),
        }
    }

    pub fn emit(mut self, event: RecognitionEvent) -> Self {
        self.steps.push(ScriptStep::Emit(event));
        self
    }

    pub fn wait_ms(mut self, ms: u64) -> Self {
        self.steps.push(ScriptStep::WaitMs(ms));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    Emit(RecognitionEvent),
    WaitMs(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopMode {
    Graceful,
    Abort,
}

/// Factory handing out scripted engines in attempt order
pub struct ScriptedEngineFactory {
    script: EngineScript,
    created: AtomicUsize,
}

impl ScriptedEngineFactory {
    pub fn new(script: EngineScript) -> Self {
        Self {
            script,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of engine instances constructed so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn is_supported(&self) -> bool {
        self.script.supported
    }

    fn create(&self, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        let attempt = self
            .script
            .attempts
            .get(index)
            .cloned()
            .unwrap_or_else(AttemptScript::listening);

        debug!(
            "Creating scripted engine #{} (language={}, continuous={})",
            index, config.language, config.continuous
        );

        Ok(Box::new(ScriptedEngine {
            name: format!("script#{}", index),
            attempt,
            stop_tx: None,
            listening: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// Engine instance replaying one `AttemptScript`
pub struct ScriptedEngine {
    name: String,
    attempt: AttemptScript,
    stop_tx: Option<oneshot::Sender<StopMode>>,
    listening: Arc<AtomicBool>,
}

impl ScriptedEngine {
    fn request_stop(&mut self, mode: StopMode) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The replay task may already have finished; nothing to stop then
            let _ = stop_tx.send(mode);
        }
    }
}

#[async_trait::async_trait]
impl RecognitionEngine for ScriptedEngine {
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognitionEvent>> {
        if let Some(message) = &self.attempt.fail_start {
            bail!("{}", message);
        }
        if self.stop_tx.is_some() {
            bail!("{} already started", self.name);
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let steps = self.attempt.steps.clone();
        let listening = Arc::clone(&self.listening);

        tokio::spawn(replay(steps, tx, stop_rx, listening));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.request_stop(StopMode::Graceful);
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.request_stop(StopMode::Abort);
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

async fn replay(
    steps: Vec<ScriptStep>,
    tx: mpsc::Sender<RecognitionEvent>,
    mut stop_rx: oneshot::Receiver<StopMode>,
    listening: Arc<AtomicBool>,
) {
    for step in steps {
        match step {
            ScriptStep::Emit(event) => {
                let ended = event == RecognitionEvent::Ended;
                match event {
                    RecognitionEvent::Started => listening.store(true, Ordering::SeqCst),
                    RecognitionEvent::Ended => listening.store(false, Ordering::SeqCst),
                    _ => {}
                }

                if tx.send(event).await.is_err() || ended {
                    return;
                }
            }
            ScriptStep::WaitMs(ms) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                    mode = &mut stop_rx => {
                        finish(&tx, mode.ok(), &listening).await;
                        return;
                    }
                }
            }
        }
    }

    // Script exhausted without ending: keep listening until told otherwise
    let mode = stop_rx.await.ok();
    finish(&tx, mode, &listening).await;
}

async fn finish(
    tx: &mpsc::Sender<RecognitionEvent>,
    mode: Option<StopMode>,
    listening: &AtomicBool,
) {
    listening.store(false, Ordering::SeqCst);

    if mode == Some(StopMode::Abort) {
        let _ = tx
            .send(RecognitionEvent::Error(EngineErrorKind::Aborted))
            .await;
    }
    let _ = tx.send(RecognitionEvent::Ended).await;
}
