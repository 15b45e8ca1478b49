use super::config::CaptureConfig;
use super::listener::{dispatch, CaptureEvent, CaptureListener};
use super::machine::{CaptureMachine, Effect, Input};
use super::state::{CaptureState, CaptureStatus};
use crate::error::CaptureError;
use crate::recognition::{EngineConfig, EngineFactory, RecognitionEngine, RecognitionEvent};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

enum Command {
    Stop,
}

struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
    _task: JoinHandle<()>,
}

/// Start/stop/result/error contract over an unreliable recognition engine
///
/// Transient engine failures are masked behind rate-limited restarts. When
/// `continuous` is off, the engine is restarted after every utterance and
/// text accumulates across restarts until `stop()`.
pub struct SpeechCaptureController {
    /// Identifier reported in status snapshots
    capture_id: String,

    /// Capture configuration
    config: CaptureConfig,

    /// Builds one engine instance per listening attempt
    factory: Arc<dyn EngineFactory>,

    /// Caller callbacks
    listener: Arc<dyn CaptureListener>,

    /// Cooperative intent flag, cleared by `stop()` before the driver hears about it
    should_continue: Arc<AtomicBool>,

    /// Latest status, published by the driver task
    status: Arc<watch::Sender<CaptureStatus>>,

    /// Handle for the running driver task
    driver: Mutex<Option<DriverHandle>>,
}

impl SpeechCaptureController {
    pub fn new(
        capture_id: impl Into<String>,
        config: CaptureConfig,
        factory: Arc<dyn EngineFactory>,
        listener: Arc<dyn CaptureListener>,
    ) -> Self {
        let capture_id = capture_id.into();
        let (status, _) = watch::channel(CaptureStatus::idle(capture_id.clone()));

        Self {
            capture_id,
            config,
            factory,
            listener,
            should_continue: Arc::new(AtomicBool::new(false)),
            status: Arc::new(status),
            driver: Mutex::new(None),
        }
    }

    pub fn capture_id(&self) -> &str {
        &self.capture_id
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Whether the host exposes speech recognition
    pub fn is_supported(&self) -> bool {
        self.factory.is_supported()
    }

    /// Start capturing
    ///
    /// Returns `false` when recognition is unsupported (after `on_error`), when
    /// a capture is already running, or when the first engine could not be
    /// started (after `on_error`).
    pub async fn start(&self) -> bool {
        if !self.is_supported() {
            warn!("Speech recognition unsupported for {}", self.capture_id);
            let error = CaptureError::Unsupported;
            self.status.send_modify(|status| {
                status.last_error = Some(error.code().to_string());
            });
            self.listener.on_error(&error);
            return false;
        }

        let mut driver = self.driver.lock().await;
        if self.status.borrow().state.is_running() {
            warn!("Capture {} already running", self.capture_id);
            return false;
        }

        let mut machine = CaptureMachine::new(self.config.continuous, self.config.retry.clone());
        let effects = machine.begin();
        self.should_continue.store(true, Ordering::SeqCst);
        self.status
            .send_replace(CaptureStatus::idle(self.capture_id.clone()));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let mut core = Driver {
            capture_id: self.capture_id.clone(),
            machine,
            factory: Arc::clone(&self.factory),
            engine_config: self.config.engine_config(),
            listener: Arc::clone(&self.listener),
            should_continue: Arc::clone(&self.should_continue),
            status: Arc::clone(&self.status),
            engine: None,
            events: None,
            restart_at: None,
            commands: commands_rx,
            commands_closed: false,
        };

        // Launch the first engine inline so a start failure is reported to the caller
        core.apply(effects).await;
        if !core.machine.is_running() {
            return false;
        }

        let task = tokio::spawn(core.run());
        *driver = Some(DriverHandle {
            commands: commands_tx,
            _task: task,
        });

        true
    }

    /// Request termination
    ///
    /// Cancels any scheduled restart. If an engine is active it is asked to
    /// stop gracefully and `on_end` fires once it confirms. No-op when not
    /// running.
    pub async fn stop(&self) {
        self.should_continue.store(false, Ordering::SeqCst);

        let driver = self.driver.lock().await;
        if !self.status.borrow().state.is_running() {
            debug!("Capture {} not running", self.capture_id);
            return;
        }

        if let Some(handle) = driver.as_ref() {
            if handle.commands.send(Command::Stop).is_err() {
                debug!("Capture {} driver already finished", self.capture_id);
            }
        }
    }

    /// Whether the engine is listening right now (false while a restart is pending)
    pub fn is_active(&self) -> bool {
        self.status.borrow().active
    }

    pub fn state(&self) -> CaptureState {
        self.status.borrow().state
    }

    /// Accumulated final transcript
    pub fn transcript(&self) -> String {
        self.status.borrow().transcript.clone()
    }

    /// Current status snapshot
    pub fn status(&self) -> CaptureStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    /// Wait until no capture is running
    pub async fn wait_stopped(&self) {
        let mut rx = self.status.subscribe();
        if rx.wait_for(|status| !status.state.is_running()).await.is_err() {
            debug!("Status channel closed for {}", self.capture_id);
        }
    }
}

/// Owns the machine and the engine for one capture, on its own task
struct Driver {
    capture_id: String,
    machine: CaptureMachine,
    factory: Arc<dyn EngineFactory>,
    engine_config: EngineConfig,
    listener: Arc<dyn CaptureListener>,
    should_continue: Arc<AtomicBool>,
    status: Arc<watch::Sender<CaptureStatus>>,
    engine: Option<Box<dyn RecognitionEngine>>,
    events: Option<mpsc::Receiver<RecognitionEvent>>,
    restart_at: Option<Instant>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_closed: bool,
}

impl Driver {
    async fn run(mut self) {
        info!("Capture driver started: {}", self.capture_id);

        while self.machine.is_running() {
            let input = tokio::select! {
                command = self.commands.recv(), if !self.commands_closed => match command {
                    Some(Command::Stop) => Input::StopRequested,
                    None => {
                        // Controller dropped: nobody can stop us any more
                        self.commands_closed = true;
                        Input::StopRequested
                    }
                },
                event = next_event(&mut self.events) => match event {
                    Some(event) => Input::Engine(event),
                    None => {
                        debug!("Engine event channel closed");
                        self.events = None;
                        Input::Engine(RecognitionEvent::Ended)
                    }
                },
                _ = restart_timer(self.restart_at) => {
                    self.restart_at = None;
                    if self.should_continue.load(Ordering::SeqCst) {
                        Input::RestartDue
                    } else {
                        Input::StopRequested
                    }
                }
            };

            let effects = self.machine.handle(input);
            self.apply(effects).await;
        }

        info!("Capture driver stopped: {}", self.capture_id);
    }

    /// Carry out effects, publish the new status, then notify the listener
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut notifications = Vec::new();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::LaunchEngine => {
                    if !self.should_continue.load(Ordering::SeqCst) {
                        queue.extend(self.machine.handle(Input::StopRequested));
                        continue;
                    }
                    if let Err(e) = self.launch().await {
                        error!("Failed to launch engine: {:#}", e);
                        queue.extend(self.machine.handle(Input::LaunchFailed(format!("{:#}", e))));
                    }
                }
                effect @ (Effect::StopEngine | Effect::AbortEngine) => {
                    let abort = effect == Effect::AbortEngine;
                    if !self.halt_engine(abort).await {
                        queue.extend(self.machine.handle(Input::Engine(RecognitionEvent::Ended)));
                    }
                }
                Effect::ReleaseEngine => {
                    if let Some(engine) = self.engine.take() {
                        debug!("Released engine {}", engine.name());
                    }
                    self.events = None;
                }
                Effect::ScheduleRestart(delay) => {
                    self.restart_at = Some(Instant::now() + delay);
                }
                Effect::CancelRestart => {
                    self.restart_at = None;
                }
                Effect::Notify(event) => notifications.push(event),
            }
        }

        self.publish(notifications.iter().rev().find_map(|event| match event {
            CaptureEvent::Error(error) => Some(error.code().to_string()),
            _ => None,
        }));

        for event in &notifications {
            dispatch(self.listener.as_ref(), event);
        }
    }

    async fn launch(&mut self) -> Result<()> {
        let mut engine = self
            .factory
            .create(&self.engine_config)
            .context("Failed to create recognition engine")?;

        let events = engine
            .start()
            .await
            .with_context(|| format!("Failed to start {}", engine.name()))?;

        info!("Engine {} launched for {}", engine.name(), self.capture_id);
        self.engine = Some(engine);
        self.events = Some(events);
        Ok(())
    }

    /// Ask the engine to stop. Returns false when there is no engine left to
    /// report `Ended`.
    async fn halt_engine(&mut self, abort: bool) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };

        let result = if abort {
            engine.abort().await
        } else {
            engine.stop().await
        };

        match result {
            Ok(()) => self.events.is_some(),
            Err(e) => {
                error!("Failed to stop engine {}: {:#}", engine.name(), e);
                self.engine = None;
                self.events = None;
                false
            }
        }
    }

    fn publish(&self, error_code: Option<String>) {
        let state = self.machine.state();
        let session = self.machine.session();

        self.status.send_modify(|status| {
            status.state = state;
            status.active = self.machine.is_active();
            if let Some(code) = error_code {
                status.last_error = Some(code);
            }
            if let Some(session) = session {
                status.transcript = session.accumulated_text.clone();
                status.interim = session.interim_text.clone();
                status.results = session.results;
                status.restarts = session.restarts;
                status.network_failures = session.network_failure_count;
                status.started_at = Some(session.started_at);
            }
        });
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<RecognitionEvent>>) -> Option<RecognitionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn restart_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
