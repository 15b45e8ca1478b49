use super::client::NatsClient;
use super::messages::{
    ControlMessage, RecognitionEndedMessage, RecognitionErrorMessage, StartRecognitionMessage,
    TranscriptMessage, CONTROL_ABORT_SUBJECT, CONTROL_START_SUBJECT, CONTROL_STOP_SUBJECT,
    ENDED_SUBJECT, ERROR_SUBJECT, TRANSCRIPT_SUBJECTS,
};
use crate::recognition::{
    EngineConfig, EngineErrorKind, EngineFactory, RecognitionEngine, RecognitionEvent,
};
use anyhow::{bail, Result};
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long a gracefully stopped session may keep flushing results before
/// the service confirms on `stt.ended`
const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Builds engines backed by a remote STT service on NATS
pub struct NatsEngineFactory {
    client: NatsClient,
}

impl NatsEngineFactory {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }
}

impl EngineFactory for NatsEngineFactory {
    fn is_supported(&self) -> bool {
        self.client.is_connected()
    }

    fn create(&self, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
        Ok(Box::new(NatsEngine::new(self.client.clone(), config.clone())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopMode {
    Graceful,
    Abort,
}

/// One recognition session on the remote STT service
pub struct NatsEngine {
    client: NatsClient,
    config: EngineConfig,
    session_id: String,
    stop_tx: Option<oneshot::Sender<StopMode>>,
    listening: Arc<AtomicBool>,
}

impl NatsEngine {
    pub fn new(client: NatsClient, config: EngineConfig) -> Self {
        Self {
            client,
            config,
            session_id: format!("stt-{}", uuid::Uuid::new_v4()),
            stop_tx: None,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn request_stop(&mut self, mode: StopMode) -> Result<()> {
        let Some(stop_tx) = self.stop_tx.take() else {
            return Ok(());
        };

        let subject = match mode {
            StopMode::Graceful => CONTROL_STOP_SUBJECT,
            StopMode::Abort => CONTROL_ABORT_SUBJECT,
        };
        let message = ControlMessage {
            session_id: self.session_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };

        // The forwarding task ends on its own (drain timeout) if the control message is lost
        let _ = stop_tx.send(mode);
        self.client.publish_json(subject, &message).await
    }
}

#[async_trait::async_trait]
impl RecognitionEngine for NatsEngine {
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognitionEvent>> {
        if self.stop_tx.is_some() {
            bail!("Recognition session {} already started", self.session_id);
        }

        let transcripts = self.client.subscribe(TRANSCRIPT_SUBJECTS).await?;
        let errors = self.client.subscribe(ERROR_SUBJECT).await?;
        let ended = self.client.subscribe(ENDED_SUBJECT).await?;

        let request = StartRecognitionMessage {
            session_id: self.session_id.clone(),
            language: self.config.language.clone(),
            continuous: self.config.continuous,
            interim_results: self.config.interim_results,
            max_alternatives: self.config.max_alternatives,
            timestamp: Utc::now().to_rfc3339(),
        };
        self.client
            .publish_json(CONTROL_START_SUBJECT, &request)
            .await?;

        info!("Recognition session {} requested", self.session_id);

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let incoming = futures::stream::select_all([transcripts, errors, ended])
            .map(|msg| (msg.subject.to_string(), msg.payload.to_vec()))
            .boxed();

        tokio::spawn(forward_events(
            incoming,
            tx,
            stop_rx,
            self.session_id.clone(),
            Arc::clone(&self.listening),
        ));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.request_stop(StopMode::Graceful).await
    }

    async fn abort(&mut self) -> Result<()> {
        self.request_stop(StopMode::Abort).await
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.session_id
    }
}

/// Forward bus messages for one session as engine events
///
/// A graceful stop keeps forwarding until the service confirms the end or
/// `STOP_DRAIN_TIMEOUT` passes, so results flushed in answer to the stop are
/// delivered. An abort ends forwarding at once. `Ended` is always sent last.
async fn forward_events<S>(
    mut incoming: S,
    tx: mpsc::Sender<RecognitionEvent>,
    mut stop_rx: oneshot::Receiver<StopMode>,
    session_id: String,
    listening: Arc<AtomicBool>,
) where
    S: Stream<Item = (String, Vec<u8>)> + Unpin,
{
    listening.store(true, Ordering::SeqCst);
    if tx.send(RecognitionEvent::Started).await.is_err() {
        listening.store(false, Ordering::SeqCst);
        return;
    }

    let mut drain_until: Option<Instant> = None;

    loop {
        tokio::select! {
            msg = incoming.next() => match msg {
                Some((subject, payload)) => match decode_event(&subject, &payload, &session_id) {
                    Some(RecognitionEvent::Ended) => {
                        debug!("Recognition session {} confirmed end", session_id);
                        break;
                    }
                    Some(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    None => {}
                },
                None => {
                    if drain_until.is_none() {
                        warn!("NATS subscription closed for {}", session_id);
                        let _ = tx.send(RecognitionEvent::Error(EngineErrorKind::Network)).await;
                    }
                    break;
                }
            },
            mode = &mut stop_rx, if drain_until.is_none() => match mode {
                Ok(StopMode::Graceful) => {
                    debug!("Draining recognition session {}", session_id);
                    listening.store(false, Ordering::SeqCst);
                    drain_until = Some(Instant::now() + STOP_DRAIN_TIMEOUT);
                }
                Ok(StopMode::Abort) => {
                    let _ = tx.send(RecognitionEvent::Error(EngineErrorKind::Aborted)).await;
                    break;
                }
                // Engine dropped without stopping
                Err(_) => break,
            },
            _ = drain_timer(drain_until) => {
                warn!("Recognition session {} did not confirm end in time", session_id);
                break;
            }
        }
    }

    listening.store(false, Ordering::SeqCst);
    let _ = tx.send(RecognitionEvent::Ended).await;
    info!("Recognition session {} ended", session_id);
}

async fn drain_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Translate a NATS message into an engine event for `session_id`
///
/// Returns `None` for other sessions and malformed payloads.
pub fn decode_event(subject: &str, payload: &[u8], session_id: &str) -> Option<RecognitionEvent> {
    if subject == ENDED_SUBJECT {
        return match serde_json::from_slice::<RecognitionEndedMessage>(payload) {
            Ok(msg) if msg.session_id == session_id => Some(RecognitionEvent::Ended),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to parse recognition ended message: {}", e);
                None
            }
        };
    }

    if subject == ERROR_SUBJECT {
        return match serde_json::from_slice::<RecognitionErrorMessage>(payload) {
            Ok(msg) if msg.session_id == session_id => {
                Some(RecognitionEvent::Error(EngineErrorKind::from(msg.error)))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to parse recognition error message: {}", e);
                None
            }
        };
    }

    match serde_json::from_slice::<TranscriptMessage>(payload) {
        Ok(msg) if msg.session_id == session_id => Some(if msg.partial {
            RecognitionEvent::PartialText(msg.text)
        } else {
            RecognitionEvent::FinalText(msg.text)
        }),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse transcript message: {}", e);
            None
        }
    }
}
