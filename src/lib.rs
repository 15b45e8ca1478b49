pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod recognition;

pub use capture::{
    CaptureConfig, CaptureEvent, CaptureListener, CaptureState, CaptureStatus, ChannelListener,
    RetryPolicy, SpeechCaptureController,
};
pub use config::Config;
pub use error::CaptureError;
pub use http::{create_router, AppState};
pub use nats::{NatsClient, NatsEngineFactory};
pub use recognition::{
    AttemptScript, EngineConfig, EngineErrorKind, EngineFactory, EngineScript,
    RecognitionEngine, RecognitionEvent, ScriptedEngineFactory,
};
