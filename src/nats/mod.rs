pub mod client;
pub mod engine;
pub mod messages;

pub use client::NatsClient;
pub use engine::{decode_event, NatsEngine, NatsEngineFactory};
pub use messages::{
    ControlMessage, RecognitionEndedMessage, RecognitionErrorMessage, StartRecognitionMessage, TranscriptMessage,
};
