use serde::{Deserialize, Serialize};

/// Transcripts published by the STT service (`stt.text.partial`, `stt.text.final`)
pub const TRANSCRIPT_SUBJECTS: &str = "stt.text.>";
/// Recognition errors published by the STT service
pub const ERROR_SUBJECT: &str = "stt.error";
/// Published by the STT service once a session has finished
pub const ENDED_SUBJECT: &str = "stt.ended";
/// Ask the STT service to begin recognising a session
pub const CONTROL_START_SUBJECT: &str = "stt.control.start";
/// Ask the STT service to finish a session, flushing pending results
pub const CONTROL_STOP_SUBJECT: &str = "stt.control.stop";
/// Ask the STT service to drop a session immediately
pub const CONTROL_ABORT_SUBJECT: &str = "stt.control.abort";

/// Start request published on `stt.control.start`
#[derive(Debug, Serialize, Deserialize)]
pub struct StartRecognitionMessage {
    pub session_id: String,
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
    pub timestamp: String, // RFC3339 timestamp
}

/// Stop/abort request published on the control subjects
#[derive(Debug, Serialize, Deserialize)]
pub struct ControlMessage {
    pub session_id: String,
    pub timestamp: String,
}

/// Transcript message received from STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Error message received from STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionErrorMessage {
    pub session_id: String,
    /// Native error kind, e.g. `no-speech` or `network`
    pub error: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Session end confirmation received on `stt.ended`
#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionEndedMessage {
    pub session_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
