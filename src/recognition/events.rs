use serde::{Deserialize, Serialize};
use std::fmt;

/// Event reported by a recognition engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// The engine began listening
    Started,
    /// Interim hypothesis; replaced by the next event
    PartialText(String),
    /// Committed fragment
    FinalText(String),
    /// Engine-reported error
    Error(EngineErrorKind),
    /// The engine instance terminated
    Ended,
}

/// Error kinds reported by the native recognition engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EngineErrorKind {
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    ServiceNotAllowed,
    BadGrammar,
    LanguageNotSupported,
    Other(String),
}

impl EngineErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            EngineErrorKind::NoSpeech => "no-speech",
            EngineErrorKind::Aborted => "aborted",
            EngineErrorKind::AudioCapture => "audio-capture",
            EngineErrorKind::Network => "network",
            EngineErrorKind::NotAllowed => "not-allowed",
            EngineErrorKind::ServiceNotAllowed => "service-not-allowed",
            EngineErrorKind::BadGrammar => "bad-grammar",
            EngineErrorKind::LanguageNotSupported => "language-not-supported",
            EngineErrorKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for EngineErrorKind {
    fn from(kind: &str) -> Self {
        match kind {
            "no-speech" => EngineErrorKind::NoSpeech,
            "aborted" => EngineErrorKind::Aborted,
            "audio-capture" => EngineErrorKind::AudioCapture,
            "network" => EngineErrorKind::Network,
            "not-allowed" => EngineErrorKind::NotAllowed,
            "service-not-allowed" => EngineErrorKind::ServiceNotAllowed,
            "bad-grammar" => EngineErrorKind::BadGrammar,
            "language-not-supported" => EngineErrorKind::LanguageNotSupported,
            other => EngineErrorKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EngineErrorKind {
    fn from(kind: String) -> Self {
        EngineErrorKind::from(kind.as_str())
    }
}

impl From<EngineErrorKind> for String {
    fn from(kind: EngineErrorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
