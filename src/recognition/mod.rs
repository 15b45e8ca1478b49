pub mod engine;
pub mod events;
pub mod script;

pub use engine::{EngineConfig, EngineFactory, RecognitionEngine};
pub use events::{EngineErrorKind, RecognitionEvent};
pub use script::{AttemptScript, EngineScript, ScriptStep, ScriptedEngineFactory};
