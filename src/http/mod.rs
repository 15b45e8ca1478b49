//! HTTP API for controlling speech captures
//!
//! - POST /captures - Start a new capture
//! - POST /captures/:id/stop - Stop a capture
//! - GET /captures/:id/status - Query capture status
//! - GET /captures/:id/transcript - Get accumulated transcript
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{StartCaptureRequest, StartCaptureResponse, TranscriptResponse};
pub use routes::create_router;
pub use state::AppState;
