//! Wire shapes returned by the gateway.
//!
//! The request envelope itself is [`crate::handlers::JobRequest`]:
//!
//! ```json
//! {
//!   "cmd": "imagecomp/bucket/bXlidWNrZXQ=/rows/2/cols/2/url/aHR0cDovL2gvYS5wbmc=",
//!   "src": { "url": "http://h/a.png", "mimetype": "image/png", "fsize": 1024 }
//! }
//! ```

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub operations: Vec<String>,
    pub version: String,
    pub jobs: JobCounters,
}

#[derive(Debug, Serialize)]
pub struct JobCounters {
    pub accepted: u64,
    pub succeeded: u64,
    pub failed: u64,
}
