//! API request and response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /solve`.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    /// Seed task URL
    pub url: String,

    /// Caller secret, compared against the trusted one
    pub secret: String,

    /// Accepted for compatibility; submissions always use the configured email
    #[serde(default)]
    pub email: Option<String>,
}

/// Outcome of a chain run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    pub last_task: String,
    pub total_attempts: u32,
    pub tasks_visited: usize,
    pub elapsed_ms: u64,
    pub message: String,
}

/// Response of `POST /solve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResponse {
    /// "ok", "timeout" or "error"
    pub status: String,
    /// Seed URL
    pub url: String,
    /// RFC 3339 timestamps
    pub started_at: String,
    pub finished_at: String,
    pub result: SolveResult,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error body for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
