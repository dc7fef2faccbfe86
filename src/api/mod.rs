//! HTTP service.
//!
//! ## Endpoints
//!
//! - `POST /solve` - Authenticate the caller and run one chain from the seed URL
//! - `GET /healthz` - Health check

mod auth;
mod routes;
pub mod types;

pub use auth::{verify_secret, AuthError};
pub use routes::{router, serve, AppState};
