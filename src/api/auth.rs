//! Shared-secret caller authentication.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::types::ErrorResponse;

/// Caller failed authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid secret")]
    Mismatch,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a_bytes.iter().zip(b_bytes) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Compare the caller's secret with the trusted one.
pub fn verify_secret(provided: &str, trusted: &str) -> Result<(), AuthError> {
    if constant_time_eq(provided, trusted) {
        Ok(())
    } else {
        tracing::warn!("Rejected request with invalid secret");
        Err(AuthError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_secrets_pass() {
        assert!(verify_secret("s3cret", "s3cret").is_ok());
    }

    #[test]
    fn different_secrets_fail() {
        assert!(verify_secret("s3cret", "s3creT").is_err());
        assert!(verify_secret("short", "longer-secret").is_err());
        assert!(verify_secret("", "x").is_err());
    }

    #[test]
    fn mismatch_maps_to_forbidden() {
        let response = AuthError::Mismatch.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
