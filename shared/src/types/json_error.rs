use serde::{Deserialize, Serialize};

/// Error envelope shared by every JSON error the admin API returns.
///
/// `status` is always `"error"` so scripts can branch on it the same way
/// they do for the tagged success envelope; `code` is a stable
/// SCREAMING_SNAKE identifier (`INVALID_CREDENTIALS`, `RATE_LIMITED`,
/// `UNAUTHORIZED`, ...) and `message` is for humans.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            code: code.into(),
            message: message.into(),
        }
    }
}
