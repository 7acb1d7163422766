use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::types::role::Role;

// ---------------------------------------------------------------------------
// Login wire types
// ---------------------------------------------------------------------------

/// Incoming login payload (JSON body or url-encoded form).
#[derive(Debug, Deserialize)]
pub struct LoginData {
    #[serde(alias = "email")]
    pub username: String,
    pub password: String,
}

/// Login response envelope.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    Success {
        user_id: i64,
        username: String,
        role: Role,
        /// Cookie lifetime in seconds.
        expires_in: u64,
        message: String,
        redirect: String,
    },
    Error {
        code: String,
        message: String,
        /// Attempts left in the current window; present on credential
        /// failures while the caller is still under the threshold.
        #[serde(skip_serializing_if = "Option::is_none")]
        remaining: Option<u32>,
    },
}

// ---------------------------------------------------------------------------
// Login errors
// ---------------------------------------------------------------------------

/// Wire-level login failures.
///
/// There is no "user not found" variant: unknown usernames and wrong
/// passwords both surface as `InvalidCredentials` so the endpoint cannot be
/// used to enumerate accounts. Disabled accounts stay distinct; that state
/// is only reachable after the password already checked out.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginError {
    MissingField(String),
    InvalidCredentials,
    AccountDisabled,
    RateLimited { retry_after_secs: u64 },
    InternalError,
}

impl LoginError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::InvalidCredentials => "Invalid username or password".to_string(),
            Self::AccountDisabled => "This account has been disabled".to_string(),
            Self::RateLimited { retry_after_secs } => format!(
                "Too many login attempts. Try again in {} seconds",
                retry_after_secs
            ),
            Self::InternalError => "An internal error occurred".to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self, remaining: Option<u32>) -> LoginResponse {
        LoginResponse::Error {
            code: self.to_code().to_string(),
            message: self.to_message(),
            remaining,
        }
    }
}

// ---------------------------------------------------------------------------
// Session info (GET /admin/api/session)
// ---------------------------------------------------------------------------

/// Current-user payload returned to the admin frontend.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    /// Unix seconds at which the session expires.
    pub expires_at: i64,
}
