use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response};

use shared::types::login::SessionInfo;

use crate::AppState;
use crate::handlers::http::utils::json_response::deliver_success_json;
use crate::security::session_gate::AuthedUser;

/// GET /admin/api/session — who am I, and until when.
pub async fn handle_session_info(
    _req: Request<IncomingBody>,
    _state: AppState,
    user: AuthedUser,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_success_json(Some(SessionInfo {
        user_id: user.user_id,
        username: user.username,
        role: user.role,
        expires_at: user.expires_at,
    }))
    .context("Failed to build session info response")
}
