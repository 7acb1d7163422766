use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, header};
use tracing::info;

use crate::AppState;
use crate::database::audit::{AuditAction, NewAuditEntry};
use crate::handlers::http::auth::record_audit;
use crate::handlers::http::utils::headers::{client_ip, delete_cookie, get_cookie, get_user_agent};
use crate::handlers::http::utils::json_response::deliver_success_json;
use crate::security::session_gate::SESSION_COOKIE;

/// POST /admin/api/logout
///
/// Idempotent: always reports success, whether or not a session existed.
/// The cookie is cleared either way.
pub async fn handle_logout(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if let Some(token) = get_cookie(req.headers(), SESSION_COOKIE) {
        // Resolve the session before revoking it so the audit row can name
        // the user. A stale or bogus token resolves to nothing and is still
        // revoked (a no-op) without complaint.
        let user = state.gate.check_request(&token).await;
        let revoked = state.gate.end_session(&token).await;

        if let Some(user) = &user {
            info!("User {} logged out (revoked: {})", user.username, revoked);
        }

        record_audit(
            &state,
            NewAuditEntry {
                user_id: user.as_ref().map(|u| u.user_id),
                username: user
                    .map(|u| u.username)
                    .unwrap_or_else(|| "unknown".to_string()),
                action: AuditAction::Logout,
                ip_address: client_ip(req.headers(), req.extensions()),
                user_agent: get_user_agent(req.headers()),
                success: true,
                details: None,
            },
        )
        .await;
    }

    let secure = state.config.read().await.auth.secure_cookies;
    let clear_cookie =
        delete_cookie(SESSION_COOKIE, secure).context("Failed to build cookie removal")?;

    let mut response =
        deliver_success_json(None::<()>).context("Failed to build logout response")?;
    response
        .headers_mut()
        .insert(header::SET_COOKIE, clear_cookie);

    Ok(response)
}
