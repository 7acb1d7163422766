use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, StatusCode};
use tracing::warn;

use shared::types::Role;

use crate::AppState;
use crate::database::audit::recent_events;
use crate::handlers::http::utils::json_response::{deliver_error_json, deliver_success_json};
use crate::security::session_gate::AuthedUser;

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 200;

/// Explicit authorization step layered on top of the session check.
///
/// The router guarantees a live session; this guarantees enough privilege.
/// Handlers that need a role call this first and return early on `false`.
pub fn require_role(user: &AuthedUser, required: Role) -> bool {
    if user.role.at_least(required) {
        return true;
    }
    warn!(
        "User {} ({}) attempted an operation requiring {}",
        user.username, user.role, required
    );
    false
}

/// GET /admin/api/audit?limit=N — recent login/logout events, newest first.
/// Requires `admin` or above.
pub async fn handle_audit_log(
    req: Request<IncomingBody>,
    state: AppState,
    user: AuthedUser,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if !require_role(&user, Role::Admin) {
        return deliver_error_json(
            "FORBIDDEN",
            "Insufficient privileges",
            StatusCode::FORBIDDEN,
        )
        .context("Failed to deliver 403 response");
    }

    let limit = audit_limit(req.uri().query());

    let entries = recent_events(&state.db, limit)
        .await
        .context("Failed to load audit entries")?;

    deliver_success_json(Some(entries)).context("Failed to build audit response")
}

/// Parse `limit` from the query string; out-of-range or garbage values fall
/// back to the default, and the cap always wins.
fn audit_limit(query: Option<&str>) -> i64 {
    let requested = query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "limit")
                .map(|(_, value)| value.into_owned())
        })
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_AUDIT_LIMIT);

    requested.min(MAX_AUDIT_LIMIT)
}
