use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response};
use tracing::{debug, info};

use crate::AppState;
use crate::handlers::http::utils::deliver_page::{deliver_html_page, deliver_redirect};
use crate::handlers::http::utils::headers::get_cookie;
use crate::security::session_gate::{AuthedUser, SESSION_COOKIE};

/// GET /admin/login
///
/// Open route, but an already-authenticated caller is sent straight to the
/// landing page instead of being shown a confusing re-login form.
pub async fn handle_login_page(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if let Some(token) = get_cookie(req.headers(), SESSION_COOKIE) {
        if let Some(user) = state.gate.check_request(&token).await {
            info!(
                "Already-authenticated user {} hit the login page, redirecting",
                user.username
            );
            return deliver_redirect("/admin").context("Failed to redirect away from login");
        }
    }

    let web_dir = state.config.read().await.paths.web_dir.clone();
    deliver_html_page(format!("{}/login.html", web_dir.trim_end_matches('/')))
        .context("Failed to deliver login page")
}

/// GET /admin — the back-office landing page. The router has already
/// verified the session.
pub async fn handle_admin_home(
    _req: Request<IncomingBody>,
    state: AppState,
    user: AuthedUser,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    debug!("Serving admin home to {}", user.username);

    let web_dir = state.config.read().await.paths.web_dir.clone();
    deliver_html_page(format!("{}/index.html", web_dir.trim_end_matches('/')))
        .context("Failed to deliver admin page")
}
