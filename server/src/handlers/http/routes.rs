use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::handlers::http::{admin, auth, pages, utils::*};
use crate::security::session_gate::{AuthedUser, SESSION_COOKIE};

use shared::types::cache::CacheStrategy;

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Three security tiers:
//
//   OpenHandler    — no auth.  Receives (req, state).
//                    Use for: /health, the login page, login/logout APIs.
//
//   AuthedHandler  — session cookie verified against the database before the
//                    handler runs.  Receives (req, state, user).
//                    Registered as Page (failure → 302 to the login page)
//                    or Api (failure → 401 JSON).

type OpenHandler = Box<
    dyn Fn(
            Request<hyper::body::Incoming>,
            AppState,
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

type AuthedHandler = Box<
    dyn Fn(
            Request<hyper::body::Incoming>,
            AppState,
            AuthedUser, // resolved and verified by the router
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// RouteKind
// ---------------------------------------------------------------------------

enum RouteKind {
    /// No authentication check.
    Open(OpenHandler),

    /// Session required; a missing or invalid session redirects to the
    /// login page. Use for HTML pages a browser navigates to.
    Page(AuthedHandler),

    /// Session required; a missing or invalid session answers 401 JSON.
    /// Use for endpoints called from scripts.
    Api(AuthedHandler),
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
    web_dir: Option<String>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .field("web_dir", &self.web_dir)
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            web_dir: None,
        }
    }

    /// Override the configured `paths.web_dir` for static fallback serving.
    pub fn with_web_dir(mut self, web_dir: String) -> Self {
        self.web_dir = Some(web_dir);
        self
    }

    // ── Open (no auth) ────────────────────────────────────────────────────────

    /// GET with no authentication — health check and the login page only.
    pub fn get<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    /// POST with no authentication — login and logout only. Logout stays
    /// open because revoking a dead session must succeed, not bounce off
    /// the very check it is trying to satisfy.
    pub fn post<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::POST,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    // ── Page tier (session required, redirect on failure) ────────────────────
    //
    // The router resolves the session cookie through the gate before the
    // handler is called. Handlers receive the verified `AuthedUser` and
    // must NOT repeat the session check themselves.

    /// GET guarded by the session check; failures redirect to the login page.
    pub fn get_page<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, AuthedUser) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Page(Box::new(move |req, state, user| {
                Box::pin(handler(req, state, user))
            })),
        });
        self
    }

    // ── Api tier (session required, 401 JSON on failure) ─────────────────────

    /// GET guarded by the session check; failures answer 401 JSON.
    pub fn get_api<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, AuthedUser) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Api(Box::new(move |req, state, user| {
                Box::pin(handler(req, state, user))
            })),
        });
        self
    }

    /// POST guarded by the session check; failures answer 401 JSON.
    pub fn post_api<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, AuthedUser) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::POST,
            path: path.to_string(),
            kind: RouteKind::Api(Box::new(move |req, state, user| {
                Box::pin(handler(req, state, user))
            })),
        });
        self
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method != method || !Self::path_matches(&route.path, &path) {
                continue;
            }

            return match &route.kind {
                // ── Open ──────────────────────────────────────────────────────
                RouteKind::Open(h) => h(req, state).await,

                // ── Page: session check, redirect on failure ──────────────────
                RouteKind::Page(h) => match session_user(&req, &state).await {
                    Some(user) => h(req, state, user).await,
                    None => {
                        info!("No valid session for {} {}, redirecting to login", method, path);
                        deliver_redirect("/admin/login").context("Failed to deliver login redirect")
                    }
                },

                // ── Api: session check, 401 JSON on failure ───────────────────
                RouteKind::Api(h) => match session_user(&req, &state).await {
                    Some(user) => h(req, state, user).await,
                    None => {
                        warn!("Session check rejected {} {}", method, path);
                        unauthorized()
                    }
                },
            };
        }

        // No registered route matched — try static file fallback for GET.
        if method == Method::GET {
            if let Some(static_response) = self.try_serve_static(&req, &state).await? {
                return Ok(static_response);
            }
        }

        json_response::deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        // Exact match.
        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        // e.g.  "/admin/api/audit/:id"  matches  "/admin/api/audit/42"
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| r.starts_with(':') || r == p)
    }

    // ── Static file fallback ──────────────────────────────────────────────────
    //
    // Everything under /admin/ that is not a registered route is treated as
    // a static asset of the back office, served only to callers with a live
    // session. `/` itself just forwards to the admin landing page.

    async fn try_serve_static(
        &self,
        req: &Request<hyper::body::Incoming>,
        state: &AppState,
    ) -> Result<Option<Response<BoxBody<Bytes, Infallible>>>> {
        let path = req.uri().path();

        if path == "/" {
            return Ok(Some(
                deliver_redirect("/admin").context("Failed to deliver root redirect")?,
            ));
        }

        let Some(asset) = path.strip_prefix("/admin/") else {
            return Ok(None);
        };

        if !is_safe_asset_path(asset) {
            warn!("Rejected suspicious asset path: {}", path);
            return Ok(None);
        }

        // Assets sit behind the same session check as the pages they
        // belong to.
        if session_user(req, state).await.is_none() {
            return Ok(Some(
                deliver_redirect("/admin/login").context("Failed to deliver login redirect")?,
            ));
        }

        let web_dir = match &self.web_dir {
            Some(dir) => dir.clone(),
            None => state.config.read().await.paths.web_dir.clone(),
        };
        let file_path = format!("{}/{}", web_dir.trim_end_matches('/'), asset);

        let cache = if asset.ends_with(".html") {
            CacheStrategy::No
        } else {
            CacheStrategy::Yes
        };

        match deliver_page_with_status(&file_path, StatusCode::OK, cache) {
            Ok(response) => Ok(Some(response)),
            Err(e) => {
                debug!("No static asset at {}: {:#}", file_path, e);
                Ok(None)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve the session cookie to its user, if any. The single verification
/// path for every protected route and the static fallback.
async fn session_user(
    req: &Request<hyper::body::Incoming>,
    state: &AppState,
) -> Option<AuthedUser> {
    let token = headers::get_cookie(req.headers(), SESSION_COOKIE)?;
    state.gate.check_request(&token).await
}

/// Reject path segments that could escape the web directory.
fn is_safe_asset_path(asset: &str) -> bool {
    !asset.is_empty()
        && !asset.contains("..")
        && !asset.contains('\\')
        && !asset.contains('\0')
        && !asset.starts_with('/')
}

fn unauthorized() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    json_response::deliver_error_json(
        "UNAUTHORIZED",
        "Authentication required",
        StatusCode::UNAUTHORIZED,
    )
    .context("Failed to deliver 401 response")
}

// ---------------------------------------------------------------------------
// Admin router
//
// Auth tier is enforced here at the routing level — handlers MUST NOT repeat
// the session check.  The contract is:
//
//   .get(...)       → Open  — handler gets (req, state)
//   .post(...)      → Open  — login / logout only
//   .get_page(...)  → Page  — handler gets (req, state, user); 302 on failure
//   .get_api(...)   → Api   — handler gets (req, state, user); 401 on failure
//
// Role checks beyond "has a session" are an explicit second step inside the
// handler (see `admin::require_role`).
// ---------------------------------------------------------------------------

pub fn build_admin_router() -> Router {
    Router::new()
        // ── Public: no auth ──────────────────────────────────────────────────
        .get("/health", |_req, _state| async move {
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(deliver_page::full(Bytes::from(
                    r#"{"status":"success","health":"ok"}"#,
                )))
                .context("Failed to build health response")?)
        })
        .get("/admin/login", |req, state| async move {
            pages::handle_login_page(req, state)
                .await
                .context("Login page failed")
        })
        .post("/admin/api/login", |req, state| async move {
            auth::handle_login(req, state).await.context("Login failed")
        })
        .post("/admin/api/logout", |req, state| async move {
            auth::handle_logout(req, state)
                .await
                .context("Logout failed")
        })
        // ── Page tier ────────────────────────────────────────────────────────
        .get_page("/admin", |req, state, user| async move {
            pages::handle_admin_home(req, state, user)
                .await
                .context("Admin page failed")
        })
        // ── Api tier ─────────────────────────────────────────────────────────
        .get_api("/admin/api/session", |req, state, user| async move {
            auth::handle_session_info(req, state, user)
                .await
                .context("Session info failed")
        })
        .get_api("/admin/api/audit", |req, state, user| async move {
            admin::handle_audit_log(req, state, user)
                .await
                .context("Audit listing failed")
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
