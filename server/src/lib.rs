use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::SqlitePool;

use shared::config::LiveConfig;

pub mod database;
pub mod handlers;
pub mod security;

use security::clock::Clock;
use security::rate_limiter::LoginRateLimiter;
use security::session_gate::SessionGate;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: LiveConfig,
    pub gate: SessionGate,
    pub limiter: LoginRateLimiter,
    /// Time source shared with the gate and limiter so handlers, expiry
    /// checks and rate decisions all agree on "now".
    pub clock: Arc<dyn Clock>,
}

/// Socket address of the connection a request arrived on, stashed in the
/// request extensions by the accept loop. Proxy headers take priority over
/// it when resolving a client IP.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub SocketAddr);
