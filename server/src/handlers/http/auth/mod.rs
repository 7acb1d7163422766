pub mod login;
pub mod logout;
pub mod session;

pub use login::handle_login;
pub use logout::handle_logout;
pub use session::handle_session_info;

use tracing::warn;

use crate::AppState;
use crate::database::audit::{self, NewAuditEntry};

/// Record an audit event, log-and-continue on failure. Losing an audit row
/// must never fail a legitimate login or logout.
pub(crate) async fn record_audit(state: &AppState, entry: NewAuditEntry) {
    if let Err(e) = audit::record_event(&state.db, entry, state.clock.now_secs()).await {
        warn!("Audit write failed (continuing): {}", e);
    }
}
