use serde::Serialize;
use sqlx::SqlitePool;

use super::utils::truncate_string;

/// Usernames in audit rows are attacker-controlled input; cap what we store.
const MAX_AUDIT_USERNAME: usize = 64;
const MAX_AUDIT_USER_AGENT: usize = 256;

/// What kind of event an audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

/// A stored audit row, shaped for the audit endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub action: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub details: Option<String>,
    pub created_at: i64,
}

/// An event about to be recorded.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// Set when the attempt resolved to a known account.
    pub user_id: Option<i64>,
    /// Username as the client sent it; may not match any account.
    pub username: String,
    pub action: AuditAction,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub success: bool,
    /// Failure code, e.g. "invalid_credentials"; None on success.
    pub details: Option<String>,
}

/// Record an audit event
pub async fn record_event(
    pool: &SqlitePool,
    entry: NewAuditEntry,
    created_at: i64,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO login_audit
            (user_id, username, action, ip_address, user_agent, success, details, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.user_id)
    .bind(truncate_string(&entry.username, MAX_AUDIT_USERNAME))
    .bind(entry.action.as_str())
    .bind(entry.ip_address)
    .bind(
        entry
            .user_agent
            .map(|ua| truncate_string(&ua, MAX_AUDIT_USER_AGENT)),
    )
    .bind(entry.success)
    .bind(entry.details)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Fetch the most recent events, newest first
pub async fn recent_events(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<AuditEntry>> {
    sqlx::query_as(
        "SELECT id, user_id, username, action, ip_address, user_agent, success, details, created_at
         FROM login_audit
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
