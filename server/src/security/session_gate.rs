use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use shared::types::Role;

use super::clock::Clock;
use crate::database::{sessions, users, utils};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "admin_session";

/// Single verification policy for admin sessions.
///
/// Every protected path goes through [`check_request`]; there is no
/// secondary marker-cookie shortcut. The cookie carries a random token,
/// the database stores only its SHA-256, and a lookup hashes the cookie
/// value and joins the session row with its user.
///
/// [`check_request`]: SessionGate::check_request
#[derive(Clone, Debug)]
pub struct SessionGate {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    session_ttl_secs: i64,
}

/// Why an `authenticate` call was refused.
#[derive(Debug)]
pub enum AuthError {
    /// No user row for that username. Kept distinct from
    /// `InvalidCredentials` for the audit trail; the HTTP boundary
    /// collapses the two so responses cannot be used to enumerate
    /// accounts.
    UserNotFound,
    InvalidCredentials,
    AccountDisabled,
    /// User or session store failure. Always fails closed.
    Store(anyhow::Error),
}

impl AuthError {
    /// Stable code for audit rows; unlike the wire code, this keeps
    /// `user_not_found` and `invalid_credentials` apart.
    pub fn audit_code(&self) -> &'static str {
        match self {
            Self::UserNotFound => "user_not_found",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountDisabled => "account_disabled",
            Self::Store(_) => "store_error",
        }
    }
}

/// A freshly issued session. `token` is the raw cookie value; it is never
/// persisted and this struct is the only place it ever exists server-side.
#[derive(Debug)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub expires_at: i64,
}

/// The resolved user behind a valid session token.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub expires_at: i64,
}

impl SessionGate {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, session_ttl_secs: i64) -> Self {
        Self {
            db,
            clock,
            session_ttl_secs,
        }
    }

    /// Cookie lifetime in seconds, fixed at construction.
    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_secs
    }

    /// Verify credentials and issue a brand-new session.
    ///
    /// Checks run in a fixed order: user lookup, password verification,
    /// then the active flag — so a disabled account still pays the full
    /// password check and `AccountDisabled` is only ever reported for a
    /// correct password.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<IssuedSession, AuthError> {
        let user = users::get_user_by_username(&self.db, username)
            .await
            .map_err(|e| AuthError::Store(e.into()))?
            .ok_or(AuthError::UserNotFound)?;

        let password_ok =
            utils::verify_password(&user.password_hash, password).map_err(AuthError::Store)?;
        if !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let token = utils::generate_session_token();
        let token_hash = utils::hash_token(&token);
        let now = self.clock.now_secs();
        let expires_at = now + self.session_ttl_secs;

        // The row must be visible before the cookie leaves the server, or
        // the client's very next request would miss its own session.
        sessions::create_session(&self.db, user.id, &token_hash, now, expires_at)
            .await
            .map_err(|e| AuthError::Store(e.into()))?;

        if let Err(e) = users::update_last_login(&self.db, user.id).await {
            warn!("Failed to update last_login for {}: {}", user.username, e);
        }

        debug!("Issued session for {} (expires {})", user.username, expires_at);

        Ok(IssuedSession {
            token,
            user_id: user.id,
            username: user.username,
            role: Role::parse(&user.role),
            expires_at,
        })
    }

    /// Resolve a cookie token to its user.
    ///
    /// Returns `None` for unknown tokens, expired sessions and disabled
    /// users. Store errors also resolve to `None` (fail closed). Expiry is
    /// judged lazily against the clock; the row itself is left in place
    /// for [`sweep_expired`] to reclaim.
    ///
    /// [`sweep_expired`]: SessionGate::sweep_expired
    pub async fn check_request(&self, token: &str) -> Option<AuthedUser> {
        let token_hash = utils::hash_token(token);

        let row = match sessions::get_session_with_user(&self.db, &token_hash).await {
            Ok(row) => row?,
            Err(e) => {
                error!("Session lookup failed, treating request as unauthenticated: {}", e);
                return None;
            }
        };

        if row.expires_at <= self.clock.now_secs() {
            return None;
        }

        if !row.is_active {
            return None;
        }

        Some(AuthedUser {
            user_id: row.user_id,
            username: row.username,
            role: Role::parse(&row.role),
            expires_at: row.expires_at,
        })
    }

    /// Revoke the session behind a cookie token.
    ///
    /// Idempotent and infallible from the caller's point of view: revoking
    /// an unknown or already-revoked token just returns `false`, and store
    /// errors are logged rather than surfaced.
    pub async fn end_session(&self, token: &str) -> bool {
        let token_hash = utils::hash_token(token);

        match sessions::delete_session(&self.db, &token_hash).await {
            Ok(removed) => removed > 0,
            Err(e) => {
                warn!("Session delete failed, nothing revoked: {}", e);
                false
            }
        }
    }

    /// Delete session rows whose expiry has passed. Storage reclaim only;
    /// expiry is already enforced at lookup time.
    pub async fn sweep_expired(&self) -> u64 {
        match sessions::cleanup_expired_sessions(&self.db, self.clock.now_secs()).await {
            Ok(removed) => {
                if removed > 0 {
                    debug!("Removed {} expired sessions", removed);
                }
                removed
            }
            Err(e) => {
                warn!("Expired-session sweep failed: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create::create_tables;
    use crate::database::users::create_user;
    use crate::security::clock::testing::ManualClock;
    use sqlx::sqlite::SqlitePoolOptions;

    const TTL: i64 = 86_400;

    async fn gate_at(start_secs: u64) -> (SessionGate, SqlitePool, Arc<ManualClock>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tables(&pool).await.unwrap();

        let hash = utils::hash_password("secret123").unwrap();
        create_user(&pool, "alice", &hash, "admin").await.unwrap();

        let clock = Arc::new(ManualClock::new(start_secs * 1000));
        let gate = SessionGate::new(pool.clone(), clock.clone(), TTL);
        (gate, pool, clock)
    }

    #[tokio::test]
    async fn correct_credentials_issue_a_session() {
        let (gate, _pool, _) = gate_at(1_000).await;

        let issued = gate.authenticate("alice", "secret123").await.unwrap();
        assert_eq!(issued.username, "alice");
        assert_eq!(issued.role, Role::Admin);
        assert_eq!(issued.token.len(), 64);
        assert_eq!(issued.expires_at, 1_000 + TTL);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let (gate, _pool, _) = gate_at(1_000).await;

        let err = gate.authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unknown_user_is_distinct_at_gate_level() {
        let (gate, _pool, _) = gate_at(1_000).await;

        let err = gate.authenticate("ghost", "whatever").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
        assert_eq!(err.audit_code(), "user_not_found");
    }

    #[tokio::test]
    async fn disabled_account_beats_wrong_password_report() {
        let (gate, pool, _) = gate_at(1_000).await;
        let hash = utils::hash_password("correct-pw").unwrap();
        create_user(&pool, "bob", &hash, "editor").await.unwrap();
        sqlx::query("UPDATE users SET is_active = 0 WHERE username = 'bob'")
            .execute(&pool)
            .await
            .unwrap();

        // Correct password on a disabled account: AccountDisabled.
        let err = gate.authenticate("bob", "correct-pw").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));

        // Wrong password on a disabled account: still InvalidCredentials.
        let err = gate.authenticate("bob", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn issued_token_round_trips_through_check_request() {
        let (gate, _pool, _) = gate_at(1_000).await;

        let issued = gate.authenticate("alice", "secret123").await.unwrap();
        let user = gate.check_request(&issued.token).await.unwrap();

        assert_eq!(user.user_id, issued.user_id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn only_the_hash_reaches_the_database() {
        let (gate, pool, _) = gate_at(1_000).await;

        let issued = gate.authenticate("alice", "secret123").await.unwrap();

        let stored: String = sqlx::query_scalar("SELECT token_hash FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_ne!(stored, issued.token);
        assert_eq!(stored, utils::hash_token(&issued.token));
    }

    #[tokio::test]
    async fn end_session_revokes_and_is_idempotent() {
        let (gate, _pool, _) = gate_at(1_000).await;
        let issued = gate.authenticate("alice", "secret123").await.unwrap();

        assert!(gate.end_session(&issued.token).await);
        assert!(gate.check_request(&issued.token).await.is_none());

        // Second revocation of the same token: quiet no-op.
        assert!(!gate.end_session(&issued.token).await);
    }

    #[tokio::test]
    async fn expired_session_is_refused_but_row_survives() {
        let (gate, pool, clock) = gate_at(1_000).await;
        let issued = gate.authenticate("alice", "secret123").await.unwrap();

        clock.advance(std::time::Duration::from_secs(TTL as u64 + 1));

        assert!(gate.check_request(&issued.token).await.is_none());

        // Lazy expiry: the lookup itself must not delete the row.
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        // A terminal token stays terminal even if time moves backwards.
        clock.set_millis(1_000 * 1000);
        let _ = gate.end_session(&issued.token).await;
        clock.advance(std::time::Duration::from_secs(1));
        assert!(gate.check_request(&issued.token).await.is_none());
    }

    #[tokio::test]
    async fn sweep_reclaims_expired_rows() {
        let (gate, pool, clock) = gate_at(1_000).await;
        gate.authenticate("alice", "secret123").await.unwrap();

        assert_eq!(gate.sweep_expired().await, 0);

        clock.advance(std::time::Duration::from_secs(TTL as u64 + 1));
        assert_eq!(gate.sweep_expired().await, 1);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn reauthentication_issues_a_fresh_token() {
        let (gate, _pool, _) = gate_at(1_000).await;

        let first = gate.authenticate("alice", "secret123").await.unwrap();
        let second = gate.authenticate("alice", "secret123").await.unwrap();

        assert_ne!(first.token, second.token);
        // Both sessions stand on their own.
        assert!(gate.check_request(&first.token).await.is_some());
        assert!(gate.check_request(&second.token).await.is_some());
    }

    #[tokio::test]
    async fn session_dies_when_user_is_disabled() {
        let (gate, pool, _) = gate_at(1_000).await;
        let issued = gate.authenticate("alice", "secret123").await.unwrap();

        sqlx::query("UPDATE users SET is_active = 0 WHERE username = 'alice'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(gate.check_request(&issued.token).await.is_none());
    }

    #[tokio::test]
    async fn garbage_token_is_refused() {
        let (gate, _pool, _) = gate_at(1_000).await;
        assert!(gate.check_request("not-a-real-token").await.is_none());
        assert!(gate.check_request("").await.is_none());
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let (gate, pool, _) = gate_at(1_000).await;
        let issued = gate.authenticate("alice", "secret123").await.unwrap();

        pool.close().await;

        // A broken store must look exactly like "no session".
        assert!(gate.check_request(&issued.token).await.is_none());

        let err = gate.authenticate("alice", "secret123").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));

        // And end_session still does not panic or error out.
        assert!(!gate.end_session(&issued.token).await);
    }
}
