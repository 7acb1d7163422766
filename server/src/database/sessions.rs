use sqlx::SqlitePool;

/// A raw session row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// A session joined with its user, as needed to authenticate a request.
///
/// Expiry and the active flag are returned raw; the caller decides what they
/// mean against its own clock. Lookups never mutate the table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionUser {
    pub session_id: i64,
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub expires_at: i64,
}

/// Create a session row and return its id
pub async fn create_session(
    pool: &SqlitePool,
    user_id: i64,
    token_hash: &str,
    created_at: i64,
    expires_at: i64,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO sessions (user_id, token_hash, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(created_at)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Look up a session by token hash, joined with its user
pub async fn get_session_with_user(
    pool: &SqlitePool,
    token_hash: &str,
) -> sqlx::Result<Option<SessionUser>> {
    sqlx::query_as(
        "SELECT s.id AS session_id, s.user_id, u.username, u.role, u.is_active, s.expires_at
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = ?",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
}

/// Delete a session by token hash (logout). Returns the number of rows
/// removed; 0 means the session was already gone, which is not an error.
pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Delete every session that expired before `now`
pub async fn cleanup_expired_sessions(pool: &SqlitePool, now: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
