use sqlx::SqlitePool;

use super::utils::get_timestamp;

/// A full user row. `role` is stored as free text; convert with
/// `Role::parse` at the call site (unknown values read as editor).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: i64,
    pub last_login: Option<i64>,
}

/// Get a user by username
pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as(
        "SELECT id, username, password_hash, email, role, is_active, created_at, last_login
         FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// Get a user by id
pub async fn get_user_by_id(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as(
        "SELECT id, username, password_hash, email, role, is_active, created_at, last_login
         FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Create a user and return the new row id
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    role: &str,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO users (username, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .bind(get_timestamp())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Count all user rows
pub async fn count_users(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}

/// Update last login timestamp
pub async fn update_last_login(pool: &SqlitePool, user_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(get_timestamp())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
