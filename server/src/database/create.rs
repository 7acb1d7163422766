use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

/// Current schema version.  Bump this whenever the schema changes and add a
/// corresponding migration arm in `run_migrations`.
const SCHEMA_VERSION: u32 = 2;

/// Initialize the database schema and run any pending migrations.
pub async fn create_tables(pool: &SqlitePool) -> sqlx::Result<()> {
    create_schema(pool).await?;
    run_migrations(pool).await?;
    Ok(())
}

/// Create all tables for a brand-new database (version 2 schema).
///
/// Every statement is `IF NOT EXISTS`, so running this against an older
/// database only adds tables that are new in v2; reshaping existing tables
/// is `run_migrations`' job.
async fn create_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    // Users table (v2): `role` replaces the old boolean `is_admin` column.
    // Valid roles are 'super_admin', 'admin' and 'editor'; anything else is
    // treated as 'editor' when the row is read back.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT    NOT NULL UNIQUE,
            password_hash TEXT    NOT NULL,
            email         TEXT,
            role          TEXT    NOT NULL DEFAULT 'editor',
            is_active     INTEGER NOT NULL DEFAULT 1,
            created_at    INTEGER NOT NULL,
            last_login    INTEGER
        )",
    )
    .execute(pool)
    .await?;

    // Sessions table. `token_hash` is the SHA-256 of the cookie token; the
    // raw token is never stored.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    INTEGER NOT NULL,
            token_hash TEXT    NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;

    // Login audit trail. One row per attempt, success or failure; `username`
    // is whatever the client sent, which may not match any account, and
    // `user_id` is filled in only when the attempt resolved to one.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS login_audit (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    INTEGER,
            username   TEXT    NOT NULL,
            action     TEXT    NOT NULL,
            ip_address TEXT    NOT NULL,
            user_agent TEXT,
            success    INTEGER NOT NULL,
            details    TEXT,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    // --- Indexes --------------------------------------------------------
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_username       ON users(username)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_token_hash  ON sessions(token_hash)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user_id     ON sessions(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires_at  ON sessions(expires_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_login_audit_created  ON login_audit(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_login_audit_username ON login_audit(username)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Apply any schema migrations required to reach `SCHEMA_VERSION`.
///
/// Uses `PRAGMA user_version` as the migration counter.
/// Each migration arm is idempotent — safe to run on a DB that was created
/// at any earlier version.
async fn run_migrations(pool: &SqlitePool) -> sqlx::Result<()> {
    let current_version: u32 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    info!(
        "Database schema at version {}; target version {}. Running migrations…",
        current_version, SCHEMA_VERSION
    );

    // ── v1 → v2: replace users.is_admin with role, add is_active/email ───
    //
    // SQLite cannot DROP columns before 3.35.0, so the old `is_admin`
    // column is left in place on migrated databases; we just stop using it.
    if current_version < 2 {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('users')")
                .fetch_all(pool)
                .await?;

        if !columns.iter().any(|name| name == "role") {
            warn!("Migrating users table from v1 to v2 (is_admin → role, add is_active, email)…");

            let mut tx = pool.begin().await?;
            sqlx::query("ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'editor'")
                .execute(&mut *tx)
                .await?;
            sqlx::query("ALTER TABLE users ADD COLUMN is_active INTEGER NOT NULL DEFAULT 1")
                .execute(&mut *tx)
                .await?;
            sqlx::query("ALTER TABLE users ADD COLUMN email TEXT")
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE users SET role = 'admin' WHERE is_admin = 1")
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!("Users table migration complete (is_admin = 1 rows carried over as 'admin').");
        }

        // Lives here rather than in create_schema: a v1 table has no email
        // column until the ALTER above has run.  SQLite unique indexes admit
        // any number of NULLs, so accounts without an email are fine.
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(pool)
            .await?;

        sqlx::query(&format!("PRAGMA user_version = {}", 2))
            .execute(pool)
            .await?;

        info!("Schema version set to 2.");
    }

    // Add future migration arms here:
    // if current_version < 3 { ... }

    Ok(())
}

/// Open or create the database and ensure the schema is up to date.
pub async fn open_database(path: &str) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    create_tables(&pool).await?;
    Ok(pool)
}
