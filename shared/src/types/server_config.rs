use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory the login and admin pages are served from.
    pub web_dir: String,
    #[serde(default = "default_database")]
    pub database: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Session cookie + persisted session lifetime.
    ///
    /// **Hot-reload safe:** NO — the server reads this once at startup and
    /// bakes it into the session gate. Changing it via SIGHUP requires a
    /// restart; already-issued sessions keep the expiry they were created
    /// with either way.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: u64,

    /// Set the `Secure` attribute on the session cookie. Turn this on for
    /// any deployment reachable over HTTPS; leave off for local plain-HTTP
    /// development.
    #[serde(default)]
    pub secure_cookies: bool,

    /// Username for the account created automatically when the users table
    /// is empty at startup. Leave unset to skip bootstrapping.
    #[serde(default)]
    pub bootstrap_admin_user: Option<String>,

    /// Password for the bootstrap account.
    ///
    /// Prefer supplying this via the `ADMIN_BOOTSTRAP_PASSWORD` environment
    /// variable. This config field is the fallback for deployments that
    /// cannot inject env vars at runtime (e.g. certain container setups).
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Fixed window over which failed logins are counted.
    #[serde(default = "default_login_window_secs")]
    pub login_window_secs: u64,

    /// Failed attempts allowed per window before the identifier is blocked.
    #[serde(default = "default_login_max_attempts")]
    pub login_max_attempts: u32,

    /// Block duration once the threshold is exceeded. `0` disables blocking
    /// (attempts are then only denied until the window rolls over).
    #[serde(default = "default_login_block_secs")]
    pub login_block_secs: u64,

    /// Cadence of the background sweeps (limiter table eviction and expired
    /// session row cleanup).
    ///
    /// **Hot-reload safe:** NO — the sweep tasks are spawned once at
    /// startup with this interval.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address for the admin server, e.g. `"127.0.0.1:1338"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl AuthConfig {
    /// Session TTL converted to seconds — convenience for cookie `Max-Age`
    /// and expiry arithmetic.
    pub fn session_ttl_secs(&self) -> u64 {
        self.session_ttl_hours * 3600
    }

    /// Resolve the bootstrap password with `ADMIN_BOOTSTRAP_PASSWORD`
    /// taking priority over the config file field.
    ///
    /// Returns `None` when neither source is set (startup then skips the
    /// bootstrap step with a warning).
    pub fn resolved_bootstrap_password(&self) -> Option<String> {
        std::env::var("ADMIN_BOOTSTRAP_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.bootstrap_admin_password.clone())
            .filter(|s| !s.is_empty())
    }
}

impl LimitsConfig {
    pub fn login_window(&self) -> Duration {
        Duration::from_secs(self.login_window_secs)
    }

    /// `None` when blocking is disabled via `login_block_secs = 0`.
    pub fn login_block(&self) -> Option<Duration> {
        if self.login_block_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.login_block_secs))
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            login_window_secs: default_login_window_secs(),
            login_max_attempts: default_login_max_attempts(),
            login_block_secs: default_login_block_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_port() -> u16 {
    1338
}

pub fn default_max_connections() -> usize {
    1000
}

pub fn default_database() -> String {
    "atelier.db".to_string()
}

pub fn default_session_ttl() -> u64 {
    24
}

pub fn default_login_window_secs() -> u64 {
    60
}

pub fn default_login_max_attempts() -> u32 {
    5
}

pub fn default_login_block_secs() -> u64 {
    900
}

pub fn default_sweep_interval_secs() -> u64 {
    300
}
