pub mod cache;
pub mod json_error;
pub mod login;
pub mod role;
pub mod server_config;

pub use self::cache::CacheStrategy;
pub use self::json_error::ErrorResponse;
pub use self::login::{LoginData, LoginError, LoginResponse, SessionInfo};
pub use self::role::Role;
pub use self::server_config::{
    AppConfig, AuthConfig, ConfigError, LimitsConfig, PathsConfig, ServerConfig,
};
