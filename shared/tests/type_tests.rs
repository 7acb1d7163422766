/// Integration-level tests for the `shared` crate.
///
/// Each section tests one module; unit tests that are tightly coupled to
/// private helpers live inside the modules themselves (see `#[cfg(test)]`
/// blocks in `role.rs` and `config.rs`).
// ---------------------------------------------------------------------------
// Login types
// ---------------------------------------------------------------------------
#[cfg(test)]
mod login_tests {
    use shared::types::*;

    // ── LoginData deserialization ─────────────────────────────────────────────

    #[test]
    fn login_data_deserializes_username() {
        let json = r#"{"username":"bob","password":"pass123"}"#;
        let d: LoginData = serde_json::from_str(json).unwrap();
        assert_eq!(d.username, "bob");
        assert_eq!(d.password, "pass123");
    }

    #[test]
    fn login_data_email_alias_maps_to_username() {
        let json = r#"{"email":"bob@example.com","password":"pass123"}"#;
        let d: LoginData = serde_json::from_str(json).unwrap();
        assert_eq!(d.username, "bob@example.com");
    }

    // ── LoginError ────────────────────────────────────────────────────────────

    #[test]
    fn all_error_variants_have_non_empty_messages() {
        let variants: Vec<Box<dyn Fn() -> LoginError>> = vec![
            Box::new(|| LoginError::InvalidCredentials),
            Box::new(|| LoginError::AccountDisabled),
            Box::new(|| LoginError::MissingField("test".into())),
            Box::new(|| LoginError::RateLimited {
                retry_after_secs: 60,
            }),
            Box::new(|| LoginError::InternalError),
        ];
        for v in variants {
            let e = v();
            assert!(!e.to_code().is_empty());
            assert!(!e.to_message().is_empty());
        }
    }

    #[test]
    fn error_status_codes_match_their_meaning() {
        assert_eq!(LoginError::MissingField("x".into()).status_code(), 400);
        assert_eq!(LoginError::InvalidCredentials.status_code(), 401);
        assert_eq!(LoginError::AccountDisabled.status_code(), 403);
        assert_eq!(
            LoginError::RateLimited {
                retry_after_secs: 1
            }
            .status_code(),
            429
        );
        assert_eq!(LoginError::InternalError.status_code(), 500);
    }

    #[test]
    fn there_is_no_user_not_found_code() {
        // Unknown usernames must be indistinguishable from wrong passwords
        // on the wire.
        let codes = [
            LoginError::MissingField("x".into()).to_code(),
            LoginError::InvalidCredentials.to_code(),
            LoginError::AccountDisabled.to_code(),
            LoginError::RateLimited {
                retry_after_secs: 1,
            }
            .to_code(),
            LoginError::InternalError.to_code(),
        ];
        assert!(!codes.contains(&"USER_NOT_FOUND"));
    }

    #[test]
    fn rate_limited_message_includes_retry_delay() {
        let e = LoginError::RateLimited {
            retry_after_secs: 180,
        };
        assert!(e.to_message().contains("180"));
    }

    #[test]
    fn login_error_response_is_serializable() {
        let r = LoginError::AccountDisabled.to_response(None);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "ACCOUNT_DISABLED");
    }

    #[test]
    fn error_response_omits_remaining_when_absent() {
        let json = serde_json::to_value(LoginError::InternalError.to_response(None)).unwrap();
        assert!(json.get("remaining").is_none());
    }

    #[test]
    fn error_response_carries_remaining_when_present() {
        let json =
            serde_json::to_value(LoginError::InvalidCredentials.to_response(Some(3))).unwrap();
        assert_eq!(json["remaining"], 3);
    }

    #[test]
    fn login_response_success_serializes_all_fields() {
        let r = LoginResponse::Success {
            user_id: 1,
            username: "alice".into(),
            role: Role::Admin,
            expires_in: 86_400,
            message: "ok".into(),
            redirect: "/admin".into(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["role"], "admin");
        assert_eq!(json["expires_in"], 86_400);
        assert_eq!(json["redirect"], "/admin");
    }

    #[test]
    fn login_response_never_contains_a_token_field() {
        // The session token travels only in the Set-Cookie header.
        let r = LoginResponse::Success {
            user_id: 1,
            username: "alice".into(),
            role: Role::Editor,
            expires_in: 3600,
            message: "ok".into(),
            redirect: "/admin".into(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("token").is_none());
    }

    // ── SessionInfo ───────────────────────────────────────────────────────────

    #[test]
    fn session_info_serializes_role_as_snake_case() {
        let s = SessionInfo {
            user_id: 7,
            username: "carol".into(),
            role: Role::SuperAdmin,
            expires_at: 2_000_000_000,
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["role"], "super_admin");
        assert_eq!(json["expires_at"], 2_000_000_000);
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[cfg(test)]
mod role_tests {
    use shared::types::*;

    #[test]
    fn role_serde_round_trip() {
        for role in [Role::SuperAdmin, Role::Admin, Role::Editor] {
            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, role);
        }
    }

    #[test]
    fn parse_matches_as_str() {
        for role in [Role::SuperAdmin, Role::Admin, Role::Editor] {
            assert_eq!(Role::parse(role.as_str()), role);
        }
    }

    #[test]
    fn unknown_role_text_falls_back_to_editor() {
        assert_eq!(Role::parse("owner"), Role::Editor);
        assert_eq!(Role::parse(""), Role::Editor);
    }

    #[test]
    fn privilege_order_is_super_admin_admin_editor() {
        assert!(Role::SuperAdmin.at_least(Role::Admin));
        assert!(Role::Admin.at_least(Role::Editor));
        assert!(!Role::Editor.at_least(Role::Admin));
        assert!(!Role::Admin.at_least(Role::SuperAdmin));
    }
}

// ---------------------------------------------------------------------------
// Cache types
// ---------------------------------------------------------------------------

#[cfg(test)]
mod cache_tests {
    use shared::types::*;

    #[test]
    fn cache_strategy_display_variants_are_non_empty() {
        let strategies = [
            CacheStrategy::Yes,
            CacheStrategy::No,
            CacheStrategy::Explicit,
        ];
        for s in &strategies {
            let out = format!("{}", s);
            assert!(!out.is_empty());
        }
    }

    #[test]
    fn cache_strategy_max_age_mapping() {
        assert_eq!(CacheStrategy::Yes.max_age_secs(), Some(31_536_000));
        assert_eq!(CacheStrategy::Explicit.max_age_secs(), Some(3_600));
        assert_eq!(CacheStrategy::No.max_age_secs(), None);
    }

    #[test]
    fn cache_strategy_clone_and_copy() {
        let a = CacheStrategy::Yes;
        let b = a; // Copy
        let c = a.clone();
        let _ = (b, c); // no move errors
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[cfg(test)]
mod config_tests {
    use shared::types::*;

    fn full_config() -> AppConfig {
        toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0"
            port = 8443
            max_connections = 200

            [paths]
            web_dir = "/srv/web"
            database = "/srv/atelier.db"

            [auth]
            session_ttl_hours = 12
            secure_cookies = true

            [limits]
            login_window_secs = 30
            login_max_attempts = 3
            login_block_secs = 600
            sweep_interval_secs = 120
            "#,
        )
        .unwrap()
    }

    #[test]
    fn full_config_parses_every_section() {
        let cfg = full_config();
        assert_eq!(cfg.server.addr(), "0.0.0.0:8443");
        assert_eq!(cfg.server.max_connections, 200);
        assert_eq!(cfg.paths.database, "/srv/atelier.db");
        assert!(cfg.auth.secure_cookies);
        assert_eq!(cfg.limits.login_max_attempts, 3);
    }

    #[test]
    fn session_ttl_converts_to_seconds() {
        let cfg = full_config();
        assert_eq!(cfg.auth.session_ttl_secs(), 12 * 3600);
    }

    #[test]
    fn limit_durations_convert_from_seconds() {
        use std::time::Duration;
        let cfg = full_config();
        assert_eq!(cfg.limits.login_window(), Duration::from_secs(30));
        assert_eq!(cfg.limits.login_block(), Some(Duration::from_secs(600)));
        assert_eq!(cfg.limits.sweep_interval(), Duration::from_secs(120));
    }

    #[test]
    fn zero_block_secs_means_no_blocking() {
        let mut cfg = full_config();
        cfg.limits.login_block_secs = 0;
        assert_eq!(cfg.limits.login_block(), None);
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1"

            [paths]
            web_dir = "web"

            [auth]
            secure_cookies = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 1338);
        assert_eq!(cfg.server.max_connections, 1000);
        assert_eq!(cfg.paths.database, "atelier.db");
        assert_eq!(cfg.auth.session_ttl_hours, 24);
        assert_eq!(cfg.limits.login_max_attempts, 5);
        assert_eq!(cfg.limits.login_window_secs, 60);
        assert_eq!(cfg.limits.login_block_secs, 900);
    }

    #[test]
    fn limits_defaults_match_default_impl() {
        let d = LimitsConfig::default();
        assert_eq!(d.login_max_attempts, 5);
        assert_eq!(d.login_window_secs, 60);
        assert_eq!(d.login_block_secs, 900);
        assert_eq!(d.sweep_interval_secs, 300);
    }

    #[test]
    fn config_error_display_mentions_reason() {
        let e = ConfigError::InvalidConfig("web_dir cannot be empty".into());
        assert!(format!("{}", e).contains("web_dir"));
    }
}
