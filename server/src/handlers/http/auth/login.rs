use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, header};
use tracing::{error, info, warn};

use shared::types::login::{LoginData, LoginError, LoginResponse};

use crate::AppState;
use crate::database::audit::{AuditAction, NewAuditEntry};
use crate::handlers::http::auth::record_audit;
use crate::handlers::http::utils::deliver_page::full;
use crate::handlers::http::utils::headers::{client_ip, create_persistent_cookie, get_user_agent};
use crate::handlers::http::utils::json_response::deliver_serialized_json;
use crate::security::session_gate::{AuthError, IssuedSession, SESSION_COOKIE};

/// How a login attempt failed, plus what the caller may be told about the
/// rate limiter's state.
#[derive(Debug)]
pub(crate) struct LoginFailure {
    pub error: LoginError,
    /// Attempts left in the window; shown on credential failures while the
    /// caller is under the threshold.
    pub remaining: Option<u32>,
}

/// POST /admin/api/login
///
/// Rate limit first, credentials second: a blocked identifier never reaches
/// the password check. A successful login forgives the identifier's earlier
/// failures.
pub async fn handle_login(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing admin login request");

    let (parts, body) = req.into_parts();

    let ip = client_ip(&parts.headers, &parts.extensions);
    let user_agent = get_user_agent(&parts.headers);
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let body = body
        .collect()
        .await
        .context("Failed to read login body")?
        .to_bytes();

    let login_data = if content_type.contains("application/json") {
        parse_login_json(&body)
    } else {
        parse_login_form(&body)
    };
    let login_data = match login_data.and_then(|data| {
        validate_login(&data)?;
        Ok(data)
    }) {
        Ok(data) => data,
        Err(e) => {
            warn!("Login request rejected before auth: {}", e.to_code());
            return deliver_serialized_json(&e.to_response(None), e.status_code());
        }
    };

    match process_login(&state, &login_data, &ip, user_agent).await {
        Ok(issued) => {
            info!(
                "Admin logged in successfully: {} (ID: {})",
                issued.username, issued.user_id
            );

            let ttl_secs = state.gate.session_ttl_secs() as u64;
            let secure = state.config.read().await.auth.secure_cookies;

            // The raw token travels only in this cookie; the body carries
            // session metadata, never the token.
            let session_cookie = create_persistent_cookie(
                SESSION_COOKIE,
                &issued.token,
                Duration::from_secs(ttl_secs),
                secure,
            )
            .context("Failed to create session cookie")?;

            let response_data = LoginResponse::Success {
                user_id: issued.user_id,
                username: issued.username,
                role: issued.role,
                expires_in: ttl_secs,
                message: "Login successful".to_string(),
                redirect: "/admin".to_string(),
            };

            let json = serde_json::to_string(&response_data)
                .context("Failed to serialize login response")?;

            Ok(Response::builder()
                .status(hyper::StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::SET_COOKIE, session_cookie)
                .body(full(Bytes::from(json)))
                .context("Failed to build login response")?)
        }
        Err(failure) => {
            warn!("Login failed for {}: {}", ip, failure.error.to_code());

            let mut builder = Response::builder()
                .status(failure.error.status_code())
                .header(header::CONTENT_TYPE, "application/json");

            if let LoginError::RateLimited { retry_after_secs } = &failure.error {
                builder = builder.header(header::RETRY_AFTER, retry_after_secs.to_string());
            }

            let json = serde_json::to_string(&failure.error.to_response(failure.remaining))
                .context("Failed to serialize login error")?;

            Ok(builder
                .body(full(Bytes::from(json)))
                .context("Failed to build login error response")?)
        }
    }
}

/// The testable core of the login flow: limiter check, then the gate, with
/// an audit row for every outcome.
pub(crate) async fn process_login(
    state: &AppState,
    data: &LoginData,
    ip: &str,
    user_agent: Option<String>,
) -> std::result::Result<IssuedSession, LoginFailure> {
    let (window, max_attempts, block) = {
        let cfg = state.config.read().await;
        (
            cfg.limits.login_window(),
            cfg.limits.login_max_attempts,
            cfg.limits.login_block(),
        )
    };

    let decision = state.limiter.check(ip, window, max_attempts, block).await;

    if !decision.allowed {
        record_audit(
            state,
            NewAuditEntry {
                user_id: None,
                username: data.username.clone(),
                action: AuditAction::Login,
                ip_address: ip.to_string(),
                user_agent,
                success: false,
                details: Some("rate_limited".to_string()),
            },
        )
        .await;

        let retry_after_secs = decision.retry_after_secs(state.clock.now_millis());
        return Err(LoginFailure {
            error: LoginError::RateLimited { retry_after_secs },
            remaining: None,
        });
    }

    match state.gate.authenticate(&data.username, &data.password).await {
        Ok(issued) => {
            // Forgive the identifier's earlier failures.
            state.limiter.reset(ip).await;

            record_audit(
                state,
                NewAuditEntry {
                    user_id: Some(issued.user_id),
                    username: issued.username.clone(),
                    action: AuditAction::Login,
                    ip_address: ip.to_string(),
                    user_agent,
                    success: true,
                    details: None,
                },
            )
            .await;

            Ok(issued)
        }
        Err(auth_error) => {
            record_audit(
                state,
                NewAuditEntry {
                    user_id: None,
                    username: data.username.clone(),
                    action: AuditAction::Login,
                    ip_address: ip.to_string(),
                    user_agent,
                    success: false,
                    details: Some(auth_error.audit_code().to_string()),
                },
            )
            .await;

            // Unknown user and wrong password collapse to one wire error;
            // the audit row above keeps them apart.
            let error = match auth_error {
                AuthError::UserNotFound | AuthError::InvalidCredentials => {
                    LoginError::InvalidCredentials
                }
                AuthError::AccountDisabled => LoginError::AccountDisabled,
                AuthError::Store(e) => {
                    error!("Login failed on a store error: {:#}", e);
                    LoginError::InternalError
                }
            };

            Err(LoginFailure {
                error,
                remaining: Some(decision.remaining),
            })
        }
    }
}

fn parse_login_json(body: &Bytes) -> std::result::Result<LoginData, LoginError> {
    serde_json::from_slice::<LoginData>(body).map_err(|e| {
        error!("Failed to parse login JSON: {}", e);
        LoginError::MissingField("username".to_string())
    })
}

fn parse_login_form(body: &Bytes) -> std::result::Result<LoginData, LoginError> {
    let params = form_urlencoded::parse(body.as_ref())
        .into_owned()
        .collect::<HashMap<String, String>>();

    let username = params
        .get("username")
        .or_else(|| params.get("email"))
        .ok_or(LoginError::MissingField("username".to_string()))?
        .trim()
        .to_string();

    let password = params
        .get("password")
        .ok_or(LoginError::MissingField("password".to_string()))?
        .to_string();

    Ok(LoginData { username, password })
}

fn validate_login(data: &LoginData) -> std::result::Result<(), LoginError> {
    if data.username.trim().is_empty() {
        return Err(LoginError::MissingField("username".to_string()));
    }
    if data.password.is_empty() {
        return Err(LoginError::MissingField("password".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    use shared::config::LiveConfig;
    use shared::types::Role;

    use crate::database::audit::recent_events;
    use crate::database::create::create_tables;
    use crate::database::users::create_user;
    use crate::database::utils::hash_password;
    use crate::security::clock::testing::ManualClock;
    use crate::security::rate_limiter::LoginRateLimiter;
    use crate::security::session_gate::SessionGate;

    const CONFIG: &str = r#"
        [server]
        bind = "127.0.0.1"
        port = 1338

        [paths]
        web_dir = "web"
        database = "test.db"

        [auth]
        session_ttl_hours = 24

        [limits]
        login_window_secs = 60
        login_max_attempts = 5
        login_block_secs = 900
    "#;

    async fn test_state() -> (AppState, Arc<ManualClock>, SqlitePool) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tables(&pool).await.unwrap();

        let hash = hash_password("secret123").unwrap();
        create_user(&pool, "alice", &hash, "admin").await.unwrap();

        let clock = Arc::new(ManualClock::new(1_000_000));
        let gate = SessionGate::new(pool.clone(), clock.clone(), 86_400);
        let limiter = LoginRateLimiter::new(clock.clone());
        let config = LiveConfig::new(toml::from_str(CONFIG).unwrap());

        let state = AppState {
            db: pool.clone(),
            config,
            gate,
            limiter,
            clock: clock.clone(),
        };
        (state, clock, pool)
    }

    fn creds(username: &str, password: &str) -> LoginData {
        LoginData {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn correct_credentials_log_in_and_audit() {
        let (state, _, pool) = test_state().await;

        let issued = process_login(&state, &creds("alice", "secret123"), "1.2.3.4", None)
            .await
            .unwrap();
        assert_eq!(issued.username, "alice");
        assert_eq!(issued.role, Role::Admin);

        // The issued token round-trips through the gate.
        let user = state.gate.check_request(&issued.token).await.unwrap();
        assert_eq!(user.user_id, issued.user_id);

        let events = recent_events(&pool, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
        assert_eq!(events[0].user_id, Some(issued.user_id));
        assert_eq!(events[0].ip_address, "1.2.3.4");
    }

    #[tokio::test]
    async fn wrong_password_decrements_remaining() {
        let (state, _, pool) = test_state().await;

        let failure = process_login(&state, &creds("alice", "wrong"), "1.2.3.4", None)
            .await
            .unwrap_err();
        assert_eq!(failure.error, LoginError::InvalidCredentials);
        assert_eq!(failure.remaining, Some(4));

        let failure = process_login(&state, &creds("alice", "wrong"), "1.2.3.4", None)
            .await
            .unwrap_err();
        assert_eq!(failure.remaining, Some(3));

        // The audit trail keeps the precise failure code.
        let events = recent_events(&pool, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].details.as_deref(), Some("invalid_credentials"));
    }

    #[tokio::test]
    async fn unknown_user_is_indistinguishable_on_the_wire() {
        let (state, _, pool) = test_state().await;

        let failure = process_login(&state, &creds("ghost", "whatever"), "1.2.3.4", None)
            .await
            .unwrap_err();
        assert_eq!(failure.error, LoginError::InvalidCredentials);

        // ...but distinguishable in the audit trail.
        let events = recent_events(&pool, 1).await.unwrap();
        assert_eq!(events[0].details.as_deref(), Some("user_not_found"));
    }

    #[tokio::test]
    async fn disabled_account_reports_account_disabled() {
        let (state, _, pool) = test_state().await;
        let hash = hash_password("correct-pw").unwrap();
        create_user(&pool, "bob", &hash, "editor").await.unwrap();
        sqlx::query("UPDATE users SET is_active = 0 WHERE username = 'bob'")
            .execute(&pool)
            .await
            .unwrap();

        let failure = process_login(&state, &creds("bob", "correct-pw"), "1.2.3.4", None)
            .await
            .unwrap_err();
        assert_eq!(failure.error, LoginError::AccountDisabled);
    }

    #[tokio::test]
    async fn sixth_failure_blocks_the_identifier() {
        let (state, clock, _) = test_state().await;

        for expected_remaining in [4, 3, 2, 1, 0] {
            let failure = process_login(&state, &creds("alice", "wrong"), "1.2.3.4", None)
                .await
                .unwrap_err();
            assert_eq!(failure.error, LoginError::InvalidCredentials);
            assert_eq!(failure.remaining, Some(expected_remaining));
        }

        let failure = process_login(&state, &creds("alice", "wrong"), "1.2.3.4", None)
            .await
            .unwrap_err();
        assert_eq!(
            failure.error,
            LoginError::RateLimited {
                retry_after_secs: 900
            }
        );
        assert_eq!(failure.remaining, None);

        // Correct credentials make no difference while blocked.
        let failure = process_login(&state, &creds("alice", "secret123"), "1.2.3.4", None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, LoginError::RateLimited { .. }));

        // After the block lapses the login goes through again.
        clock.advance(Duration::from_secs(901));
        assert!(
            process_login(&state, &creds("alice", "secret123"), "1.2.3.4", None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn success_forgives_earlier_failures() {
        let (state, _, _) = test_state().await;

        for _ in 0..4 {
            let _ = process_login(&state, &creds("alice", "wrong"), "1.2.3.4", None).await;
        }
        process_login(&state, &creds("alice", "secret123"), "1.2.3.4", None)
            .await
            .unwrap();

        // A fresh window: the next failure reports remaining = 4 again.
        let failure = process_login(&state, &creds("alice", "wrong"), "1.2.3.4", None)
            .await
            .unwrap_err();
        assert_eq!(failure.remaining, Some(4));
    }

    #[tokio::test]
    async fn identifiers_do_not_share_windows() {
        let (state, _, _) = test_state().await;

        for _ in 0..6 {
            let _ = process_login(&state, &creds("alice", "wrong"), "1.1.1.1", None).await;
        }

        // A different IP is unaffected by the first one's block.
        assert!(
            process_login(&state, &creds("alice", "secret123"), "2.2.2.2", None)
                .await
                .is_ok()
        );
    }

    #[test]
    fn form_bodies_parse_with_email_alias() {
        let body = Bytes::from("email=alice%40example.com&password=pw");
        let data = parse_login_form(&body).unwrap();
        assert_eq!(data.username, "alice@example.com");
        assert_eq!(data.password, "pw");

        let body = Bytes::from("username=alice&password=pw");
        assert_eq!(parse_login_form(&body).unwrap().username, "alice");
    }

    #[test]
    fn missing_fields_are_rejected_before_auth() {
        let body = Bytes::from("username=alice");
        assert!(matches!(
            parse_login_form(&body).unwrap_err(),
            LoginError::MissingField(_)
        ));

        assert!(validate_login(&creds("   ", "pw")).is_err());
        assert!(validate_login(&creds("alice", "")).is_err());
        assert!(validate_login(&creds("alice", "pw")).is_ok());
    }

    #[test]
    fn json_bodies_parse() {
        let body = Bytes::from(r#"{"username":"alice","password":"secret123"}"#);
        let data = parse_login_json(&body).unwrap();
        assert_eq!(data.username, "alice");

        let body = Bytes::from("not json");
        assert!(parse_login_json(&body).is_err());
    }
}
