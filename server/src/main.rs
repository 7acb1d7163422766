use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use http_body_util::combinators::BoxBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Semaphore;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use shared::config::{LiveConfig, load_config};
use shared::types::{AppConfig, Role};

use server::database::create::open_database;
use server::database::users::{count_users, create_user};
use server::database::utils::hash_password;
use server::handlers::http::routes::build_admin_router;
use server::handlers::http::utils::{deliver_page, json_response};
use server::security::clock::{Clock, SystemClock};
use server::security::rate_limiter::LoginRateLimiter;
use server::security::session_gate::SessionGate;
use server::{AppState, PeerAddr};

#[derive(Parser, Debug)]
#[command(name = "atelier-server", about = "Admin back-office server")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    // Captured once at startup; changing these requires a restart.
    let addr = config.server.addr();
    let max_connections = config.server.max_connections;
    let session_ttl_secs = config.auth.session_ttl_secs() as i64;
    let sweep_interval = config.limits.sweep_interval();

    let db = open_database(&config.paths.database)
        .await
        .with_context(|| format!("Failed to open database at {}", config.paths.database))?;
    info!("Database ready at {}", config.paths.database);

    bootstrap_admin(&db, &config).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gate = SessionGate::new(db.clone(), clock.clone(), session_ttl_secs);
    let limiter = LoginRateLimiter::new(clock.clone());
    limiter.start(sweep_interval).await;

    let config = LiveConfig::new(config);
    let state = AppState {
        db,
        config: config.clone(),
        gate: gate.clone(),
        limiter: limiter.clone(),
        clock,
    };

    // Expired session rows are refused at lookup regardless; this sweep only
    // reclaims their storage.
    let session_sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await; // first tick completes immediately
        loop {
            ticker.tick().await;
            gate.sweep_expired().await;
        }
    });

    spawn_reload_handler(config, args.config.clone());

    let router = Arc::new(build_admin_router());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(
        "Admin server listening on http://{} (max {} connections)",
        addr, max_connections
    );

    // Each accepted connection holds one permit until it closes; at the cap
    // the loop stops accepting and new connections queue in the listener
    // backlog.
    let conn_limit = Arc::new(Semaphore::new(max_connections));

    loop {
        let permit = match conn_limit.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break, // semaphore closed; never happens here
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let io = TokioIo::new(stream);
                let state = state.clone();
                let router = router.clone();

                tokio::task::spawn(async move {
                    let _permit = permit;
                    let service = service_fn(move |mut req| {
                        let state = state.clone();
                        let router = router.clone();
                        async move {
                            req.extensions_mut().insert(PeerAddr(peer));
                            match router.route(req, state).await {
                                Ok(response) => Ok::<_, Infallible>(response),
                                Err(e) => {
                                    error!("Request handling failed: {:#}", e);
                                    Ok(internal_error_response())
                                }
                            }
                        }
                    });

                    if let Err(err) = http1::Builder::new()
                        .timer(TokioTimer::new())
                        .serve_connection(io, service)
                        .await
                    {
                        debug!("Error serving connection: {:?}", err);
                    }
                });
            }
        }
    }

    limiter.stop().await;
    session_sweeper.abort();
    info!("Admin server stopped");

    Ok(())
}

/// Create the first account when the users table is empty, so a fresh
/// deployment is reachable without poking the database by hand.
async fn bootstrap_admin(db: &SqlitePool, config: &AppConfig) -> Result<()> {
    let existing = count_users(db).await.context("Failed to count users")?;
    if existing > 0 {
        return Ok(());
    }

    let Some(username) = config.auth.bootstrap_admin_user.clone() else {
        warn!(
            "Users table is empty and no bootstrap_admin_user is configured; \
             the back office has no account to log into"
        );
        return Ok(());
    };

    let Some(password) = config.auth.resolved_bootstrap_password() else {
        warn!(
            "bootstrap_admin_user is set but no password was found \
             (ADMIN_BOOTSTRAP_PASSWORD or bootstrap_admin_password); skipping bootstrap"
        );
        return Ok(());
    };

    let password_hash = hash_password(&password).context("Failed to hash bootstrap password")?;
    let user_id = create_user(db, &username, &password_hash, Role::SuperAdmin.as_str())
        .await
        .context("Failed to create bootstrap admin")?;

    info!("Bootstrapped super_admin '{}' (id {})", username, user_id);
    Ok(())
}

/// SIGHUP re-reads the config file; a file that fails to load or validate
/// leaves the running config untouched.
fn spawn_reload_handler(config: LiveConfig, config_path: String) {
    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("SIGHUP handler unavailable, hot-reload disabled: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match load_config(&config_path) {
                Ok(new_config) => {
                    config.reload(new_config).await;
                    info!("Configuration reloaded from {}", config_path);
                }
                Err(e) => {
                    warn!("Config reload failed, keeping the old config: {}", e);
                }
            }
        }
    });
}

fn internal_error_response() -> Response<BoxBody<Bytes, Infallible>> {
    json_response::deliver_error_json(
        "INTERNAL_ERROR",
        "An internal error occurred",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .unwrap_or_else(|_| {
        let mut response = Response::new(deliver_page::full(Bytes::from("internal error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
