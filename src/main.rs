use canine_canaan::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point: Configuration, Logging, Database, optional blacklist
/// housekeeping, and the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: Invalid configuration");

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "canine_canaan=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let connect_options = config
        .database
        .connect_options()
        .expect("FATAL: Invalid DATABASE_URL.");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check the DB_* settings or DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Blacklist Housekeeping
    // Off by default: revoked-token rows are kept until an operator opts into the sweep.
    if config.token_purge_interval_secs > 0 {
        spawn_revocation_purge(
            repo.clone(),
            Duration::from_secs(config.token_purge_interval_secs),
        );
    }

    // 6. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState { repo, config };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}

/// Periodically deletes blacklist rows whose token has expired anyway.
fn spawn_revocation_purge(repo: RepositoryState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match repo.purge_expired_revocations(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired token revocations"),
                Err(err) => tracing::warn!(error = %err, "Token revocation purge failed"),
            }
        }
    });
}
