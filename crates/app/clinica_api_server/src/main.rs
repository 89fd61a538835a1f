//! Clinica REST API server binary.
//!
//! Configuration comes from the environment (see `ApiConfig::from_env`);
//! a `.env` file is honoured. Command-line flags override the environment.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clinica_api::config::ApiConfig;
use clinica_core::auth::revocation::MemoryRevocationStore;
use clinica_core::store::memory::{MemoryPatientStore, MemoryUserStore};
use clinica_core::store::postgres::{PgPatientStore, PgUserStore};
use clinica_core::store::{PatientStore, UserStore};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How often expired revocation entries are dropped.
const PURGE_INTERVAL: Duration = Duration::from_secs(600);

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "clinica_api_server", about = "Clinica REST API server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL. Overrides `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Keep all data in process memory instead of PostgreSQL.
    #[arg(long, env = "IN_MEMORY", default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clinica_api=debug,clinica_core=debug,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }

    info!(bind_addr = %config.bind_addr, in_memory = args.in_memory, "starting clinica_api_server");

    let (patients, users): (Arc<dyn PatientStore>, Arc<dyn UserStore>) = if args.in_memory {
        warn!("in-memory mode: data is lost on exit");
        (Arc::new(MemoryPatientStore::new()), Arc::new(MemoryUserStore::new()))
    } else {
        info!(max_connections = config.pg_max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        clinica_api::migrate(&pool).await?;

        (
            Arc::new(PgPatientStore::new(pool.clone())),
            Arc::new(PgUserStore::new(pool)),
        )
    };

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        clinica_api::services::users::ensure_admin(&users, email, password).await?;
    } else {
        info!("ADMIN_EMAIL/ADMIN_PASSWORD not set; skipping admin bootstrap");
    }

    let revocations = Arc::new(MemoryRevocationStore::new());
    let state = clinica_api::AppState::new(config.clone(), patients, users, revocations.clone())?;
    let app = clinica_api::router(state);

    let shutdown = CancellationToken::new();

    // Periodically drop revocation entries whose tokens can no longer be used.
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let mut tick = tokio::time::interval(PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        let purged = revocations.purge_expired(chrono::Utc::now());
                        if purged > 0 {
                            info!(purged, "purged expired token revocations");
                        }
                    }
                }
            }
        }
    });

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
            shutdown.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}
