/// Coffee-shop backend.
///
/// Entry point of the ordering service: the menu (categories and
/// positions), users, orders with their lines, and per-user carts with
/// checkout, all behind a REST API.
///
/// # Architecture
///
/// - Repository layer for data access (PostgreSQL)
/// - Service layer for business rules
/// - API layer for HTTP endpoints, with prometheus metrics
/// - In-memory carts staged before checkout
///
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use app_config::AppConfig;
use cart::CartStore;
use repository::postgres::{
    PgCategoriesRepository, PgOrdersRepository, PgPositionsRepository, PgUsersRepository,
};
use server::Server;
use service::Services;

/// Logs go to stdout; `RUST_LOG` overrides the default `info` level.
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    info!("Coffee shop backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db_pool = db::init_db_pool(&config)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized successfully");

    let services = Services::new(
        Arc::new(PgCategoriesRepository::new(db_pool.clone())),
        Arc::new(PgPositionsRepository::new(db_pool.clone())),
        Arc::new(PgUsersRepository::new(db_pool.clone())),
        Arc::new(PgOrdersRepository::new(db_pool.clone())),
        CartStore::new(),
    );

    let http_server = Server::new(config.http_port, services)?;

    let shutdown = Arc::new(Notify::new());
    let mut tasks = JoinSet::new();

    let server_shutdown = shutdown.clone();
    tasks.spawn(async move {
        http_server
            .start(async move { server_shutdown.notified().await })
            .await
    });

    tokio::select! {
        _ = server::shutdown_signal() => {
            shutdown.notify_one();
        }
        Some(res) = tasks.join_next() => {
            match res {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(err)) => error!("HTTP server error: {:#}", err),
                Err(err) => error!("Task error: {}", err),
            }
            db_pool.close();
            return Err(anyhow::anyhow!("HTTP server exited unexpectedly"));
        }
    }

    let drain = async {
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("HTTP server error: {:#}", err),
                Err(err) => error!("Task error: {}", err),
            }
        }
    };
    if tokio::time::timeout(config.shutdown_timeout, drain).await.is_err() {
        warn!(
            "Shutdown did not finish within {:?}, aborting remaining tasks",
            config.shutdown_timeout
        );
        tasks.abort_all();
    }

    db_pool.close();
    info!("Application stopped");
    Ok(())
}
