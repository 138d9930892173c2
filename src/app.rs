//! Application wiring
//!
//! Startup order matters: database (with schema), broker (with stream),
//! then the background loops, then the HTTP server. Shutdown runs in
//! reverse via one cancellation token: the server stops accepting, loops
//! exit at their next head check, connections drop when the process
//! leaves.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_nats::jetstream;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::db::{schema, Database};
use crate::ledger::Ledger;
use crate::messaging::{streams, FraudConsumer, OutboxPublisher};
use crate::metrics::init_metrics;
use crate::web::middleware::CorsPolicy;
use crate::web::state::AppState;

/// Wire everything and serve until a shutdown signal arrives.
pub async fn run(cfg: AppConfig) -> Result<()> {
    if let Some(endpoint) = &cfg.otel_endpoint {
        info!(%endpoint, "OTLP endpoint configured; trace export delegated to collector");
    }

    let db = Database::connect(&cfg.database_url)
        .await
        .context("database connect")?;
    db.health_check().await.context("database ping")?;
    schema::init_schema(db.pool()).await?;

    let client = async_nats::ConnectOptions::new()
        .retry_on_initial_connect()
        .connect(&cfg.nats_url)
        .await
        .context("nats connect")?;
    let js = jetstream::new(client);
    streams::ensure_streams(&js).await?;

    let (registry, metrics) = init_metrics();
    let ledger = Ledger::new(db.pool().clone());
    let shutdown = CancellationToken::new();

    let publisher = OutboxPublisher::new(db.pool().clone(), js.clone(), metrics.clone());
    let publisher_token = shutdown.clone();
    tokio::spawn(async move { publisher.run(publisher_token).await });

    let fraud = FraudConsumer::new(db.pool().clone(), js.clone(), metrics.clone());
    let fraud_token = shutdown.clone();
    tokio::spawn(async move { fraud.run(fraud_token).await });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining");
        signal_token.cancel();
    });

    let state = AppState::new(ledger, cfg.admin_key.clone(), registry, metrics);
    let cors = Arc::new(CorsPolicy::parse(&cfg.cors_allow_origins));
    let router = crate::web::build_router(state, cors);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await.context("bind listener")?;
    info!(%addr, "time-ledger-sim listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("http server")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
