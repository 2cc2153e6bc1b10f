use std::sync::Arc;

use anyhow::Context;
use charge_priority::{router, DispatchConfig, Dispatcher, HttpOracle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = DispatchConfig::from_env().context("failed to load configuration")?;
    let oracle = HttpOracle::new(&cfg.oracle_url)?;
    tracing::info!(
        "oracle endpoint {} (timeout {}ms, retries {})",
        oracle.uri(),
        cfg.oracle_timeout_ms,
        cfg.max_retries
    );

    let dispatcher = Dispatcher::new(Arc::new(oracle), cfg.oracle_timeout()).with_retry(cfg.retry_policy());
    let app = router(dispatcher);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
