//! The `serve` subcommand: runs the report HTTP endpoint.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use css_reports_lib::{ReportPipeline, ReportsConfig, TokenRefresher, TokenStore};

use crate::server::{router, AppState};

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, overriding CSS_REPORTS_BIND
    #[arg(long)]
    pub bind: Option<String>,

    /// Do not refresh persisted session tokens
    #[arg(long)]
    pub no_refresh: bool,
}

pub async fn run(args: &ServeArgs, config: &ReportsConfig) -> Result<()> {
    let pipeline = Arc::new(ReportPipeline::new(config)?);
    let tokens = Arc::new(TokenStore::new());

    let refresher = match config.refresh_interval {
        Some(interval) if !args.no_refresh => {
            tracing::info!("Refreshing persisted tokens every {}s", interval.as_secs());
            Some(
                TokenRefresher::new(Arc::clone(&pipeline), Arc::clone(&tokens), interval).spawn(),
            )
        }
        _ => None,
    };

    let state = AppState {
        pipeline,
        tokens,
        homepage: Arc::from(config.homepage.as_str()),
    };

    let bind = args.bind.as_deref().unwrap_or(&config.bind);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = refresher {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
