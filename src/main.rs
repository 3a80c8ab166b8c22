use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use digest::cache::FreshnessCache;
use digest::config::Config;
use digest::feed::{Aggregator, HttpFeedReader};

#[derive(Parser, Debug)]
#[command(name = "digest", about = "Serve a publication's RSS feeds as one cached article page")]
struct Args {
    /// Configuration file (missing file means built-in defaults)
    #[arg(long, value_name = "FILE", default_value = "feeds.toml")]
    config: PathBuf,

    /// Listen address, overrides `bind` from the config file
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("digest=info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let bind = args.bind.unwrap_or_else(|| config.bind.clone());

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let reader = HttpFeedReader::new(client).with_timeout(config.request_timeout());

    let aggregator = Aggregator::new(reader, config.feed_sources()?, config.policy()?)
        .with_courtesy_delay(config.courtesy_delay());
    let cache = Arc::new(
        FreshnessCache::new(aggregator)
            .with_ttl(config.cache_ttl())
            .with_refresh_wait(config.refresh_wait()),
    );

    // Never serve the first request against an empty cache
    tracing::info!(feeds = config.feeds.len(), "Warming article cache");
    let articles = cache.get_articles().await;
    if articles.is_empty() {
        tracing::warn!(
            retry_in_secs = config.cache_ttl_secs,
            "Startup aggregation returned no articles, serving empty page until next refresh"
        );
    } else {
        tracing::info!(articles = articles.len(), "Article cache ready");
    }

    let app = digest::web::router(cache);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!(addr = %bind, "Server ready");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
