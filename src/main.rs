mod config;
mod dashboard;
mod export;
mod map;
mod market;
mod series;
mod server;

use crate::config::Config;
use crate::market::MarketClient;
use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(api_url = %config.api_url, "starting dashboard");
    let client = MarketClient::new(config.api_url.clone());

    server::start_server(client, config.bind_addr).await
}
