//! # Ledger-Compose Node
//!
//! Builds the application from `LC_*` environment variables, initializes it
//! from the genesis document and produces blocks on a fixed ticker until
//! interrupted or `LC_MAX_BLOCKS` is reached.
//!
//! ## Exit Status
//!
//! | Code | Meaning |
//! |---|---|
//! | 0 | clean shutdown |
//! | 1 | unclassified failure |
//! | 2 | configuration error |
//! | 3 | genesis error |
//! | 4 | runtime (lifecycle) error |

use std::time::Duration;

use anyhow::{Context, Result};
use app_runtime::{AppConfig, AppError, LocalDriver};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn run() -> Result<()> {
    let config = AppConfig::from_env()
        .map_err(AppError::from)
        .context("Failed to load configuration")?;
    let block_time = Duration::from_millis(config.driver.block_time_ms);
    let max_blocks = config.driver.max_blocks;

    info!("===========================================");
    info!("  Ledger-Compose node");
    info!("  chain id:    {}", config.chain_id);
    info!("  block time:  {:?}", block_time);
    info!("===========================================");

    let mut driver = LocalDriver::start(config).context("Failed to start application")?;
    info!(
        "Genesis applied: {} validator(s), versions {:?}",
        driver.validators().len(),
        driver.app().version_map()
    );

    let mut ticker = tokio::time::interval(block_time);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let commit = driver.produce_block(&[]).context("Block production failed")?;
                info!(
                    "Block {} committed, app_hash={}",
                    commit.height,
                    hex::encode(commit.app_hash)
                );
                if max_blocks.is_some_and(|max| commit.height >= max) {
                    info!("Reached LC_MAX_BLOCKS, stopping");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping at height {}", driver.app().last_height());
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    if let Err(err) = run().await {
        let code = err
            .downcast_ref::<AppError>()
            .map_or(1, |e| e.category().exit_code());
        error!("Fatal: {:#}", err);
        std::process::exit(code);
    }
}
