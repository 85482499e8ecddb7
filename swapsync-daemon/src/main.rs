//! Swapsync daemon
//!
//! Tails an orderbook contract's event log and keeps the database mirror,
//! floor prices and listed counts in sync through five cooperating workers.

mod config;
mod shutdown;

use alloy_primitives::Address;
use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use swapsync_core::chain::JsonRpcClient;
use swapsync_core::events::{collection_signal_channel, expiry_insert_channel};
use swapsync_core::processors::{
    ExpiryWorker, FloorPriceEngine, FloorSnapshotWorker, ListedCountAggregator, ListingWorker,
    OrderBookIndexer,
};
use swapsync_core::store::RedisStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Swapsync - NFT orderbook synchronization daemon
#[derive(Parser, Debug)]
#[command(name = "swapsync-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./swapsync.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let cfg = config::load(&args.config)?;

    tracing::info!(
        chain = %cfg.chain.name,
        chain_id = cfg.chain.id,
        "starting swapsync-daemon v{}",
        env!("CARGO_PKG_VERSION")
    );

    let contract_address: Address = cfg
        .contract
        .dex_address
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid contract.dex_address: {e}"))?;

    let database_url = config::database_url(&cfg)?;
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    let store = RedisStore::connect(&cfg.redis.url, &cfg.chain.name)
        .await
        .context("failed to connect to redis")?;

    let chain_client = JsonRpcClient::new(cfg.rpc.endpoint());

    // Shutdown fan-out plus the two in-process channels: listing worker ->
    // expiry wheel, floor engine -> count aggregator.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (wheel_tx, wheel_rx) = expiry_insert_channel();
    let (signal_tx, signal_rx) = collection_signal_channel();

    let mut join_handles: Vec<JoinHandle<()>> = Vec::new();

    let indexer = OrderBookIndexer::new(
        pool.clone(),
        store.clone(),
        chain_client,
        cfg.chain.name.clone(),
        cfg.chain.id,
        contract_address,
        cfg.contract.eth_address.clone(),
    );
    join_handles.push(tokio::spawn(indexer.run(shutdown_rx.clone())));

    let listing_worker = ListingWorker::new(
        pool.clone(),
        store.clone(),
        cfg.chain.name.clone(),
        wheel_tx,
    );
    join_handles.push(tokio::spawn(listing_worker.run(shutdown_rx.clone())));

    let expiry_worker = ExpiryWorker::new(pool.clone(), store.clone(), cfg.chain.name.clone());
    join_handles.push(tokio::spawn(
        expiry_worker.run(shutdown_rx.clone(), wheel_rx),
    ));

    let floor_engine = FloorPriceEngine::new(
        pool.clone(),
        store.clone(),
        cfg.chain.name.clone(),
        signal_tx,
    );
    join_handles.push(tokio::spawn(floor_engine.run(shutdown_rx.clone())));

    let aggregator = ListedCountAggregator::new(
        pool.clone(),
        store.clone(),
        cfg.chain.name.clone(),
        cfg.sync.exclude_marketplace_id,
    );
    join_handles.push(tokio::spawn(aggregator.run(shutdown_rx.clone(), signal_rx)));

    let snapshot_worker =
        FloorSnapshotWorker::new(pool.clone(), cfg.chain.name.clone(), cfg.chain.id);
    join_handles.push(tokio::spawn(snapshot_worker.run(shutdown_rx.clone())));

    shutdown::shutdown_signal().await;

    tracing::info!("shutting down workers");
    let _ = shutdown_tx.send(true);
    for handle in join_handles {
        let _ = handle.await;
    }

    pool.close().await;
    tracing::info!("swapsync-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
