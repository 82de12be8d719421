//! Tallyhouse - vote aggregation and ranking engine

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tallyhouse::{
    aggregation::{AggregationScheduler, StatsReader, VoteCounter},
    config::Args,
    db::schemas::{
        EntryTally, RankEntry, VoteRecord, VoterReceipt, ENTRY_TALLIES, RANK_ENTRIES,
        VOTER_RECEIPTS, VOTE_RECORDS,
    },
    db::MongoClient,
    ledger::{MongoVoteLedger, VoteLedger},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tallyhouse={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Tallyhouse - Vote Aggregation Engine");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("MongoDB: {}", args.mongodb_uri);
    info!(
        "Aggregation: every {} ms, {} votes/page, {} pages/run, enabled={}",
        args.aggregation_interval_ms,
        args.aggregation_batch_size,
        args.aggregation_max_pages,
        args.aggregation_enabled
    );
    info!("======================================");

    // Connect to MongoDB
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    // Typed collections (indexes applied on open)
    let votes = mongo.collection::<VoteRecord>(VOTE_RECORDS).await?;
    let tallies = mongo.collection::<EntryTally>(ENTRY_TALLIES).await?;
    let ranks = mongo.collection::<RankEntry>(RANK_ENTRIES).await?;
    let receipts = mongo.collection::<VoterReceipt>(VOTER_RECEIPTS).await?;

    // Aggregation pipeline: ledger -> transaction -> scheduler
    let ledger: Arc<dyn VoteLedger> = Arc::new(MongoVoteLedger::new(votes.clone()));
    let counter = Arc::new(VoteCounter::new(
        mongo.clone(),
        &votes,
        &tallies,
        &ranks,
        &receipts,
    ));
    let scheduler = Arc::new(AggregationScheduler::new(
        args.scheduler_config(),
        Arc::clone(&ledger),
        counter,
    ));
    Arc::clone(&scheduler).start().await;

    let stats = Arc::new(StatsReader::new(
        ledger,
        ranks.clone(),
        args.stats_sample_size,
    ));

    let state = Arc::new(AppState {
        args,
        mongo,
        scheduler,
        stats,
    });

    server::run(state).await?;

    Ok(())
}
