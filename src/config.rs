//! Configuration for Tallyhouse
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::aggregation::{SchedulerConfig, MAX_BATCH_VOTES};

/// Tallyhouse - vote aggregation and ranking engine
#[derive(Parser, Debug, Clone)]
#[command(name = "tallyhouse")]
#[command(about = "Vote aggregation and ranking engine for token-burn voting")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "tallyhouse")]
    pub mongodb_db: String,

    /// Interval between aggregation runs in milliseconds
    #[arg(long, env = "AGGREGATION_INTERVAL_MS", default_value = "30000")]
    pub aggregation_interval_ms: u64,

    /// Votes fetched per ledger page
    #[arg(long, env = "AGGREGATION_BATCH_SIZE", default_value = "100")]
    pub aggregation_batch_size: u32,

    /// Page cap for one interval-driven aggregation run
    #[arg(long, env = "AGGREGATION_MAX_PAGES", default_value = "10")]
    pub aggregation_max_pages: u32,

    /// Whether interval-triggered aggregation is enabled at startup
    #[arg(long, env = "AGGREGATION_ENABLED", default_value = "true")]
    pub aggregation_enabled: bool,

    /// Page size for backlog stats sampling
    #[arg(long, env = "STATS_SAMPLE_SIZE", default_value = "100")]
    pub stats_sample_size: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Scheduler configuration derived from the aggregation knobs
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval_ms: self.aggregation_interval_ms,
            batch_size: self.aggregation_batch_size,
            max_pages_per_run: self.aggregation_max_pages,
            enabled: self.aggregation_enabled,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.aggregation_batch_size == 0 {
            return Err("AGGREGATION_BATCH_SIZE must be at least 1".to_string());
        }

        if self.aggregation_batch_size as usize > MAX_BATCH_VOTES {
            return Err(format!(
                "AGGREGATION_BATCH_SIZE must not exceed {} (transaction batch cap)",
                MAX_BATCH_VOTES
            ));
        }

        if self.aggregation_max_pages == 0 {
            return Err("AGGREGATION_MAX_PAGES must be at least 1".to_string());
        }

        if self.aggregation_interval_ms < 100 {
            return Err("AGGREGATION_INTERVAL_MS must be at least 100".to_string());
        }

        if self.stats_sample_size == 0 {
            return Err("STATS_SAMPLE_SIZE must be at least 1".to_string());
        }

        Ok(())
    }
}
