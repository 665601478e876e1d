//! Output module: where yielded products and failures go
//!
//! This module handles:
//! - The sink contract steps yield through
//! - Consumer sinks (memory, channel, JSON lines, SQLite, fan-out)
//! - Crawl statistics

mod sinks;
pub mod stats;
mod traits;

pub use sinks::{ChannelSink, FanoutSink, JsonLinesSink, LogSink, MemorySink, SqliteSink};
pub use stats::{
    load_statistics, print_run_summary, print_statistics, CrawlStatistics, CrawlStats,
    StatsSnapshot,
};
pub use traits::{FailureRecord, ProductSink, Sink, SinkError, SinkResult, Yielded};

use crate::config::OutputConfig;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds the consumer sinks named in the `[output]` section
///
/// With nothing configured, products are only logged.
///
/// # Arguments
///
/// * `config` - The output configuration
/// * `config_hash` - Hash recorded with the run in the database
/// * `cancel` - Token whose state decides how the database run is closed
pub fn build_product_sink(
    config: &OutputConfig,
    config_hash: &str,
    cancel: CancellationToken,
) -> SinkResult<Arc<dyn ProductSink>> {
    let mut sinks: Vec<Arc<dyn ProductSink>> = Vec::new();

    if let Some(path) = &config.jsonl_path {
        tracing::info!("Writing products to {}", path);
        sinks.push(Arc::new(JsonLinesSink::open(Path::new(path))?));
    }
    if let Some(path) = &config.database_path {
        tracing::info!("Storing products in {}", path);
        let sink = SqliteSink::open(Path::new(path), config_hash)?.with_cancellation(cancel);
        sinks.push(Arc::new(sink));
    }

    if sinks.is_empty() {
        return Ok(Arc::new(LogSink));
    }
    if sinks.len() == 1 {
        return Ok(sinks.remove(0));
    }
    Ok(Arc::new(FanoutSink::new(sinks)))
}
