//! Crawler module: sessions, steps and the transport they share
//!
//! This module contains the core crawling logic, including:
//! - HTTP transport with per-session cookies
//! - The listing walk and its pagination rules
//! - Detail steps with dependent sub-fetches
//! - Overall session coordination

mod coordinator;
mod detail;
mod listing;
mod orchestrator;
mod request;
mod session;
mod site;
mod transport;

pub use coordinator::{Coordinator, RunSummary, SessionEnd, SessionReport};
pub use detail::{process_detail, DetailOutcome};
pub use listing::{walk_listing, ListingOutcome, Termination};
pub use orchestrator::{gather_dependents, initial_vars, render_template, TemplateVars};
pub use request::CrawlRequest;
pub use session::SessionContext;
pub use site::{Site, SiteRegistry};
pub use transport::{
    FetchedResponse, HttpTransport, HttpTransportFactory, RequestSpec, Transport,
    TransportError, TransportFactory,
};

use crate::config::Config;
use crate::output::ProductSink;
use crate::CatalogError;
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Compile every site's routes and rules
/// 2. Start one session per seed URL
/// 3. Walk listings and process detail pages
/// 4. Deliver products and failures to `output`
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `output` - Consumer of product documents
/// * `config_hash` - Hash stamped on every product document
pub async fn crawl(
    config: Config,
    output: Arc<dyn ProductSink>,
    config_hash: &str,
) -> Result<RunSummary, CatalogError> {
    Coordinator::new(config, output)?
        .with_config_hash(config_hash)
        .run()
        .await
}
