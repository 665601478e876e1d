//! Catalog-Ripple main entry point
//!
//! This is the command-line interface for the Catalog-Ripple catalog crawler.

use anyhow::{bail, Context};
use catalog_ripple::config::{load_config_with_hash, Config};
use catalog_ripple::crawler::Coordinator;
use catalog_ripple::output::{build_product_sink, print_run_summary};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Ripple: a catalog crawler for e-commerce sites
///
/// Catalog-Ripple walks product listings, visits each product page, gathers
/// the dependent requests a page needs and emits one canonical product
/// document per product.
#[derive(Parser, Debug)]
#[command(name = "catalog-ripple")]
#[command(version)]
#[command(about = "A catalog crawler for e-commerce sites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Only crawl the named site (may be repeated)
    #[arg(long, value_name = "NAME")]
    site: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if !cli.site.is_empty() {
        select_sites(&mut config, &cli.site)?;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_ripple=info,warn"),
            1 => EnvFilter::new("catalog_ripple=debug,info"),
            2 => EnvFilter::new("catalog_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Keeps only the sites named on the command line
fn select_sites(config: &mut Config, names: &[String]) -> anyhow::Result<()> {
    for name in names {
        if config.site(name).is_none() {
            bail!("no site named '{}' in configuration", name);
        }
    }
    config.sites.retain(|site| names.contains(&site.name));
    Ok(())
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Ripple Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent sessions: {}",
        config.crawler.max_concurrent_sessions
    );
    println!(
        "  Max concurrent sub-fetches: {}",
        config.crawler.max_concurrent_subfetches
    );
    match config.crawler.max_pages_per_session {
        Some(max) => println!("  Max pages per session: {}", max),
        None => println!("  Max pages per session: unlimited"),
    }
    match config.crawler.max_records_per_session {
        Some(max) => println!("  Max records per session: {}", max),
        None => println!("  Max records per session: unlimited"),
    }
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    println!(
        "  Transient retries: {} ({}ms apart)",
        config.crawler.transient_retries, config.crawler.retry_delay_ms
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!(
        "  JSON lines: {}",
        config.output.jsonl_path.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Database: {}",
        config.output.database_path.as_deref().unwrap_or("(none)")
    );

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!(
            "  - {} [{}] ({} seeds, {} routes, {} dependent fetches, {:?} pagination)",
            site.name,
            site.hosts.join(", "),
            site.seeds.len(),
            site.routes.len(),
            site.dependents.len(),
            site.pagination.style
        );
        for seed in &site.seeds {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start {} sessions", config.seeds().len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use catalog_ripple::output::{load_statistics, print_statistics};
    use catalog_ripple::storage::SqliteStore;
    use std::path::Path;

    let Some(path) = config.output.database_path.as_deref() else {
        bail!("--stats needs output.database-path in the configuration");
    };

    println!("Database: {}\n", path);

    let storage = SqliteStore::new(Path::new(path))
        .with_context(|| format!("failed to open database {}", path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    tracing::info!(
        "Sites: {}, seed URLs: {}",
        config.sites.len(),
        config.seeds().len()
    );

    let cancel = CancellationToken::new();
    let output = build_product_sink(&config.output, &config_hash, cancel.clone())
        .context("failed to open output")?;
    let coordinator = Coordinator::new(config, output)?
        .with_config_hash(config_hash)
        .with_cancellation(cancel.clone());

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling sessions");
            signal_token.cancel();
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            print_run_summary(&summary.stats);
            if cancel.is_cancelled() {
                tracing::warn!("Crawl cancelled");
            } else {
                tracing::info!("Crawl completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
