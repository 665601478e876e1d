//! Crawl statistics
//!
//! Live counters for a running crawl, and a summary loaded back from the
//! product database for `--stats`.

use crate::storage::{ProductStore, StorageResult};
use crate::FailureKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every session of a run
#[derive(Debug, Default)]
pub struct CrawlStats {
    sessions: AtomicU64,
    steps: AtomicU64,
    listing_pages: AtomicU64,
    detail_pages: AtomicU64,
    fetches: AtomicU64,
    products: AtomicU64,
    retries: AtomicU64,
    duplicate_skus: AtomicU64,
    media_resolutions: AtomicU64,
    failures: [AtomicU64; 6],
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sessions: u64,
    pub steps: u64,
    pub listing_pages: u64,
    pub detail_pages: u64,
    pub fetches: u64,
    pub products: u64,
    pub retries: u64,
    pub duplicate_skus: u64,
    pub media_resolutions: u64,
    pub failures: HashMap<FailureKind, u64>,
}

impl StatsSnapshot {
    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }
}

fn kind_index(kind: FailureKind) -> usize {
    FailureKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default()
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_started(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn listing_page(&self) {
        self.listing_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn detail_page(&self) {
        self.detail_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetched(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn products_emitted(&self, n: u64) {
        self.products.fetch_add(n, Ordering::Relaxed);
    }

    pub fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate_skus(&self, n: u64) {
        self.duplicate_skus.fetch_add(n, Ordering::Relaxed);
    }

    pub fn media_resolutions(&self, n: u64) {
        self.media_resolutions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn failure(&self, kind: FailureKind) {
        self.failures[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let failures = FailureKind::ALL
            .iter()
            .map(|kind| (*kind, self.failures[kind_index(*kind)].load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        StatsSnapshot {
            sessions: self.sessions.load(Ordering::Relaxed),
            steps: self.steps.load(Ordering::Relaxed),
            listing_pages: self.listing_pages.load(Ordering::Relaxed),
            detail_pages: self.detail_pages.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            products: self.products.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            duplicate_skus: self.duplicate_skus.load(Ordering::Relaxed),
            media_resolutions: self.media_resolutions.load(Ordering::Relaxed),
            failures,
        }
    }
}

/// Prints the counters of a finished run
pub fn print_run_summary(stats: &StatsSnapshot) {
    println!("=== Crawl Summary ===\n");
    println!("  Sessions: {}", stats.sessions);
    println!("  Steps: {}", stats.steps);
    println!("  Listing pages: {}", stats.listing_pages);
    println!("  Detail pages: {}", stats.detail_pages);
    println!("  Requests: {}", stats.fetches);
    println!("  Products: {}", stats.products);
    println!("  Retries: {}", stats.retries);
    println!("  Duplicate SKUs dropped: {}", stats.duplicate_skus);
    println!("  Media resolutions: {}", stats.media_resolutions);
    println!();

    if stats.total_failures() > 0 {
        println!("Failures:");
        for kind in FailureKind::ALL {
            let count = stats.failures_of(kind);
            if count > 0 {
                println!("  {}: {}", kind, count);
            }
        }
        println!();
    }
}

/// Statistics loaded from the product database
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub total_products: u64,
    pub products_by_site: HashMap<String, u64>,
    pub failures_by_kind: HashMap<FailureKind, u64>,
    pub latest_run: Option<(i64, String, String)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn ProductStore) -> StorageResult<CrawlStatistics> {
    let latest_run = storage.get_latest_run()?.map(|run| {
        (
            run.id,
            run.started_at,
            run.status.to_db_string().to_string(),
        )
    });

    Ok(CrawlStatistics {
        total_products: storage.count_products()?,
        products_by_site: storage.count_products_by_site()?,
        failures_by_kind: storage.count_failures_by_kind()?,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Catalog Statistics ===\n");

    if let Some((id, started_at, status)) = &stats.latest_run {
        println!("Latest run: #{} started {} ({})", id, started_at, status);
        println!();
    }

    println!("Products: {}", stats.total_products);
    let mut sites: Vec<_> = stats.products_by_site.iter().collect();
    sites.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (site, count) in sites {
        let percentage = if stats.total_products > 0 {
            (*count as f64 / stats.total_products as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", site, count, percentage);
    }
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failure Summary:");
        for kind in FailureKind::ALL {
            if let Some(count) = stats.failures_by_kind.get(&kind) {
                println!("  {}: {}", kind, count);
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    #[test]
    fn test_snapshot_counts_failures_by_kind() {
        let stats = CrawlStats::new();
        stats.session_started();
        stats.products_emitted(3);
        stats.failure(FailureKind::TransientFetch);
        stats.failure(FailureKind::TransientFetch);
        stats.failure(FailureKind::Cancelled);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sessions, 1);
        assert_eq!(snapshot.products, 3);
        assert_eq!(snapshot.failures_of(FailureKind::TransientFetch), 2);
        assert_eq!(snapshot.failures_of(FailureKind::Parse), 0);
        assert_eq!(snapshot.total_failures(), 3);
    }

    #[test]
    fn test_load_statistics_from_empty_store() {
        let store = SqliteStore::new_in_memory().unwrap();
        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.total_products, 0);
        assert!(stats.failures_by_kind.is_empty());
        assert!(stats.latest_run.is_none());
    }
}
