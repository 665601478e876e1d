//! Crawler coordinator - session and step orchestration
//!
//! This module contains the crawl loop. It:
//! - Starts one session per seed URL, several sessions at a time
//! - Runs each session's frontier one step at a time
//! - Dispatches each response to the listing or detail step by URL class
//! - Applies the retry policy to transient failures
//! - Reports every terminal failure to the consumer

use crate::config::Config;
use crate::crawler::detail::process_detail;
use crate::crawler::listing::walk_listing;
use crate::crawler::request::CrawlRequest;
use crate::crawler::session::SessionContext;
use crate::crawler::site::{Site, SiteRegistry};
use crate::crawler::transport::{HttpTransportFactory, TransportFactory};
use crate::output::{
    CrawlStats, FailureRecord, ProductSink, Sink, SinkResult, StatsSnapshot, Yielded,
};
use crate::state::Cursor;
use crate::url::CrawlUrlClass;
use crate::{CatalogError, FailureKind, StepError, StepResult, UrlError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The frontier ran empty
    Exhausted,
    Cancelled,
    /// The consumer rejected a value; the session was aborted
    SinkFailed,
    /// No transport could be opened for the session
    TransportUnavailable,
}

/// Outcome of one session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub site: String,
    pub seed: String,
    pub steps: u64,
    pub products: u64,
    pub failures: Vec<FailureKind>,
    pub end: SessionEnd,
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub sessions: Vec<SessionReport>,
    pub stats: StatsSnapshot,
}

/// Collects one step's yielded values
///
/// Requests are held back until the step has finished so a failed step
/// never leaves half its follow-ups in the frontier. Products go straight
/// to the consumer.
struct StepSink<'a> {
    pending: Vec<CrawlRequest>,
    products: u64,
    output: &'a dyn ProductSink,
    stats: &'a CrawlStats,
}

impl<'a> StepSink<'a> {
    fn new(output: &'a dyn ProductSink, stats: &'a CrawlStats) -> Self {
        Self {
            pending: Vec::new(),
            products: 0,
            output,
            stats,
        }
    }
}

#[async_trait]
impl Sink for StepSink<'_> {
    async fn emit(&mut self, value: Yielded) -> SinkResult<()> {
        match value {
            Yielded::Request(request) => self.pending.push(request),
            Yielded::Product(doc) => {
                self.output.put_product(&doc).await?;
                self.products += 1;
                self.stats.products_emitted(1);
            }
        }
        Ok(())
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    registry: Arc<SiteRegistry>,
    output: Arc<dyn ProductSink>,
    transports: Arc<dyn TransportFactory>,
    config_hash: Arc<str>,
    cancel: CancellationToken,
    stats: Arc<CrawlStats>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `output` - Consumer of product documents and failures
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CatalogError)` - A site's rules failed to compile
    pub fn new(config: Config, output: Arc<dyn ProductSink>) -> Result<Self, CatalogError> {
        let registry = SiteRegistry::from_config(&config)?;
        let transports = HttpTransportFactory::new(
            config.user_agent.clone(),
            config.crawler.request_timeout_secs,
        );

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            output,
            transports: Arc::new(transports),
            config_hash: Arc::from(""),
            cancel: CancellationToken::new(),
            stats: Arc::new(CrawlStats::new()),
        })
    }

    /// Replaces the HTTP transport
    pub fn with_transport_factory(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = transports;
        self
    }

    /// Replaces the site registry (e.g. to plug in custom extractors)
    pub fn with_registry(mut self, registry: SiteRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Hash stamped on every product document
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Arc::from(hash.into());
        self
    }

    /// Shares an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels every session of this coordinator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    /// Runs one session per configured seed until all frontiers are empty
    pub async fn run(&self) -> Result<RunSummary, CatalogError> {
        let sessions: Vec<(Arc<Site>, String)> = self
            .registry
            .iter()
            .flat_map(|site| {
                site.config
                    .seeds
                    .iter()
                    .map(move |seed| (Arc::clone(site), seed.clone()))
            })
            .collect();

        let start_time = Instant::now();
        tracing::info!(
            "Starting {} sessions across {} sites ({} at a time)",
            sessions.len(),
            self.registry.len(),
            self.config.crawler.max_concurrent_sessions
        );

        let reports: Vec<SessionReport> = stream::iter(sessions)
            .map(|(site, seed)| self.run_session(site, seed))
            .buffer_unordered(self.config.crawler.max_concurrent_sessions.max(1))
            .collect()
            .await;

        self.output.finish().await?;

        let stats = self.stats.snapshot();
        tracing::info!(
            "Crawl finished: {} products, {} failures in {:?}",
            stats.products,
            stats.total_failures(),
            start_time.elapsed()
        );

        Ok(RunSummary {
            sessions: reports,
            stats,
        })
    }

    /// Runs a single session starting at `url`
    pub async fn run_url(&self, url: &str) -> Result<SessionReport, CatalogError> {
        let site = self
            .registry
            .site_for_url(url)
            .ok_or_else(|| UrlError::Malformed(format!("no configured site claims {}", url)))?;
        Ok(self.run_session(site, url.to_string()).await)
    }

    async fn run_session(&self, site: Arc<Site>, seed: String) -> SessionReport {
        let session_id: Arc<str> = Arc::from(Uuid::new_v4().to_string());
        self.stats.session_started();

        let mut report = SessionReport {
            session_id: session_id.to_string(),
            site: site.name().to_string(),
            seed: seed.clone(),
            steps: 0,
            products: 0,
            failures: Vec::new(),
            end: SessionEnd::Exhausted,
        };

        tracing::info!("Session {} ({}) starting at {}", session_id, site.name(), seed);

        let transport = match self.transports.open(&site.config) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::error!("Session {} has no transport: {}", session_id, e);
                let err = StepError::transient(&seed, None, e);
                self.report_failure(site.name(), &session_id, &seed, &err, &mut report)
                    .await;
                report.end = SessionEnd::TransportUnavailable;
                return report;
            }
        };

        let ctx = SessionContext {
            id: Arc::clone(&session_id),
            site: Arc::clone(&site),
            transport,
            cancel: self.cancel.child_token(),
            config_hash: Arc::clone(&self.config_hash),
            max_subfetches: self.config.crawler.max_concurrent_subfetches,
            max_pages: self.config.crawler.max_pages_per_session,
            max_records: self.config.crawler.max_records_per_session,
            stats: Arc::clone(&self.stats),
        };

        let retry_delay = Duration::from_millis(self.config.crawler.retry_delay_ms);
        let mut frontier: VecDeque<CrawlRequest> = VecDeque::new();
        frontier.push_back(CrawlRequest::seed(seed, Cursor::new(Arc::clone(&session_id))));

        while let Some(request) = frontier.pop_front() {
            if ctx.is_cancelled() {
                tracing::info!("Session {} cancelled", session_id);
                report.end = SessionEnd::Cancelled;
                break;
            }

            if request.attempt > 0 && !retry_delay.is_zero() {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => {
                        report.end = SessionEnd::Cancelled;
                        break;
                    }
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }

            let mut sink = StepSink::new(self.output.as_ref(), &self.stats);
            let result = self.run_step(&ctx, &request, &mut sink).await;
            report.steps += 1;
            self.stats.step();
            report.products += sink.products;

            match result {
                Ok(dropped) => {
                    frontier.extend(sink.pending);
                    for err in &dropped {
                        self.report_failure(
                            site.name(),
                            &session_id,
                            request.url(),
                            err,
                            &mut report,
                        )
                        .await;
                    }
                }
                Err(err) => match err.kind() {
                    FailureKind::TransientFetch => {
                        ctx.transport.reset_session();
                        if err.is_retriable()
                            && request.attempt < self.config.crawler.transient_retries
                        {
                            tracing::warn!(
                                "Retrying {} (attempt {}/{}): {}",
                                request.url(),
                                request.attempt + 1,
                                self.config.crawler.transient_retries,
                                err
                            );
                            self.stats.retried();
                            frontier.push_back(request.retry());
                            continue;
                        }
                        self.report_failure(
                            site.name(),
                            &session_id,
                            request.url(),
                            &err,
                            &mut report,
                        )
                        .await;
                    }
                    FailureKind::Cancelled => {
                        self.report_failure(
                            site.name(),
                            &session_id,
                            request.url(),
                            &err,
                            &mut report,
                        )
                        .await;
                        report.end = SessionEnd::Cancelled;
                        break;
                    }
                    FailureKind::Sink => {
                        tracing::error!("Aborting session {}: {}", session_id, err);
                        self.report_failure(
                            site.name(),
                            &session_id,
                            request.url(),
                            &err,
                            &mut report,
                        )
                        .await;
                        report.end = SessionEnd::SinkFailed;
                        break;
                    }
                    _ => {
                        self.report_failure(
                            site.name(),
                            &session_id,
                            request.url(),
                            &err,
                            &mut report,
                        )
                        .await;
                    }
                },
            }

            if report.steps % 10 == 0 {
                tracing::info!(
                    "Session {}: {} steps, {} products, {} queued",
                    session_id,
                    report.steps,
                    report.products,
                    frontier.len()
                );
            }
        }

        tracing::info!(
            "Session {} finished ({:?}): {} steps, {} products, {} failures",
            session_id,
            report.end,
            report.steps,
            report.products,
            report.failures.len()
        );
        report
    }

    /// Fetches one request and dispatches the response by URL class
    ///
    /// # Returns
    ///
    /// * `Ok(dropped)` - The step succeeded; `dropped` lists products that
    ///   could not be normalized
    /// * `Err(StepError)` - The step failed as a whole
    async fn run_step(
        &self,
        ctx: &SessionContext,
        request: &CrawlRequest,
        sink: &mut StepSink<'_>,
    ) -> StepResult<Vec<StepError>> {
        let router = &ctx.site.router;

        let requested = router.classify(request.url());
        if matches!(requested, CrawlUrlClass::Unsupported) {
            return Err(StepError::unsupported(request.url(), "no route matches"));
        }

        let response = ctx.fetch(&request.spec).await?;
        ctx.check_genuine(&response, None)?;

        match router.classify(&response.url) {
            // The detail request's cursor is already shared with the parent
            // page's next-page request; walking here would reuse its ordinals.
            CrawlUrlClass::Listing if request.ordinal.is_some() => Err(StepError::unsupported(
                &response.url,
                "detail request redirected to a listing",
            )),
            CrawlUrlClass::Listing => {
                self.stats.listing_page();
                let outcome = walk_listing(ctx, request, &response, sink).await?;
                tracing::debug!(
                    "Listing {} yielded {} items (next ordinal {})",
                    response.url,
                    outcome.emitted,
                    outcome.cursor.next_ordinal()
                );
                if let Some(termination) = outcome.termination {
                    tracing::info!(
                        "Listing walk of session {} ends at {}: {}",
                        ctx.id,
                        response.url,
                        termination
                    );
                }
                Ok(Vec::new())
            }
            CrawlUrlClass::Detail => {
                self.stats.detail_page();
                let outcome = process_detail(ctx, request, &response, sink).await?;
                self.stats.duplicate_skus(outcome.duplicate_skus as u64);
                self.stats.media_resolutions(outcome.media_resolutions as u64);
                Ok(outcome.failures)
            }
            CrawlUrlClass::SubResource => Err(StepError::unsupported(
                &response.url,
                "sub-resources are only fetched by detail steps",
            )),
            CrawlUrlClass::Unsupported => {
                Err(StepError::unsupported(&response.url, "no route matches"))
            }
        }
    }

    async fn report_failure(
        &self,
        site: &str,
        session_id: &str,
        step_url: &str,
        err: &StepError,
        report: &mut SessionReport,
    ) {
        tracing::warn!("{} failure: {}", err.kind(), err);
        self.stats.failure(err.kind());
        report.failures.push(err.kind());

        let record =
            FailureRecord::from_step_error(site, session_id, err).with_step_url(step_url);
        if let Err(e) = self.output.record_failure(&record).await {
            tracing::error!("Failed to record failure for {}: {}", err.url(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, SiteConfig};
    use crate::crawler::transport::{FetchedResponse, RequestSpec, Transport, TransportError};
    use crate::output::{ChannelSink, FanoutSink, MemorySink};
    use reqwest::header::HeaderMap;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const CONFIG: &str = r#"
[crawler]
transient-retries = 1
retry-delay-ms = 0

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[[site]]
name = "shop"
hosts = ["shop.example"]
seeds = ["https://shop.example/c/coats"]
currency = "USD"
price-unit = "minor"
block-markers = ["Access Denied"]

[[site.route]]
class = "listing"
path = "^/c/"

[[site.route]]
class = "detail"
path = "^/p/"

[site.pagination]
style = "link"

[site.listing]
links = "/items"
link-field = "/href"
next-link = "/next"

[site.detail]
id = "/id"
title = "/name"

[site.detail.price]
current = "/price"
"#;

    /// Serves canned bodies by URL and counts fetches
    struct CannedTransport {
        pages: HashMap<String, (u16, String)>,
        /// Request URL to final URL, as if the server redirected
        redirects: HashMap<String, String>,
        fetches: Mutex<Vec<String>>,
        resets: AtomicUsize,
    }

    impl CannedTransport {
        fn new(pages: &[(&str, u16, &str)]) -> Arc<Self> {
            Self::redirecting(pages, &[])
        }

        fn redirecting(pages: &[(&str, u16, &str)], redirects: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, status, body)| (url.to_string(), (*status, body.to_string())))
                    .collect(),
                redirects: redirects
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect(),
                fetches: Mutex::new(Vec::new()),
                resets: AtomicUsize::new(0),
            })
        }

        fn fetched(&self) -> Vec<String> {
            self.fetches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn fetch(&self, request: &RequestSpec) -> Result<FetchedResponse, TransportError> {
            self.fetches.lock().unwrap().push(request.url.clone());
            let url = self
                .redirects
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| request.url.clone());
            let (status, body) = self
                .pages
                .get(&url)
                .cloned()
                .ok_or_else(|| TransportError::Network("connection refused".to_string()))?;
            Ok(FetchedResponse {
                url,
                status,
                headers: HeaderMap::new(),
                body,
                request_headers: HeaderMap::new(),
            })
        }

        fn reset_session(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CannedFactory(Arc<CannedTransport>);

    impl TransportFactory for CannedFactory {
        fn open(&self, _site: &SiteConfig) -> Result<Arc<dyn Transport>, TransportError> {
            let transport: Arc<dyn Transport> = self.0.clone();
            Ok(transport)
        }
    }

    fn coordinator(transport: Arc<CannedTransport>, sink: Arc<dyn ProductSink>) -> Coordinator {
        Coordinator::new(parse_config(CONFIG).unwrap(), sink)
            .unwrap()
            .with_transport_factory(Arc::new(CannedFactory(transport)))
            .with_config_hash("cafe")
    }

    #[tokio::test]
    async fn test_listing_to_products_with_ordinals() {
        let transport = CannedTransport::new(&[
            (
                "https://shop.example/c/coats",
                200,
                r#"{"items":[{"href":"/p/1"},{"href":"/p/2"},{"href":"/p/1"}],"next":"/c/coats?page=2"}"#,
            ),
            (
                "https://shop.example/c/coats?page=2",
                200,
                r#"{"items":[{"href":"/p/2"},{"href":"/p/3"}]}"#,
            ),
            ("https://shop.example/p/1", 200, r#"{"id":"1","name":"Parka","price":"7999"}"#),
            ("https://shop.example/p/2", 200, r#"{"id":"2","name":"Vest","price":"4999"}"#),
            ("https://shop.example/p/3", 200, r#"{"id":"3","name":"Hat","price":"1999"}"#),
        ]);
        let sink = Arc::new(MemorySink::new());
        let summary = coordinator(transport.clone(), sink.clone()).run().await.unwrap();

        let mut ordinals: Vec<(String, Option<u64>)> = sink
            .products()
            .iter()
            .map(|doc| (doc.product.title.clone(), doc.ordinal))
            .collect();
        ordinals.sort_by_key(|(_, ordinal)| *ordinal);
        assert_eq!(
            ordinals,
            vec![
                ("Parka".to_string(), Some(0)),
                ("Vest".to_string(), Some(1)),
                ("Hat".to_string(), Some(2)),
            ]
        );

        assert!(sink.products().iter().all(|doc| doc.config_hash == "cafe"));
        assert_eq!(summary.sessions.len(), 1);
        assert_eq!(summary.sessions[0].end, SessionEnd::Exhausted);
        assert_eq!(summary.stats.listing_pages, 2);
        assert_eq!(
            transport
                .fetched()
                .iter()
                .filter(|u| u.ends_with("/p/2"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_block_page_retries_then_fails() {
        let transport = CannedTransport::new(&[
            (
                "https://shop.example/c/coats",
                200,
                r#"{"items":[{"href":"/p/1"}]}"#,
            ),
            ("https://shop.example/p/1", 200, "<h1>Access Denied</h1>"),
        ]);
        let sink = Arc::new(MemorySink::new());
        let summary = coordinator(transport.clone(), sink.clone()).run().await.unwrap();

        assert!(sink.products().is_empty());
        assert_eq!(summary.stats.retries, 1);
        assert_eq!(transport.resets.load(Ordering::SeqCst), 2);
        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::TransientFetch);
        assert_eq!(failures[0].url, "https://shop.example/p/1");
    }

    #[tokio::test]
    async fn test_unsupported_url_is_not_fetched() {
        let transport = CannedTransport::new(&[]);
        let sink = Arc::new(MemorySink::new());
        let report = coordinator(transport.clone(), sink.clone())
            .run_url("https://shop.example/about")
            .await
            .unwrap();

        assert!(transport.fetched().is_empty());
        assert_eq!(report.failures, vec![FailureKind::Unsupported]);
    }

    #[tokio::test]
    async fn test_parse_failure_is_reported_not_retried() {
        let transport = CannedTransport::new(&[(
            "https://shop.example/p/9",
            200,
            r#"{"id":"9"}"#,
        )]);
        let sink = Arc::new(MemorySink::new());
        let report = coordinator(transport.clone(), sink.clone())
            .run_url("https://shop.example/p/9")
            .await
            .unwrap();

        assert_eq!(report.failures, vec![FailureKind::Parse]);
        assert_eq!(transport.fetched().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let transport = CannedTransport::new(&[(
            "https://shop.example/c/coats",
            200,
            r#"{"items":[]}"#,
        )]);
        let sink = Arc::new(MemorySink::new());
        let coordinator = coordinator(transport.clone(), sink);
        coordinator.cancellation_token().cancel();

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.sessions[0].end, SessionEnd::Cancelled);
        assert!(transport.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_gone_page_is_not_retried() {
        let transport = CannedTransport::new(&[("https://shop.example/p/5", 404, "gone")]);
        let sink = Arc::new(MemorySink::new());
        let report = coordinator(transport.clone(), sink.clone())
            .run_url("https://shop.example/p/5")
            .await
            .unwrap();

        assert_eq!(report.failures, vec![FailureKind::TransientFetch]);
        assert_eq!(transport.fetched().len(), 1);
        assert_eq!(sink.failures()[0].status, Some(404));
    }

    #[tokio::test]
    async fn test_detail_redirected_to_listing_is_not_walked() {
        let transport = CannedTransport::redirecting(
            &[
                (
                    "https://shop.example/c/coats",
                    200,
                    r#"{"items":[{"href":"/p/1"},{"href":"/p/2"}],"next":"/c/coats?page=2"}"#,
                ),
                (
                    "https://shop.example/c/coats?page=2",
                    200,
                    r#"{"items":[{"href":"/p/3"}]}"#,
                ),
                ("https://shop.example/c/sale", 200, r#"{"items":[{"href":"/p/9"}]}"#),
                ("https://shop.example/p/2", 200, r#"{"id":"2","name":"Vest","price":"4999"}"#),
                ("https://shop.example/p/3", 200, r#"{"id":"3","name":"Hat","price":"1999"}"#),
                ("https://shop.example/p/9", 200, r#"{"id":"9","name":"Scarf","price":"999"}"#),
            ],
            &[("https://shop.example/p/1", "https://shop.example/c/sale")],
        );
        let sink = Arc::new(MemorySink::new());
        let summary = coordinator(transport.clone(), sink.clone()).run().await.unwrap();

        let mut ordinals: Vec<(String, Option<u64>)> = sink
            .products()
            .iter()
            .map(|doc| (doc.product.title.clone(), doc.ordinal))
            .collect();
        ordinals.sort_by_key(|(_, ordinal)| *ordinal);
        assert_eq!(
            ordinals,
            vec![("Vest".to_string(), Some(1)), ("Hat".to_string(), Some(2))]
        );
        assert!(!transport.fetched().iter().any(|u| u.ends_with("/p/9")));

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::Unsupported);
        assert_eq!(failures[0].url, "https://shop.example/c/sale");
        assert_eq!(
            failures[0].parent_url.as_deref(),
            Some("https://shop.example/p/1")
        );
        assert_eq!(summary.stats.listing_pages, 2);
    }

    #[tokio::test]
    async fn test_rejected_product_aborts_session() {
        let transport = CannedTransport::new(&[
            (
                "https://shop.example/c/coats",
                200,
                r#"{"items":[{"href":"/p/1"},{"href":"/p/2"}]}"#,
            ),
            ("https://shop.example/p/1", 200, r#"{"id":"1","name":"Parka","price":"7999"}"#),
            ("https://shop.example/p/2", 200, r#"{"id":"2","name":"Vest","price":"4999"}"#),
        ]);
        let (channel, receiver) = ChannelSink::channel(4);
        drop(receiver);
        let log = Arc::new(MemorySink::new());
        let output = Arc::new(FanoutSink::new(vec![
            Arc::new(channel) as Arc<dyn ProductSink>,
            log.clone(),
        ]));

        let summary = coordinator(transport.clone(), output).run().await.unwrap();

        let report = &summary.sessions[0];
        assert_eq!(report.end, SessionEnd::SinkFailed);
        assert_eq!(report.failures, vec![FailureKind::Sink]);
        assert_eq!(report.products, 0);

        assert!(log.products().is_empty());
        let failures = log.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::Sink);
        assert_eq!(failures[0].url, "https://shop.example/p/1");

        assert!(!transport.fetched().iter().any(|u| u.ends_with("/p/2")));
        assert_eq!(summary.stats.failures_of(FailureKind::Sink), 1);
    }
}
