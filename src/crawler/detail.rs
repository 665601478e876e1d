//! Detail step: one product page to zero or more product documents

use crate::crawler::orchestrator::gather_dependents;
use crate::crawler::request::CrawlRequest;
use crate::crawler::session::SessionContext;
use crate::crawler::transport::FetchedResponse;
use crate::extract::ExtractKind;
use crate::model::{ProductDocument, SCHEMA_VERSION};
use crate::output::{Sink, Yielded};
use crate::{StepError, StepResult};
use chrono::Utc;

/// What one detail step produced
#[derive(Debug, Default)]
pub struct DetailOutcome {
    pub products: usize,
    /// Products dropped for lack of identity; the step itself succeeded
    pub failures: Vec<StepError>,
    pub duplicate_skus: usize,
    pub media_resolutions: usize,
}

/// Processes one detail page
///
/// Nothing is emitted until every dependent fetch has succeeded and the
/// page is normalized, so a failing sub-fetch leaves no partial product.
///
/// # Arguments
///
/// * `ctx` - Session context
/// * `request` - The request that fetched this page; carries the ordinal
/// * `response` - The detail response
/// * `sink` - Receives the product documents
pub async fn process_detail(
    ctx: &SessionContext,
    request: &CrawlRequest,
    response: &FetchedResponse,
    sink: &mut dyn Sink,
) -> StepResult<DetailOutcome> {
    let site = &ctx.site;

    if let Some(marker) = site.config.detail_marker.as_deref() {
        if !response.body.contains(marker) {
            return Err(StepError::transient(
                &response.url,
                Some(response.status),
                format!("detail marker '{}' missing from body", marker),
            ));
        }
    }

    let shell = site
        .extractor
        .extract(&response.body, ExtractKind::Detail)
        .map_err(|e| StepError::parse(&response.url, e))?;

    let fragments = gather_dependents(ctx, response, &shell).await?;

    let normalized = site.normalizer.normalize(&response.url, &shell, &fragments);
    for warning in &normalized.warnings {
        tracing::debug!("{}: {}", response.url, warning);
    }

    let crawled_at = Utc::now();
    let mut outcome = DetailOutcome {
        products: 0,
        failures: normalized.failures,
        duplicate_skus: normalized.duplicate_skus,
        media_resolutions: normalized.media_resolutions,
    };

    for (index, product) in normalized.products.into_iter().enumerate() {
        let doc = ProductDocument {
            schema_version: SCHEMA_VERSION,
            site: site.name().to_string(),
            session_id: ctx.id.to_string(),
            ordinal: request.ordinal,
            group_index: index as u32,
            source_url: response.url.clone(),
            crawled_at,
            config_hash: ctx.config_hash.to_string(),
            product,
        };

        sink.emit(Yielded::Product(doc))
            .await
            .map_err(|e| StepError::sink(&response.url, e))?;
        outcome.products += 1;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::site::Site;
    use crate::crawler::transport::{RequestSpec, Transport, TransportError};
    use crate::output::{CrawlStats, SinkResult};
    use crate::state::Cursor;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const CONFIG: &str = r#"
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

[[site.route]]
class = "listing"
path = "^/c/"

[[site.route]]
class = "detail"
path = "^/p/"

[site.listing]
links = "/items"

[site.detail]
records = "/items"
id = "/sku"
title = "/name"

[site.detail.price]
current = "/price"
"#;

    struct NoTransport;

    #[async_trait]
    impl Transport for NoTransport {
        async fn fetch(&self, request: &RequestSpec) -> Result<FetchedResponse, TransportError> {
            Err(TransportError::Network(format!("unexpected fetch of {}", request.url)))
        }

        fn reset_session(&self) {}
    }

    #[derive(Default)]
    struct Collect(Vec<ProductDocument>);

    #[async_trait]
    impl Sink for Collect {
        async fn emit(&mut self, value: Yielded) -> SinkResult<()> {
            if let Yielded::Product(doc) = value {
                self.0.push(doc);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_group_page_products_share_ordinal() {
        let config = parse_config(CONFIG).unwrap();
        let ctx = SessionContext {
            id: Arc::from("s-1"),
            site: Arc::new(Site::from_config(&config.sites[0]).unwrap()),
            transport: Arc::new(NoTransport),
            cancel: CancellationToken::new(),
            config_hash: Arc::from("cafe"),
            max_subfetches: 2,
            max_pages: None,
            max_records: None,
            stats: Arc::new(CrawlStats::new()),
        };
        let url = "https://shop.example/p/set-12";
        let request = CrawlRequest::new(RequestSpec::get(url), Cursor::new("s-1").advance(8), Some(7));
        let response = FetchedResponse {
            url: url.to_string(),
            status: 200,
            headers: HeaderMap::new(),
            body: r#"{"items": [
                {"sku": "a", "name": "Mitten", "price": "1500"},
                {"sku": "b", "name": "Scarf", "price": "2500"},
                {"sku": "c", "name": "Beanie", "price": "1000"}
            ]}"#
            .to_string(),
            request_headers: HeaderMap::new(),
        };

        let mut sink = Collect::default();
        let outcome = process_detail(&ctx, &request, &response, &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome.products, 3);
        let keys: Vec<(Option<u64>, u32)> = sink.0.iter().map(|d| d.ordering_key()).collect();
        assert_eq!(keys, vec![(Some(7), 0), (Some(7), 1), (Some(7), 2)]);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        let titles: Vec<&str> = sink.0.iter().map(|d| d.product.title.as_str()).collect();
        assert_eq!(titles, vec!["Mitten", "Scarf", "Beanie"]);
        assert!(sink.0.iter().all(|d| d.source_url == url && d.config_hash == "cafe"));
    }
}
