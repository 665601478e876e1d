//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run whole
//! sessions end-to-end: listing walk, detail steps and dependent fetches.

use catalog_ripple::config::{parse_config, Config};
use catalog_ripple::crawler::{Coordinator, SessionEnd};
use catalog_ripple::output::{MemorySink, ProductSink, SqliteSink};
use catalog_ripple::storage::{ProductStore, RunStatus, SqliteStore};
use catalog_ripple::FailureKind;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a one-site configuration pointed at the mock server
///
/// `pagination` and `extra` are spliced into the site table as TOML.
fn create_test_config(base_url: &str, seed: &str, pagination: &str, extra: &str) -> Config {
    let toml = format!(
        r#"
[crawler]
max-concurrent-sessions = 1
max-concurrent-subfetches = 2
request-timeout-secs = 5
transient-retries = 0
retry-delay-ms = 0

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[[site]]
name = "mock"
hosts = ["127.0.0.1"]
seeds = ["{base}{seed}"]
currency = "USD"
price-unit = "minor"
block-markers = ["Access Denied"]
cookies = ["session=abc"]

[[site.route]]
class = "listing"
path = "^/c/"

[[site.route]]
class = "detail"
path = "^/p/"

[site.pagination]
{pagination}

[site.listing]
links = "/items"
link-field = "/href"
total-records = "/total"
next-link = "/next"

[site.detail]
id = "/id"
title = "/name"

[site.detail.price]
current = "/price"

[site.detail.colors]
list = "/colors"
code = "/code"
name = "/label"

{extra}
"#,
        base = base_url,
        seed = seed,
        pagination = pagination,
        extra = extra,
    );

    parse_config(&toml).expect("test config should parse")
}

fn images_dependent(base_url: &str) -> String {
    format!(
        r#"
[[site.dependent]]
name = "images"
url = "{}/api/images/{{id}}/{{each}}"
each = "color-codes"

[site.dependent.rules.media]
list = "/images"
url = "/src"
"#,
        base_url
    )
}

fn detail_body(id: &str, name: &str) -> String {
    format!(
        r#"{{"id": "{}", "name": "{}", "price": "7999",
            "colors": [{{"code": "030", "label": "Navy"}}, {{"code": "001", "label": "Black"}}]}}"#,
        id, name
    )
}

fn json(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "application/json")
}

#[tokio::test]
async fn test_listing_detail_and_dependent_fetches() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let detail_url = format!("{}/p/4417", base_url);

    Mock::given(method("GET"))
        .and(path("/c/coats"))
        .respond_with(json(r#"{"items": [{"href": "/p/4417"}]}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p/4417"))
        .respond_with(json(detail_body("4417", "Storm Parka")))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Sub-fetches must carry the detail page as Referer and the session cookie
    for code in ["030", "001"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/images/4417/{}", code)))
            .and(header("referer", detail_url.as_str()))
            .and(header("cookie", "session=abc"))
            .respond_with(json(format!(
                r#"{{"images": [{{"src": "https://img.example/{}.jpg"}}]}}"#,
                code
            )))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(
        &base_url,
        "/c/coats",
        r#"style = "link""#,
        &images_dependent(&base_url),
    );
    let output = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(config, output.clone())
        .expect("coordinator should build")
        .with_config_hash("test-hash");

    let summary = coordinator.run().await.expect("crawl should succeed");

    assert_eq!(summary.sessions.len(), 1);
    assert_eq!(summary.sessions[0].end, SessionEnd::Exhausted);
    assert!(output.failures().is_empty(), "{:?}", output.failures());

    let products = output.products();
    assert_eq!(products.len(), 1);

    let doc = &products[0];
    assert_eq!(doc.site, "mock");
    assert_eq!(doc.ordinal, Some(0));
    assert_eq!(doc.config_hash, "test-hash");
    assert_eq!(doc.source_url, detail_url);
    assert!(doc.product.identity.ends_with("/p/4417"));
    assert_eq!(doc.product.title, "Storm Parka");
    assert_eq!(doc.product.sku_items.len(), 2);
    assert_eq!(doc.product.media.len(), 2);
    for sku in &doc.product.sku_items {
        assert_eq!(sku.price.current_minor_units, 7999);
        assert_eq!(sku.media.len(), 1);
    }

    let stats = summary.stats;
    assert_eq!(stats.listing_pages, 1);
    assert_eq!(stats.detail_pages, 1);
    assert_eq!(stats.fetches, 4);
    assert_eq!(stats.products, 1);
}

#[tokio::test]
async fn test_offset_pagination_stops_at_total() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/c/coats"))
        .and(query_param("No", "60"))
        .respond_with(json(
            r#"{"total": 125, "items": [{"href": "/p/1"}, {"href": "/p/2"}]}"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/c/coats"))
        .and(query_param("No", "120"))
        .respond_with(json(r#"{"total": 125, "items": [{"href": "/p/3"}]}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    // 120 + 60 >= 125, so there is no third page
    Mock::given(method("GET"))
        .and(path("/c/coats"))
        .and(query_param("No", "180"))
        .respond_with(json(r#"{"total": 125, "items": []}"#))
        .expect(0)
        .mount(&mock_server)
        .await;

    for id in ["1", "2", "3"] {
        Mock::given(method("GET"))
            .and(path(format!("/p/{}", id)))
            .respond_with(json(detail_body(id, &format!("Coat {}", id))))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(
        &base_url,
        "/c/coats?No=60",
        "style = \"offset\"\nparam = \"No\"\npage-size = 60",
        "",
    );
    let output = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(config, output.clone()).expect("coordinator should build");

    let summary = coordinator.run().await.expect("crawl should succeed");

    assert!(output.failures().is_empty(), "{:?}", output.failures());
    assert_eq!(summary.stats.listing_pages, 2);

    let mut ordinals: Vec<u64> = output.products().iter().filter_map(|d| d.ordinal).collect();
    ordinals.sort_unstable();
    assert_eq!(ordinals, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_forbidden_sub_fetch_aborts_detail_step() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/c/coats"))
        .respond_with(json(r#"{"items": [{"href": "/p/4417"}]}"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p/4417"))
        .respond_with(json(detail_body("4417", "Storm Parka")))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/images/4417/030"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access Denied"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/images/4417/001"))
        .respond_with(json(r#"{"images": [{"src": "https://img.example/001.jpg"}]}"#))
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        &base_url,
        "/c/coats",
        r#"style = "link""#,
        &images_dependent(&base_url),
    );
    let output = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(config, output.clone()).expect("coordinator should build");

    let summary = coordinator.run().await.expect("crawl should succeed");

    assert!(output.products().is_empty());

    let failures = output.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::TransientFetch);
    assert_eq!(failures[0].status, Some(403));
    assert!(failures[0].url.ends_with("/api/images/4417/030"));
    assert_eq!(
        failures[0].parent_url.as_deref(),
        Some(format!("{}/p/4417", base_url).as_str())
    );

    assert_eq!(summary.sessions[0].end, SessionEnd::Exhausted);
    assert_eq!(summary.stats.failures_of(FailureKind::TransientFetch), 1);
}

#[tokio::test]
async fn test_cancel_during_sub_fetch_emits_nothing() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/c/coats"))
        .respond_with(json(r#"{"items": [{"href": "/p/4417"}]}"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p/4417"))
        .respond_with(json(detail_body("4417", "Storm Parka")))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/images/4417/030"))
        .respond_with(json(r#"{"images": [{"src": "https://img.example/030.jpg"}]}"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/images/4417/001"))
        .respond_with(
            json(r#"{"images": [{"src": "https://img.example/001.jpg"}]}"#)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        &base_url,
        "/c/coats",
        r#"style = "link""#,
        &images_dependent(&base_url),
    );
    let output = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(config, output.clone()).expect("coordinator should build");

    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
    });

    let summary = coordinator.run().await.expect("crawl should succeed");

    assert!(output.products().is_empty());
    assert_eq!(summary.stats.products, 0);
    assert_eq!(summary.sessions[0].end, SessionEnd::Cancelled);
    assert_eq!(summary.sessions[0].failures, vec![FailureKind::Cancelled]);

    let failures = output.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::Cancelled);
    assert!(failures[0].url.ends_with("/api/images/4417/001"));
    assert_eq!(
        failures[0].parent_url.as_deref(),
        Some(format!("{}/p/4417", base_url).as_str())
    );
}

#[tokio::test]
async fn test_unrouted_url_is_never_fetched() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .respond_with(json("{}"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, "/c/coats", r#"style = "link""#, "");
    let output = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(config, output.clone()).expect("coordinator should build");

    let report = coordinator
        .run_url(&format!("{}/about", base_url))
        .await
        .expect("host is claimed by the site");

    assert_eq!(report.steps, 1);
    assert_eq!(report.failures, vec![FailureKind::Unsupported]);
    assert_eq!(output.failures()[0].kind, FailureKind::Unsupported);
}

#[tokio::test]
async fn test_crawl_into_sqlite() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("catalog.db");

    Mock::given(method("GET"))
        .and(path("/c/coats"))
        .respond_with(json(r#"{"items": [{"href": "/p/1"}, {"href": "/p/2"}]}"#))
        .mount(&mock_server)
        .await;

    for id in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path(format!("/p/{}", id)))
            .respond_with(json(detail_body(id, &format!("Coat {}", id))))
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&base_url, "/c/coats", r#"style = "link""#, "");
    let sink: Arc<dyn ProductSink> =
        Arc::new(SqliteSink::open(&db_path, "hash-1").expect("sqlite sink should open"));
    let coordinator = Coordinator::new(config, sink).expect("coordinator should build");

    coordinator.run().await.expect("crawl should succeed");

    let store = SqliteStore::new(&db_path).expect("database should reopen");
    assert_eq!(store.count_products().unwrap(), 2);
    assert_eq!(store.count_products_by_site().unwrap().get("mock"), Some(&2));

    let run = store.get_latest_run().unwrap().expect("run should be recorded");
    assert_eq!(run.status, RunStatus::Completed);
}
