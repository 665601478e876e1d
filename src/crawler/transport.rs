//! HTTP transport with per-session cookies
//!
//! This module handles every network request a crawl step makes:
//! - Building HTTP clients with the crawler's user agent
//! - Sending request descriptors with explicit headers (Referer)
//! - Keeping a cookie jar per session that can be reset after a block
//! - Classifying network failures
//!
//! Steps never talk to `reqwest` directly; they go through [`Transport`], so
//! tests and embedders can substitute their own.

use crate::config::{SiteConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client, Method};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// An outbound request: method, absolute URL and explicit headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSpec {
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

fn serialize_method<S: serde::Serializer>(method: &Method, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(method.as_str())
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds a header, replacing any earlier one with the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_referer(self, referer: impl Into<String>) -> Self {
        self.with_header("Referer", referer)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as seen by the steps
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Headers the request was sent with (cookies excluded)
    pub request_headers: HeaderMap,
}

impl FetchedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failures; never an HTTP status
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    fn classify(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Sends requests for one session
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &RequestSpec) -> Result<FetchedResponse, TransportError>;

    /// Drops session state (cookies) and re-seeds it from the site config
    fn reset_session(&self);
}

/// Opens one transport per session
pub trait TransportFactory: Send + Sync {
    fn open(&self, site: &SiteConfig) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Cookie jar that can be swapped out wholesale
struct SessionCookies {
    seed: Vec<(String, Url)>,
    jar: RwLock<Arc<Jar>>,
}

impl SessionCookies {
    fn new(site: &SiteConfig) -> Self {
        let seed = seed_cookies(site);
        let jar = RwLock::new(Arc::new(build_jar(&seed)));
        Self { seed, jar }
    }

    fn current(&self) -> Arc<Jar> {
        match self.jar.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn reset(&self) {
        let fresh = Arc::new(build_jar(&self.seed));
        match self.jar.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url)
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}

/// Pairs each configured cookie with every origin it should be sent to
fn seed_cookies(site: &SiteConfig) -> Vec<(String, Url)> {
    let mut origins: Vec<(Url, Option<String>)> = Vec::new();

    for seed in &site.seeds {
        if let Ok(url) = Url::parse(seed) {
            origins.push((url, None));
        }
    }
    for host in &site.hosts {
        let (bare, domain) = match host.strip_prefix("*.") {
            Some(bare) => (bare, Some(bare.to_string())),
            None => (host.as_str(), None),
        };
        for scheme in ["https", "http"] {
            if let Ok(url) = Url::parse(&format!("{}://{}/", scheme, bare)) {
                origins.push((url, domain.clone()));
            }
        }
    }

    let mut seeded = Vec::new();
    for cookie in &site.cookies {
        for (url, domain) in &origins {
            let value = match domain {
                Some(domain) => format!("{}; Domain={}", cookie, domain),
                None => cookie.clone(),
            };
            seeded.push((value, url.clone()));
        }
    }
    seeded
}

fn build_jar(seed: &[(String, Url)]) -> Jar {
    let jar = Jar::default();
    for (cookie, url) in seed {
        jar.add_cookie_str(cookie, url);
    }
    jar
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout_secs` - Whole-request timeout
/// * `cookies` - Cookie store the client reads and writes
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
fn build_http_client<C>(
    config: &UserAgentConfig,
    timeout_secs: u64,
    cookies: Arc<C>,
) -> Result<Client, reqwest::Error>
where
    C: CookieStore + 'static,
{
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .cookie_provider(cookies)
        .build()
}

/// `reqwest`-backed transport with a resettable cookie jar
pub struct HttpTransport {
    client: Client,
    cookies: Arc<SessionCookies>,
}

impl HttpTransport {
    pub fn new(
        site: &SiteConfig,
        user_agent: &UserAgentConfig,
        timeout_secs: u64,
    ) -> Result<Self, TransportError> {
        let cookies = Arc::new(SessionCookies::new(site));
        let client = build_http_client(user_agent, timeout_secs, Arc::clone(&cookies))
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { client, cookies })
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("header {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("header {}: {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &RequestSpec) -> Result<FetchedResponse, TransportError> {
        let request_headers = header_map(&request.headers)?;

        tracing::debug!("{} {}", request.method, request.url);

        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request_headers.clone())
            .send()
            .await
            .map_err(TransportError::classify)?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(TransportError::classify)?;

        Ok(FetchedResponse {
            url,
            status,
            headers,
            body,
            request_headers,
        })
    }

    fn reset_session(&self) {
        tracing::debug!("Resetting session cookies");
        self.cookies.reset();
    }
}

/// Opens an [`HttpTransport`] per session
pub struct HttpTransportFactory {
    user_agent: UserAgentConfig,
    timeout_secs: u64,
}

impl HttpTransportFactory {
    pub fn new(user_agent: UserAgentConfig, timeout_secs: u64) -> Self {
        Self {
            user_agent,
            timeout_secs,
        }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn open(&self, site: &SiteConfig) -> Result<Arc<dyn Transport>, TransportError> {
        let transport = HttpTransport::new(site, &self.user_agent, self.timeout_secs)?;
        Ok(Arc::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn site(cookies: &[&str]) -> SiteConfig {
        let toml = format!(
            r#"
[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[[site]]
name = "shop"
hosts = ["shop.example", "*.cdn.example"]
seeds = ["https://shop.example/c/mens"]
cookies = [{}]

[[site.route]]
class = "listing"
path = "^/c/"

[[site.route]]
class = "detail"
path = "^/p/"
"#,
            cookies
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        parse_config(&toml).unwrap().sites.remove(0)
    }

    #[test]
    fn test_request_spec_headers_replace_case_insensitively() {
        let spec = RequestSpec::get("https://shop.example/p/1")
            .with_header("referer", "https://a.example/")
            .with_referer("https://shop.example/c/mens");

        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.header("REFERER"), Some("https://shop.example/c/mens"));
        assert_eq!(spec.method, Method::GET);
    }

    #[test]
    fn test_seed_cookies_cover_seeds_and_hosts() {
        let seeded = seed_cookies(&site(&["geo=US"]));
        assert!(seeded
            .iter()
            .any(|(c, u)| c == "geo=US" && u.host_str() == Some("shop.example")));
        assert!(seeded
            .iter()
            .any(|(c, _)| c == "geo=US; Domain=cdn.example"));
    }

    #[test]
    fn test_reset_restores_seeded_cookies_only() {
        let cookies = SessionCookies::new(&site(&["geo=US"]));
        let url = Url::parse("https://shop.example/p/1").unwrap();

        let set = HeaderValue::from_static("session=abc");
        cookies.set_cookies(&mut std::iter::once(&set), &url);
        let before = cookies.cookies(&url).unwrap();
        assert!(before.to_str().unwrap().contains("session=abc"));

        cookies.reset();
        let after = cookies.cookies(&url).unwrap();
        let after = after.to_str().unwrap();
        assert!(after.contains("geo=US"));
        assert!(!after.contains("session=abc"));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let err = header_map(&[("bad header".to_string(), "x".to_string())]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[test]
    fn test_factory_opens_transport() {
        let site = site(&[]);
        let factory = HttpTransportFactory::new(
            UserAgentConfig {
                crawler_name: "TestBot".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            5,
        );
        assert!(factory.open(&site).is_ok());
    }
}
