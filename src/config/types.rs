use crate::url::CrawlUrlClass;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Catalog-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Finds a site by its configured name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.name == name)
    }

    /// All seed URLs across all sites, in declaration order
    pub fn seeds(&self) -> Vec<String> {
        self.sites
            .iter()
            .flat_map(|site| site.seeds.iter().cloned())
            .collect()
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of crawl sessions that may run at the same time
    #[serde(rename = "max-concurrent-sessions", default = "default_sessions")]
    pub max_concurrent_sessions: usize,

    /// Number of independent sub-fetches in flight within one detail step
    #[serde(rename = "max-concurrent-subfetches", default = "default_subfetches")]
    pub max_concurrent_subfetches: usize,

    /// Listing pages walked per session before the walk stops
    #[serde(rename = "max-pages-per-session", default)]
    pub max_pages_per_session: Option<u32>,

    /// Items emitted per session before the walk stops
    #[serde(rename = "max-records-per-session", default)]
    pub max_records_per_session: Option<u64>,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// How many times a transiently failed top-level request is re-queued
    #[serde(rename = "transient-retries", default = "default_retries")]
    pub transient_retries: u32,

    /// Delay before a re-queued request is fetched again (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_sessions() -> usize {
    4
}

fn default_subfetches() -> usize {
    8
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> u64 {
    5000
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: default_sessions(),
            max_concurrent_subfetches: default_subfetches(),
            max_pages_per_session: None,
            max_records_per_session: None,
            request_timeout_secs: default_timeout(),
            transient_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Append canonical product documents as JSON lines to this file
    #[serde(rename = "jsonl-path", default)]
    pub jsonl_path: Option<String>,

    /// Upsert product documents and failures into this SQLite database
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

/// How raw price amounts are expressed by a site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceUnit {
    /// "79.99" means 7999 minor units
    #[default]
    Major,
    /// "7999" means 7999 minor units
    Minor,
}

/// One site adapter, expressed entirely as data
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    pub name: String,

    /// Host patterns (e.g., "shop.example.com" or "*.example.com")
    pub hosts: Vec<String>,

    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub price_unit: PriceUnit,

    /// Substrings that identify a block or robot-check page
    #[serde(default)]
    pub block_markers: Vec<String>,

    /// Substring every genuine detail page contains
    #[serde(default)]
    pub detail_marker: Option<String>,

    /// Session cookies ("name=value") seeded into every session's jar
    #[serde(default)]
    pub cookies: Vec<String>,

    /// Ordered URL routes; first match wins
    #[serde(default, rename = "route")]
    pub routes: Vec<RouteConfig>,

    #[serde(default)]
    pub canonical: CanonicalConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub listing: ListingRules,

    #[serde(default)]
    pub detail: DetailRules,

    /// Ordered dependent sub-fetches issued by every detail step
    #[serde(default, rename = "dependent")]
    pub dependents: Vec<DependentFetchConfig>,

    #[serde(default)]
    pub media: MediaTemplates,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// One URL-shape matcher
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub class: CrawlUrlClass,

    /// Optional host pattern; defaults to any of the site's hosts
    #[serde(default)]
    pub host: Option<String>,

    /// Regex tested against the URL path
    pub path: String,

    /// Optional regex the query string must also match
    #[serde(default)]
    pub query: Option<String>,
}

/// Identity-key rules for the canonicalizer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CanonicalConfig {
    /// Query parameters removed in addition to the common tracking set
    #[serde(default)]
    pub strip_params: Vec<String>,

    /// Regexes removed from detail paths (e.g., "/color/[^/]+$")
    #[serde(default)]
    pub strip_path: Vec<String>,

    /// Query parameters a detail URL keeps because they name the item
    #[serde(default)]
    pub keep_params: Vec<String>,
}

/// How a listing advertises its next page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationStyle {
    /// Follow an extracted next-page link
    #[default]
    Link,
    /// Record offset carried in a query parameter (e.g., `No=60`)
    Offset,
    /// One-based page number carried in a query parameter
    Page,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PaginationConfig {
    #[serde(default)]
    pub style: PaginationStyle,

    /// Query parameter holding the offset or page number
    #[serde(default)]
    pub param: Option<String>,

    /// Fallback page size when the listing does not declare one
    #[serde(default)]
    pub page_size: Option<u64>,
}

/// A CSS selection copied into the JSON view of an HTML body
#[derive(Debug, Clone, Deserialize)]
pub struct SelectRule {
    pub css: String,

    /// Attribute to read; element text when absent
    #[serde(default)]
    pub attr: Option<String>,

    /// Collect every match into an array instead of the first one
    #[serde(default)]
    pub all: bool,
}

/// How a raw body becomes the JSON view field rules read from
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ViewRules {
    /// Regex whose first capture group is an embedded JSON blob
    #[serde(default)]
    pub embedded_json: Option<String>,

    /// CSS selector of a script element holding an embedded JSON blob
    #[serde(default)]
    pub embedded_json_css: Option<String>,

    /// Named CSS selections, stored under `/select/<name>` in the view
    #[serde(default)]
    pub select: BTreeMap<String, SelectRule>,
}

/// Field rules for listing pages; values are JSON pointers into the view
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListingRules {
    #[serde(flatten)]
    pub view: ViewRules,

    /// Array of item links (strings or objects)
    #[serde(default)]
    pub links: Option<String>,

    /// Pointer inside each link object when links are objects
    #[serde(default)]
    pub link_field: Option<String>,

    /// Array of item ids expanded through `detail-url-template`
    #[serde(default)]
    pub item_ids: Option<String>,

    /// Detail URL template with an `{id}` placeholder
    #[serde(default)]
    pub detail_url_template: Option<String>,

    #[serde(default)]
    pub total_records: Option<String>,

    #[serde(default)]
    pub total_pages: Option<String>,

    #[serde(default)]
    pub page_size: Option<String>,

    #[serde(default)]
    pub current_page: Option<String>,

    #[serde(default)]
    pub next_link: Option<String>,
}

/// Price field pointers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PriceRule {
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub msrp: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Availability signal pointers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StockRule {
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub available: Option<String>,
}

/// A variant axis (colors or sizes) listed by the source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AxisRule {
    pub list: String,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: PriceRule,
    #[serde(default)]
    pub stock: StockRule,
}

/// Per-SKU rows listed by the source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VariantRule {
    pub list: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub price: PriceRule,
    #[serde(default)]
    pub stock: StockRule,
}

/// Media references listed by the source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MediaRule {
    pub list: String,
    /// Pointer inside each item; empty when items are plain URL strings
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub variant: Option<String>,
}

/// Field rules for detail pages and dependent sub-resources
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetailRules {
    #[serde(flatten)]
    pub view: ViewRules,

    /// Array of sibling product records on a product-group page
    #[serde(default)]
    pub records: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub crowd: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub review_count: Option<String>,

    #[serde(default)]
    pub colors: Option<AxisRule>,
    #[serde(default)]
    pub sizes: Option<AxisRule>,
    #[serde(default)]
    pub variants: Option<VariantRule>,

    #[serde(default)]
    pub price: PriceRule,
    #[serde(default)]
    pub stock: StockRule,
    #[serde(default)]
    pub media: Option<MediaRule>,

    /// Named template variables for dependent sub-fetches
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

/// One dependent sub-fetch of a detail step
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DependentFetchConfig {
    pub name: String,

    /// URL template; `{var}` placeholders, `{each}` for fan-out values
    pub url: String,

    /// Variable whose distinct values fan this fetch out concurrently
    #[serde(default)]
    pub each: Option<String>,

    /// Substring a genuine response body must contain
    #[serde(default)]
    pub marker: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub rules: DetailRules,
}

/// Size variants derived from an original media URL via `{url}` templates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaTemplates {
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
}
