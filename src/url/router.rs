use crate::config::{compile_pattern, RouteConfig, SiteConfig};
use crate::url::host_matches;
use crate::ConfigError;
use regex::Regex;
use serde::Deserialize;
use url::Url;

/// What kind of step a fetched URL drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlUrlClass {
    /// Paginated list of item links
    Listing,
    /// One product (or product group) page
    Detail,
    /// Body only ever fetched as a dependent of a detail page
    SubResource,
    /// Matched no route; terminal, never retried
    Unsupported,
}

impl CrawlUrlClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Detail => "detail",
            Self::SubResource => "sub-resource",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for CrawlUrlClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct Route {
    class: CrawlUrlClass,
    hosts: Vec<String>,
    path: Regex,
    query: Option<Regex>,
}

impl Route {
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        if !self.hosts.iter().any(|pattern| host_matches(pattern, host)) {
            return false;
        }

        if !self.path.is_match(url.path()) {
            return false;
        }

        match &self.query {
            Some(query) => query.is_match(url.query().unwrap_or("")),
            None => true,
        }
    }
}

/// Ordered URL-shape classifier for one site
///
/// Pure: classification depends only on the URL. Routes are tested in
/// declaration order and the first match wins.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compiles routes; a route without its own host claims all `site_hosts`
    pub fn from_config(routes: &[RouteConfig], site_hosts: &[String]) -> Result<Self, ConfigError> {
        let routes = routes
            .iter()
            .map(|route| {
                Ok(Route {
                    class: route.class,
                    hosts: match &route.host {
                        Some(host) => vec![host.clone()],
                        None => site_hosts.to_vec(),
                    },
                    path: compile_pattern(&route.path)?,
                    query: route.query.as_deref().map(compile_pattern).transpose()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { routes })
    }

    pub fn from_site(site: &SiteConfig) -> Result<Self, ConfigError> {
        Self::from_config(&site.routes, &site.hosts)
    }

    /// Classifies a (post-redirect) URL
    ///
    /// Unparseable URLs and URLs matching no route are `Unsupported`.
    pub fn classify(&self, url: &str) -> CrawlUrlClass {
        match Url::parse(url) {
            Ok(parsed) => self.classify_url(&parsed),
            Err(_) => CrawlUrlClass::Unsupported,
        }
    }

    pub fn classify_url(&self, url: &Url) -> CrawlUrlClass {
        if url.scheme() != "http" && url.scheme() != "https" {
            return CrawlUrlClass::Unsupported;
        }

        self.routes
            .iter()
            .find(|route| route.matches(url))
            .map(|route| route.class)
            .unwrap_or(CrawlUrlClass::Unsupported)
    }

    /// Whether any route of this router could claim the URL's host
    pub fn claims_host(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| {
            self.routes
                .iter()
                .any(|route| route.hosts.iter().any(|pattern| host_matches(pattern, host)))
        })
    }
}
