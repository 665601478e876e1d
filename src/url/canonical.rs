use crate::config::{compile_pattern, SiteConfig};
use crate::url::normalize::{filter_and_sort_query_params, normalize_path, set_query_pairs};
use crate::url::{normalize_url, CrawlUrlClass, Router};
use crate::{ConfigError, UrlError};
use regex::Regex;

/// Turns detail URLs into stable identity keys
///
/// On top of [`normalize_url`], site parameters listed in `strip-params` are
/// dropped, and for detail URLs the query is reduced to `keep-params` and
/// every `strip-path` pattern is cut from the path (e.g. a trailing
/// `/color/<code>`).
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    router: Router,
    strip_params: Vec<String>,
    strip_path: Vec<Regex>,
    keep_params: Vec<String>,
}

impl Canonicalizer {
    pub fn new(router: Router, strip_params: Vec<String>, strip_path: Vec<Regex>) -> Self {
        Self {
            router,
            strip_params,
            strip_path,
            keep_params: Vec::new(),
        }
    }

    /// Query parameters detail URLs keep (e.g. `productId` on `product.jsp`)
    pub fn with_keep_params(mut self, keep_params: Vec<String>) -> Self {
        self.keep_params = keep_params;
        self
    }

    pub fn from_site(site: &SiteConfig) -> Result<Self, ConfigError> {
        let strip_path = site
            .canonical
            .strip_path
            .iter()
            .map(|pattern| compile_pattern(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(
            Router::from_site(site)?,
            site.canonical.strip_params.clone(),
            strip_path,
        )
        .with_keep_params(site.canonical.keep_params.clone()))
    }

    /// Computes the identity key of a URL
    ///
    /// Deterministic and idempotent: `canonicalize(canonicalize(u)) == canonicalize(u)`.
    pub fn canonicalize(&self, url: &str) -> Result<String, UrlError> {
        let mut url = normalize_url(url)?;

        if self.router.classify_url(&url) == CrawlUrlClass::Detail {
            let kept: Vec<(String, String)> = filter_and_sort_query_params(&url, &[])
                .into_iter()
                .filter(|(key, _)| self.keep_params.contains(key))
                .collect();
            set_query_pairs(&mut url, &kept);

            let mut path = url.path().to_string();
            // Repeat until no pattern applies, so a second pass is a no-op
            loop {
                let stripped = self
                    .strip_path
                    .iter()
                    .fold(path.clone(), |acc, re| re.replace_all(&acc, "").into_owned());
                let stripped = normalize_path(&stripped);
                if stripped == path {
                    break;
                }
                path = stripped;
            }
            url.set_path(&path);
        } else if url.query().is_some() && !self.strip_params.is_empty() {
            let params = filter_and_sort_query_params(&url, &self.strip_params);
            set_query_pairs(&mut url, &params);
        }

        Ok(url.to_string())
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn canonicalizer() -> Canonicalizer {
        let router = Router::from_config(
            &[
                RouteConfig {
                    class: CrawlUrlClass::Detail,
                    host: None,
                    path: "^/p/".to_string(),
                    query: None,
                },
                RouteConfig {
                    class: CrawlUrlClass::Listing,
                    host: None,
                    path: "^/c/".to_string(),
                    query: None,
                },
            ],
            &["shop.example".to_string()],
        )
        .unwrap();

        Canonicalizer::new(
            router,
            vec!["sort".to_string()],
            vec![Regex::new("/color/[^/]+$").unwrap()],
        )
    }

    #[test]
    fn test_detail_drops_query_and_color_segment() {
        let c = canonicalizer();
        assert_eq!(
            c.canonicalize("https://www.shop.example/p/123/color/030?size=M").unwrap(),
            "https://shop.example/p/123"
        );
    }

    #[test]
    fn test_equivalent_urls_share_identity() {
        let c = canonicalizer();
        let a = c.canonicalize("HTTPS://Shop.Example/p/9/?b=1&a=2").unwrap();
        let b = c.canonicalize("https://shop.example/p/9/color/001?a=2&b=1#top").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_listing_keeps_query_minus_site_params() {
        let c = canonicalizer();
        assert_eq!(
            c.canonicalize("https://shop.example/c/coats?sort=price&No=60&utm_source=x").unwrap(),
            "https://shop.example/c/coats?No=60"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let c = canonicalizer();
        for raw in [
            "https://shop.example/p/1/color/a/color/b?x=1",
            "https://shop.example/c/a?z=1&y=2",
            "https://shop.example/other/page/",
        ] {
            let once = c.canonicalize(raw).unwrap();
            assert_eq!(c.canonicalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_nested_strip_reaches_fixpoint() {
        let c = canonicalizer();
        assert_eq!(
            c.canonicalize("https://shop.example/p/1/color/a/color/b").unwrap(),
            "https://shop.example/p/1"
        );
    }

    #[test]
    fn test_keep_params_survive_on_detail() {
        let router = Router::from_config(
            &[RouteConfig {
                class: CrawlUrlClass::Detail,
                host: None,
                path: "^/product.jsp$".to_string(),
                query: Some("productId=".to_string()),
            }],
            &["shop.example".to_string()],
        )
        .unwrap();
        let c = Canonicalizer::new(router, vec![], vec![])
            .with_keep_params(vec!["productId".to_string()]);

        let key = c
            .canonicalize("https://shop.example/product.jsp?color=030&productId=77")
            .unwrap();
        assert_eq!(key, "https://shop.example/product.jsp?productId=77");
        assert_eq!(c.canonicalize(&key).unwrap(), key);
    }

    #[test]
    fn test_malformed_url_is_error() {
        assert!(canonicalizer().canonicalize("::nope").is_err());
    }
}
