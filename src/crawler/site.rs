//! Per-site bundle of router, canonicalizer, extractor and normalizer

use crate::config::{Config, SiteConfig};
use crate::extract::{Extractor, RuleExtractor};
use crate::normalize::{MediaResolver, Normalizer};
use crate::url::{Canonicalizer, Router};
use crate::ConfigError;
use std::sync::Arc;
use url::Url;

/// Everything a step needs to know about one site
pub struct Site {
    pub config: SiteConfig,
    pub router: Router,
    pub canonicalizer: Canonicalizer,
    pub extractor: Arc<dyn Extractor>,
    pub normalizer: Normalizer,
}

impl Site {
    /// Compiles a site's routes, canonical rules and field rules
    pub fn from_config(config: &SiteConfig) -> Result<Self, ConfigError> {
        let router = Router::from_site(config)?;
        let canonicalizer = Canonicalizer::from_site(config)?;
        let extractor = RuleExtractor::from_site(config)?;
        let normalizer = Normalizer::from_site(config, Canonicalizer::from_site(config)?);

        Ok(Self {
            config: config.clone(),
            router,
            canonicalizer,
            extractor: Arc::new(extractor),
            normalizer,
        })
    }

    /// Replaces the rule-driven extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replaces the template media resolver
    pub fn with_media_resolver(mut self, media: Arc<dyn MediaResolver>) -> Result<Self, ConfigError> {
        self.normalizer = Normalizer::new(
            Canonicalizer::from_site(&self.config)?,
            self.config.currency.clone(),
            self.config.price_unit,
            media,
        );
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the first block marker found in `body`
    pub fn block_marker<'a>(&'a self, body: &str) -> Option<&'a str> {
        self.config
            .block_markers
            .iter()
            .find(|marker| body.contains(marker.as_str()))
            .map(String::as_str)
    }
}

/// All configured sites, matched against URLs by host
pub struct SiteRegistry {
    sites: Vec<Arc<Site>>,
}

impl SiteRegistry {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let sites = config
            .sites
            .iter()
            .map(|site| Site::from_config(site).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { sites })
    }

    pub fn from_sites(sites: Vec<Site>) -> Self {
        Self {
            sites: sites.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Site>> {
        self.sites.iter().find(|s| s.name() == name).cloned()
    }

    /// The first site whose hosts claim `url`
    pub fn site_for_url(&self, url: &str) -> Option<Arc<Site>> {
        let parsed = Url::parse(url).ok()?;
        self.sites
            .iter()
            .find(|site| site.router.claims_host(&parsed))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Site>> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
