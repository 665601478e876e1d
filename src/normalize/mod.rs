//! Normalizer: intermediate records to canonical products
//!
//! One detail step hands over its shell record plus every dependent fragment.
//! Fragments are merged into the products they belong to, then each product
//! gets its identity, SKUs, prices, stock and media. Only a missing identity
//! drops a product; everything else degrades field by field.

pub mod media;
pub mod price;
pub mod sku;
pub mod stock;

pub use media::{media_key, MediaResolver, MediaSets, TemplateMediaResolver};
pub use sku::{build_skus, SkuBuild, SkuContext};

use crate::config::{PriceUnit, SiteConfig};
use crate::extract::IntermediateRecord;
use crate::model::{Product, MAX_CATEGORIES};
use crate::url::{resolve_link, Canonicalizer};
use crate::StepError;
use std::sync::Arc;
use url::Url;

/// What one detail step normalized into
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub products: Vec<Product>,
    /// Products dropped because no identity could be resolved
    pub failures: Vec<StepError>,
    pub warnings: Vec<String>,
    pub duplicate_skus: usize,
    pub media_resolutions: usize,
}

pub struct Normalizer {
    canonicalizer: Canonicalizer,
    currency: String,
    price_unit: PriceUnit,
    media: Arc<dyn MediaResolver>,
}

impl Normalizer {
    pub fn new(
        canonicalizer: Canonicalizer,
        currency: impl Into<String>,
        price_unit: PriceUnit,
        media: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            canonicalizer,
            currency: currency.into(),
            price_unit,
            media,
        }
    }

    pub fn from_site(site: &SiteConfig, canonicalizer: Canonicalizer) -> Self {
        Self::new(
            canonicalizer,
            site.currency.clone(),
            site.price_unit,
            Arc::new(TemplateMediaResolver::new(site.media.clone())),
        )
    }

    /// Normalizes one detail step
    ///
    /// # Arguments
    ///
    /// * `detail_url` - Final URL of the detail response
    /// * `shell` - Record extracted from the detail body itself
    /// * `fragments` - Records from the dependent sub-fetches
    pub fn normalize(
        &self,
        detail_url: &str,
        shell: &IntermediateRecord,
        fragments: &[IntermediateRecord],
    ) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome::default();
        let grouped = !shell.group.is_empty();

        for primary in shell.primaries() {
            let mut merged = primary.clone();
            if grouped {
                inherit_from_shell(&mut merged, shell);
            }
            for fragment in fragments {
                if !grouped || belongs_to(fragment, primary) {
                    merge_fragment(&mut merged, fragment);
                }
            }

            match self.identity(detail_url, &merged, grouped) {
                Ok(identity) => {
                    let product = self.build_product(identity, &merged, &mut outcome);
                    outcome.products.push(product);
                }
                Err(message) => {
                    tracing::warn!("Dropping product from {}: {}", detail_url, message);
                    outcome
                        .failures
                        .push(StepError::normalization(detail_url, message));
                }
            }
        }

        outcome
    }

    fn identity(
        &self,
        detail_url: &str,
        record: &IntermediateRecord,
        grouped: bool,
    ) -> Result<String, String> {
        let canonical = self
            .canonicalizer
            .canonicalize(detail_url)
            .map_err(|e| e.to_string())?;

        if !grouped {
            return Ok(canonical);
        }

        if let Some(own) = record.url.as_deref() {
            let base = Url::parse(detail_url).map_err(|e| e.to_string())?;
            let resolved = resolve_link(&base, own).map_err(|e| e.to_string())?;
            return self
                .canonicalizer
                .canonicalize(resolved.as_str())
                .map_err(|e| e.to_string());
        }

        // Siblings sharing one page are told apart by their source id
        match record.identity_id.as_deref() {
            Some(id) => Ok(format!("{}#{}", canonical, id)),
            None => Err("group member has neither its own URL nor an id".to_string()),
        }
    }

    fn build_product(
        &self,
        identity: String,
        record: &IntermediateRecord,
        outcome: &mut NormalizeOutcome,
    ) -> Product {
        let media = MediaSets::resolve(self.media.as_ref(), &record.media);
        outcome.media_resolutions += media.resolutions();

        let product_id = record.identity_id.as_deref().unwrap_or(identity.as_str());
        let ctx = SkuContext {
            product_id,
            currency: &self.currency,
            price_unit: self.price_unit,
            media: &media,
        };
        let build = build_skus(record, &ctx);

        for warning in &build.warnings {
            tracing::warn!("{}", warning);
        }
        outcome.duplicate_skus += build.duplicates;
        outcome.warnings.extend(build.warnings);

        let mut category = record.categories.clone();
        category.truncate(MAX_CATEGORIES);

        Product {
            stock: Product::aggregate_stock(&build.skus),
            title: record.title.clone().unwrap_or_default(),
            brand_name: record.brand.clone().unwrap_or_default(),
            description: record.description.clone().unwrap_or_default(),
            category,
            crowd_type: record.crowd.clone().unwrap_or_default(),
            rating: record.rating.filter(|r| r.is_finite() && *r >= 0.0).unwrap_or(0.0),
            review_count: record.review_count.unwrap_or(0),
            sku_items: build.skus,
            media: media.all(),
            identity,
        }
    }
}

/// On group pages a fragment naming an id only applies to that sibling
fn belongs_to(fragment: &IntermediateRecord, primary: &IntermediateRecord) -> bool {
    match (&fragment.identity_id, &primary.identity_id) {
        (Some(fragment_id), Some(primary_id)) => fragment_id == primary_id,
        _ => true,
    }
}

/// Group members fall back to page-level fields they do not carry themselves
fn inherit_from_shell(member: &mut IntermediateRecord, shell: &IntermediateRecord) {
    fill(&mut member.brand, &shell.brand);
    fill(&mut member.description, &shell.description);
    fill(&mut member.crowd, &shell.crowd);
    if member.categories.is_empty() {
        member.categories = shell.categories.clone();
    }
    if member.media.is_empty() {
        member.media = shell.media.clone();
    }
}

fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

/// Folds a dependent fragment into a product record
///
/// Media always accumulate (tagged with the fragment's variant key when the
/// refs carry none). Axes, rows, price and stock fill gaps only, so the
/// detail body wins over a fragment when both report a field.
pub fn merge_fragment(target: &mut IntermediateRecord, fragment: &IntermediateRecord) {
    target.media.extend(fragment.media.iter().map(|raw| {
        let mut raw = raw.clone();
        if raw.variant_key.is_none() {
            raw.variant_key = fragment.variant_key.clone();
        }
        raw
    }));

    if target.colors.is_empty() {
        target.colors = fragment.colors.clone();
    }
    if target.sizes.is_empty() {
        target.sizes = fragment.sizes.clone();
    }
    if target.variants.is_empty() {
        target.variants = fragment.variants.clone();
    }
    if !target.price.is_observed() && fragment.price.is_observed() {
        target.price = fragment.price.clone();
    }
    if !target.stock.is_observed() {
        target.stock = fragment.stock;
    }

    fill(&mut target.title, &fragment.title);
    fill(&mut target.brand, &fragment.brand);
    fill(&mut target.description, &fragment.description);
    fill(&mut target.crowd, &fragment.crowd);
    fill(&mut target.rating, &fragment.rating);
    fill(&mut target.review_count, &fragment.review_count);
    if target.categories.is_empty() {
        target.categories = fragment.categories.clone();
    }
}
