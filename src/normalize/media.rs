//! Media resolution, once per variant key
//!
//! A product's raw media refs are grouped by variant key (usually the color
//! code). Each distinct key is resolved exactly once no matter how many SKUs
//! share it.

use crate::config::MediaTemplates;
use crate::extract::RawMediaRef;
use crate::model::Media;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Turns the raw refs of one variant key into media
pub trait MediaResolver: Send + Sync {
    fn resolve(&self, variant_key: Option<&str>, refs: &[RawMediaRef]) -> Vec<Media>;
}

/// Derives size variants from the original URL via `{url}` templates
///
/// Missing templates fall back to the original URL.
#[derive(Debug, Clone, Default)]
pub struct TemplateMediaResolver {
    templates: MediaTemplates,
}

impl TemplateMediaResolver {
    pub fn new(templates: MediaTemplates) -> Self {
        Self { templates }
    }

    fn sized(template: &Option<String>, url: &str) -> String {
        match template {
            Some(template) => template.replace("{url}", url),
            None => url.to_string(),
        }
    }
}

/// Stable media key: the first 16 hex chars of the URL's SHA-256
pub fn media_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(16);
    key
}

impl MediaResolver for TemplateMediaResolver {
    fn resolve(&self, _variant_key: Option<&str>, refs: &[RawMediaRef]) -> Vec<Media> {
        let mut media: Vec<Media> = Vec::new();

        for raw in refs {
            let key = media_key(&raw.url);
            if media.iter().any(|m| m.key == key) {
                continue;
            }
            media.push(Media {
                key,
                original_url: raw.url.clone(),
                large_url: Self::sized(&self.templates.large, &raw.url),
                medium_url: Self::sized(&self.templates.medium, &raw.url),
                small_url: Self::sized(&self.templates.small, &raw.url),
                is_default: false,
            });
        }

        media
    }
}

/// Per-product media sets keyed by variant key
///
/// `None` is the product-level set for refs without a variant key.
pub struct MediaSets {
    sets: Vec<(Option<String>, Vec<Media>)>,
    resolutions: usize,
}

impl MediaSets {
    /// Groups refs by key and resolves each key once, in first-seen order
    pub fn resolve(resolver: &dyn MediaResolver, refs: &[RawMediaRef]) -> Self {
        let mut order: Vec<Option<String>> = Vec::new();
        let mut grouped: HashMap<Option<String>, Vec<RawMediaRef>> = HashMap::new();

        for raw in refs {
            let key = raw.variant_key.clone().filter(|k| !k.is_empty());
            if !grouped.contains_key(&key) {
                order.push(key.clone());
            }
            grouped.entry(key).or_default().push(raw.clone());
        }

        let mut sets = Vec::with_capacity(order.len());
        for key in order {
            let raws = grouped.remove(&key).unwrap_or_default();
            let mut media = resolver.resolve(key.as_deref(), &raws);
            if let Some(first) = media.first_mut() {
                first.is_default = true;
            }
            sets.push((key, media));
        }

        Self {
            resolutions: sets.len(),
            sets,
        }
    }

    /// Media for one SKU: its variant key's set, else the product-level set
    pub fn for_variant(&self, variant_key: Option<&str>) -> Vec<Media> {
        let find = |key: Option<&str>| {
            self.sets
                .iter()
                .find(|(k, _)| k.as_deref() == key)
                .map(|(_, media)| media.clone())
        };

        variant_key
            .and_then(|key| find(Some(key)))
            .or_else(|| find(None))
            .unwrap_or_default()
    }

    /// Every set flattened, deduplicated by media key
    pub fn all(&self) -> Vec<Media> {
        let mut all: Vec<Media> = Vec::new();
        for (_, media) in &self.sets {
            for item in media {
                if !all.iter().any(|m| m.key == item.key) {
                    all.push(item.clone());
                }
            }
        }
        all
    }

    /// How many times the resolver was called
    pub fn resolutions(&self) -> usize {
        self.resolutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw(url: &str, key: Option<&str>) -> RawMediaRef {
        RawMediaRef {
            url: url.to_string(),
            variant_key: key.map(str::to_string),
        }
    }

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl MediaResolver for CountingResolver {
        fn resolve(&self, key: Option<&str>, refs: &[RawMediaRef]) -> Vec<Media> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            TemplateMediaResolver::default().resolve(key, refs)
        }
    }

    #[test]
    fn test_one_resolution_per_variant_key() {
        let resolver = CountingResolver {
            calls: AtomicUsize::new(0),
        };
        let refs = vec![
            raw("https://img.example/030-1.jpg", Some("030")),
            raw("https://img.example/001-1.jpg", Some("001")),
            raw("https://img.example/030-2.jpg", Some("030")),
            raw("https://img.example/001-2.jpg", Some("001")),
        ];

        let sets = MediaSets::resolve(&resolver, &refs);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sets.resolutions(), 2);
        assert_eq!(sets.for_variant(Some("030")).len(), 2);
    }

    #[test]
    fn test_first_of_each_set_is_default() {
        let refs = vec![
            raw("https://img.example/a.jpg", Some("030")),
            raw("https://img.example/b.jpg", Some("030")),
            raw("https://img.example/c.jpg", Some("001")),
        ];
        let sets = MediaSets::resolve(&TemplateMediaResolver::default(), &refs);

        let navy = sets.for_variant(Some("030"));
        assert!(navy[0].is_default);
        assert!(!navy[1].is_default);
        assert!(sets.for_variant(Some("001"))[0].is_default);
    }

    #[test]
    fn test_unknown_variant_falls_back_to_product_set() {
        let refs = vec![raw("https://img.example/p.jpg", None)];
        let sets = MediaSets::resolve(&TemplateMediaResolver::default(), &refs);
        assert_eq!(sets.for_variant(Some("999")).len(), 1);
        assert_eq!(sets.for_variant(None).len(), 1);
    }

    #[test]
    fn test_templates_and_dedup() {
        let resolver = TemplateMediaResolver::new(MediaTemplates {
            large: Some("{url}?w=1200".to_string()),
            medium: None,
            small: Some("{url}?w=200".to_string()),
        });
        let media = resolver.resolve(
            None,
            &[raw("https://img.example/a.jpg", None), raw("https://img.example/a.jpg", None)],
        );

        assert_eq!(media.len(), 1);
        assert_eq!(media[0].large_url, "https://img.example/a.jpg?w=1200");
        assert_eq!(media[0].medium_url, "https://img.example/a.jpg");
        assert_eq!(media[0].key, media_key("https://img.example/a.jpg"));
        assert_eq!(media[0].key.len(), 16);
    }
}
