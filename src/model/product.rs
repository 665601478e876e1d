use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the serialized product document
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum number of category levels kept on a product
pub const MAX_CATEGORIES: usize = 4;

/// Canonical product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Identity key from the canonicalizer; stable across re-crawls
    pub identity: String,
    pub title: String,
    pub brand_name: String,
    pub description: String,
    /// Up to four category levels, outermost first
    pub category: Vec<String>,
    pub crowd_type: String,
    pub rating: f64,
    pub review_count: u64,
    /// Aggregate availability; in stock iff any SKU is
    pub stock: Stock,
    pub sku_items: Vec<Sku>,
    pub media: Vec<Media>,
}

impl Product {
    /// Recomputes the aggregate stock from the SKUs
    pub fn aggregate_stock(skus: &[Sku]) -> Stock {
        if skus.iter().any(|sku| sku.stock.is_in_stock()) {
            Stock {
                status: StockStatus::InStock,
                count: skus.iter().map(|sku| sku.stock.count).sum(),
            }
        } else {
            Stock::out_of_stock()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub source_id: String,
    /// At most one color and one size
    pub specs: Vec<SpecOption>,
    pub price: Price,
    pub stock: Stock,
    pub media: Vec<Media>,
}

impl Sku {
    fn spec_id(&self, spec_type: SpecType) -> Option<&str> {
        self.specs
            .iter()
            .find(|spec| spec.spec_type == spec_type)
            .map(|spec| spec.id.as_str())
    }

    pub fn color_id(&self) -> Option<&str> {
        self.spec_id(SpecType::Color)
    }

    pub fn size_id(&self) -> Option<&str> {
        self.spec_id(SpecType::Size)
    }

    /// The `(color, size)` pair no two SKUs of a product may share
    pub fn spec_key(&self) -> (Option<String>, Option<String>) {
        (
            self.color_id().map(str::to_string),
            self.size_id().map(str::to_string),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecType {
    Color,
    Size,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecOption {
    #[serde(rename = "type")]
    pub spec_type: SpecType,
    pub id: String,
    pub name: String,
}

impl SpecOption {
    pub fn color(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            spec_type: SpecType::Color,
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn size(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            spec_type: SpecType::Size,
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Price in minor currency units
///
/// `discount_percent` is always in `[0, 100]` and `msrp_minor_units` is never
/// below `current_minor_units`; see [`crate::normalize::price`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub currency: String,
    pub current_minor_units: i64,
    pub msrp_minor_units: i64,
    pub discount_percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub status: StockStatus,
    pub count: i64,
}

impl Stock {
    pub fn out_of_stock() -> Self {
        Self {
            status: StockStatus::OutOfStock,
            count: 0,
        }
    }

    pub fn is_in_stock(&self) -> bool {
        self.status == StockStatus::InStock
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// Stable key derived from the original URL
    pub key: String,
    pub original_url: String,
    pub large_url: String,
    pub medium_url: String,
    pub small_url: String,
    pub is_default: bool,
}

/// A product as delivered to consumers: the product plus crawl provenance
///
/// Within a session, products are ordered by `(ordinal, group_index)`. The
/// ordinal numbers the listing item, so all products of one group page share
/// it and `group_index` orders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDocument {
    pub schema_version: u32,
    pub site: String,
    pub session_id: String,
    /// Listing ordinal of the detail request that produced this product
    pub ordinal: Option<u64>,
    /// Position of this product among the siblings of one detail page
    pub group_index: u32,
    pub source_url: String,
    pub crawled_at: DateTime<Utc>,
    pub config_hash: String,
    #[serde(flatten)]
    pub product: Product,
}

impl ProductDocument {
    /// Position of this product in its session's emission order
    pub fn ordering_key(&self) -> (Option<u64>, u32) {
        (self.ordinal, self.group_index)
    }
}
