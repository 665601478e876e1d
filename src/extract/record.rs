use std::collections::BTreeMap;

/// A raw amount exactly as the source printed it ("79,99", "7999", "$1,299.00")
pub type RawAmount = String;

/// Raw price fields; interpretation happens in the normalizer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrice {
    pub current: Option<RawAmount>,
    pub msrp: Option<RawAmount>,
    pub currency: Option<String>,
}

impl RawPrice {
    pub fn is_observed(&self) -> bool {
        self.current.is_some()
    }
}

/// Availability as the source reports it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockSignal {
    pub quantity: Option<i64>,
    pub available: Option<bool>,
}

impl StockSignal {
    pub fn is_observed(&self) -> bool {
        self.quantity.is_some() || self.available.is_some()
    }
}

/// One value of a color or size axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisOption {
    pub code: String,
    pub name: Option<String>,
    pub price: RawPrice,
    pub stock: StockSignal,
}

/// One explicit SKU row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawVariant {
    pub source_id: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub price: RawPrice,
    pub stock: StockSignal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMediaRef {
    pub url: String,
    /// Variant key (usually the color code) the image belongs to
    pub variant_key: Option<String>,
}

/// Pagination descriptor of a listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagination {
    pub total_records: Option<u64>,
    pub total_pages: Option<u64>,
    pub page_size: Option<u64>,
    pub current_page: Option<u64>,
    pub next_link: Option<String>,
}

/// What an extractor produced from one body
///
/// Only the typed fields below are read by the normalizer; anything else a
/// site exposes stays behind the extractor. `vars` holds named values that
/// parameterize dependent sub-fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateRecord {
    /// Which body this came from: "listing", "detail" or a dependent's name
    pub source: String,

    pub identity_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub crowd: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,

    pub colors: Vec<AxisOption>,
    pub sizes: Vec<AxisOption>,
    pub variants: Vec<RawVariant>,
    pub price: RawPrice,
    pub stock: StockSignal,
    pub media: Vec<RawMediaRef>,

    /// Listing pages: item links, already absolute when templated
    pub links: Vec<String>,
    pub pagination: Pagination,

    pub vars: BTreeMap<String, Vec<String>>,

    /// Set on fragments fanned out per value (e.g. one image set per color)
    pub variant_key: Option<String>,

    /// Sibling products of a product-group page
    pub group: Vec<IntermediateRecord>,
}

impl IntermediateRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Distinct color codes, from the axis list and then from variant rows
    pub fn color_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        let from_axis = self.colors.iter().map(|c| c.code.clone());
        let from_rows = self.variants.iter().filter_map(|v| v.color.clone());

        for code in from_axis.chain(from_rows) {
            if !code.is_empty() && !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }

    /// The records that become products: the group members, or the record itself
    pub fn primaries(&self) -> Vec<&IntermediateRecord> {
        if self.group.is_empty() {
            vec![self]
        } else {
            self.group.iter().collect()
        }
    }
}
