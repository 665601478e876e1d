//! Extractor contract and the rule-driven default extractor
//!
//! An extractor turns one raw body into an [`IntermediateRecord`]. It must
//! never panic on malformed input; failures come back as [`ExtractError`].
//! For a detail step it must produce identity and title; for a listing step
//! item links plus a pagination descriptor.

mod record;
mod rules;
mod view;

pub use record::{
    AxisOption, IntermediateRecord, Pagination, RawAmount, RawMediaRef, RawPrice, RawVariant,
    StockSignal,
};
pub use rules::RuleExtractor;
pub use view::{as_bool, as_f64, as_i64, as_text, as_text_list, lookup, ViewBuilder};

use thiserror::Error;

/// What kind of body is being extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind<'a> {
    Listing,
    Detail,
    /// A dependent sub-fetch, by its configured name
    SubResource(&'a str),
}

impl ExtractKind<'_> {
    pub fn source_name(&self) -> &str {
        match self {
            Self::Listing => "listing",
            Self::Detail => "detail",
            Self::SubResource(name) => name,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Required field missing: {0}")]
    MissingField(String),

    #[error("Malformed body: {0}")]
    Malformed(String),

    #[error("Embedded JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No rules for sub-resource '{0}'")]
    UnknownResource(String),
}

/// Site-specific parse of a body into an intermediate record
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str, kind: ExtractKind<'_>) -> Result<IntermediateRecord, ExtractError>;
}
