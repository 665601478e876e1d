//! Canonical product model
//!
//! These types are the wire and storage contract downstream consumers read.
//! Field names and enum values are fixed; renaming any of them requires a
//! bump of [`SCHEMA_VERSION`].

mod product;

pub use product::{
    Media, Price, Product, ProductDocument, Sku, SpecOption, SpecType, Stock, StockStatus,
    MAX_CATEGORIES, SCHEMA_VERSION,
};
