//! Stock derivation
//!
//! Fail-closed: without an explicit positive signal a SKU is out of stock.
//! Price presence is never taken as a signal.

use crate::extract::StockSignal;
use crate::model::{Stock, StockStatus};

/// Turns one observed signal into a stock value
///
/// In stock iff `quantity > 0` or the availability flag is `true`. A bare
/// flag carries no count, so `count` is then 0.
pub fn derive_stock(signal: &StockSignal) -> Stock {
    let count = signal.quantity.unwrap_or(0).max(0);
    let in_stock = count > 0 || signal.available == Some(true);

    Stock {
        status: if in_stock {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        },
        count,
    }
}

/// Picks the most specific observed signal, most specific first
///
/// Callers pass variant row, size option, color option and product signals
/// in that order; unobserved signals are skipped.
pub fn most_specific<'a, I>(signals: I) -> Stock
where
    I: IntoIterator<Item = Option<&'a StockSignal>>,
{
    signals
        .into_iter()
        .flatten()
        .find(|signal| signal.is_observed())
        .map(derive_stock)
        .unwrap_or_else(Stock::out_of_stock)
}
