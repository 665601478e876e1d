//! Price math in integer minor units
//!
//! `msrp` falls back to `current` whenever no usable list price exists, so a
//! discount is never negative and never computed against zero.

use crate::config::PriceUnit;
use crate::extract::RawPrice;
use crate::model::Price;

/// Parses a printed amount into minor units (two decimal places)
///
/// Handles thousands separators and either `,` or `.` as the decimal mark:
/// a last separator followed by one or two digits is decimal, followed by
/// three digits it is a thousands separator. Negative or empty amounts are
/// rejected.
pub fn parse_amount(raw: &str, unit: PriceUnit) -> Option<i64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();

    if kept.is_empty() || kept.contains('-') {
        return None;
    }

    if unit == PriceUnit::Minor {
        let digits: String = kept.chars().filter(char::is_ascii_digit).collect();
        return digits.parse().ok();
    }

    let (whole, fraction) = match kept.rfind(|c: char| c == ',' || c == '.') {
        Some(pos) => {
            let tail = &kept[pos + 1..];
            if (1..=2).contains(&tail.len()) {
                (&kept[..pos], tail)
            } else {
                (kept.as_str(), "")
            }
        }
        None => (kept.as_str(), ""),
    };

    let whole_digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if whole_digits.is_empty() && fraction.is_empty() {
        return None;
    }

    let whole: i64 = if whole_digits.is_empty() {
        0
    } else {
        whole_digits.parse().ok()?
    };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    whole.checked_mul(100)?.checked_add(cents)
}

/// `round((msrp - current) / msrp * 100)`, half rounding up; 0 when `msrp <= 0`
pub fn discount_percent(current: i64, msrp: i64) -> u8 {
    if msrp <= 0 || current >= msrp {
        return 0;
    }

    let diff = i128::from(msrp - current.max(0));
    let msrp = i128::from(msrp);
    let rounded = (diff * 200 + msrp) / (msrp * 2);

    rounded.clamp(0, 100) as u8
}

/// Builds a price, defaulting `msrp` to `current` when absent, zero or lower
pub fn build_price(current: i64, msrp: Option<i64>, currency: &str) -> Price {
    let current = current.max(0);
    let msrp = match msrp {
        Some(msrp) if msrp > 0 && msrp >= current => msrp,
        _ => current,
    };

    Price {
        currency: currency.to_string(),
        current_minor_units: current,
        msrp_minor_units: msrp,
        discount_percent: discount_percent(current, msrp),
    }
}

/// Interprets a raw price; `None` when no current amount can be parsed
pub fn resolve_price(raw: &RawPrice, default_currency: &str, unit: PriceUnit) -> Option<Price> {
    let current = raw.current.as_deref().and_then(|c| parse_amount(c, unit))?;
    let msrp = raw.msrp.as_deref().and_then(|m| parse_amount(m, unit));
    let currency = raw
        .currency
        .as_deref()
        .filter(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()))
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| default_currency.to_string());

    Some(build_price(current, msrp, &currency))
}
