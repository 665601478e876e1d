use crate::config::PriceUnit;
use crate::extract::{AxisOption, IntermediateRecord, RawPrice, StockSignal};
use crate::model::{Price, Sku, SpecOption};
use crate::normalize::media::MediaSets;
use crate::normalize::price::{build_price, resolve_price};
use crate::normalize::stock::most_specific;
use std::collections::HashSet;

/// Inputs shared by every SKU of one product
pub struct SkuContext<'a> {
    pub product_id: &'a str,
    pub currency: &'a str,
    pub price_unit: PriceUnit,
    pub media: &'a MediaSets,
}

/// SKUs of one product plus what had to be degraded or dropped
#[derive(Debug, Default)]
pub struct SkuBuild {
    pub skus: Vec<Sku>,
    pub warnings: Vec<String>,
    pub duplicates: usize,
}

struct Candidate<'a> {
    source_id: Option<String>,
    color: Option<(String, Option<&'a AxisOption>)>,
    size: Option<(String, Option<&'a AxisOption>)>,
    price: Option<&'a RawPrice>,
    stock: Option<&'a StockSignal>,
}

fn find_option<'a>(options: &'a [AxisOption], code: &str) -> Option<&'a AxisOption> {
    options.iter().find(|option| option.code == code)
}

fn spec_name(code: &str, option: Option<&AxisOption>) -> String {
    option
        .and_then(|o| o.name.clone())
        .unwrap_or_else(|| code.to_string())
}

/// Builds the SKUs of one (already merged) product record
///
/// Explicit variant rows win. Otherwise every color is crossed with every
/// size; a missing axis is absent, never a placeholder. A record with no
/// axes at all yields one spec-less SKU when it carries a product price.
pub fn build_skus(record: &IntermediateRecord, ctx: &SkuContext<'_>) -> SkuBuild {
    let candidates = candidates(record);
    let mut build = SkuBuild::default();
    let mut keys: HashSet<(Option<String>, Option<String>)> = HashSet::new();

    for candidate in candidates {
        let color_code = candidate.color.as_ref().map(|(code, _)| code.clone());
        let size_code = candidate.size.as_ref().map(|(code, _)| code.clone());
        let key = (color_code.clone(), size_code.clone());

        if !keys.insert(key) {
            build.duplicates += 1;
            build.warnings.push(format!(
                "duplicate SKU (color {:?}, size {:?}) dropped for {}",
                color_code, size_code, ctx.product_id
            ));
            continue;
        }

        let color_option = candidate.color.as_ref().and_then(|(_, option)| *option);
        let size_option = candidate.size.as_ref().and_then(|(_, option)| *option);

        let price = [
            candidate.price,
            size_option.map(|o| &o.price),
            color_option.map(|o| &o.price),
            Some(&record.price),
        ]
        .into_iter()
        .flatten()
        .find_map(|raw| resolve_price(raw, ctx.currency, ctx.price_unit));

        let price: Price = match price {
            Some(price) => price,
            None => {
                build.warnings.push(format!(
                    "no parseable price for SKU (color {:?}, size {:?}) of {}",
                    color_code, size_code, ctx.product_id
                ));
                build_price(0, None, ctx.currency)
            }
        };

        let stock = most_specific([
            candidate.stock,
            size_option.map(|o| &o.stock),
            color_option.map(|o| &o.stock),
            Some(&record.stock),
        ]);

        let mut specs = Vec::with_capacity(2);
        if let Some((code, option)) = &candidate.color {
            specs.push(SpecOption::color(code.clone(), spec_name(code, *option)));
        }
        if let Some((code, option)) = &candidate.size {
            specs.push(SpecOption::size(code.clone(), spec_name(code, *option)));
        }

        let source_id = candidate.source_id.unwrap_or_else(|| {
            [Some(ctx.product_id.to_string()), color_code.clone(), size_code.clone()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("-")
        });

        build.skus.push(Sku {
            source_id,
            specs,
            price,
            stock,
            media: ctx.media.for_variant(color_code.as_deref()),
        });
    }

    build
}

fn candidates(record: &IntermediateRecord) -> Vec<Candidate<'_>> {
    if !record.variants.is_empty() {
        return record
            .variants
            .iter()
            .map(|row| Candidate {
                source_id: row.source_id.clone(),
                color: row
                    .color
                    .clone()
                    .map(|code| {
                        let option = find_option(&record.colors, &code);
                        (code, option)
                    }),
                size: row.size.clone().map(|code| {
                    let option = find_option(&record.sizes, &code);
                    (code, option)
                }),
                price: Some(&row.price),
                stock: Some(&row.stock),
            })
            .collect();
    }

    let colors: Vec<Option<&AxisOption>> = if record.colors.is_empty() {
        vec![None]
    } else {
        record.colors.iter().map(Some).collect()
    };
    let sizes: Vec<Option<&AxisOption>> = if record.sizes.is_empty() {
        vec![None]
    } else {
        record.sizes.iter().map(Some).collect()
    };

    if record.colors.is_empty() && record.sizes.is_empty() {
        if !record.price.is_observed() {
            return Vec::new();
        }
        return vec![Candidate {
            source_id: None,
            color: None,
            size: None,
            price: None,
            stock: None,
        }];
    }

    let mut out = Vec::with_capacity(colors.len() * sizes.len());
    for color in &colors {
        for size in &sizes {
            out.push(Candidate {
                source_id: None,
                color: color.map(|o| (o.code.clone(), Some(o))),
                size: size.map(|o| (o.code.clone(), Some(o))),
                price: None,
                stock: None,
            });
        }
    }
    out
}
