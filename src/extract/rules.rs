use crate::config::{
    AxisRule, DetailRules, ListingRules, MediaRule, PriceRule, SiteConfig, StockRule, VariantRule,
};
use crate::extract::view::{as_bool, as_f64, as_i64, as_text, as_text_list, lookup, ViewBuilder};
use crate::extract::{
    AxisOption, ExtractError, ExtractKind, Extractor, IntermediateRecord, Pagination,
    RawMediaRef, RawPrice, RawVariant, StockSignal,
};
use crate::ConfigError;
use serde_json::Value;
use std::collections::HashMap;

/// Extractor driven entirely by a site's `[site.listing]`, `[site.detail]`
/// and `[[site.dependent]]` rules
#[derive(Debug, Clone)]
pub struct RuleExtractor {
    listing: (ViewBuilder, ListingRules),
    detail: (ViewBuilder, DetailRules),
    dependents: HashMap<String, (ViewBuilder, DetailRules)>,
}

impl RuleExtractor {
    pub fn from_site(site: &SiteConfig) -> Result<Self, ConfigError> {
        let dependents = site
            .dependents
            .iter()
            .map(|dep| {
                Ok((
                    dep.name.clone(),
                    (ViewBuilder::from_rules(&dep.rules.view)?, dep.rules.clone()),
                ))
            })
            .collect::<Result<HashMap<_, _>, ConfigError>>()?;

        Ok(Self {
            listing: (ViewBuilder::from_rules(&site.listing.view)?, site.listing.clone()),
            detail: (ViewBuilder::from_rules(&site.detail.view)?, site.detail.clone()),
            dependents,
        })
    }

    fn extract_listing(&self, body: &str) -> Result<IntermediateRecord, ExtractError> {
        let (builder, rules) = &self.listing;
        let view = builder.build(body)?;
        let mut record = IntermediateRecord::new("listing");

        if let Some(items) = rules.links.as_deref().and_then(|p| lookup(&view, p)) {
            record.links = match (items, rules.link_field.as_deref()) {
                (Value::Array(items), Some(field)) => items
                    .iter()
                    .filter_map(|item| lookup(item, field).and_then(as_text))
                    .collect(),
                (other, _) => as_text_list(other),
            };
        }

        if let (Some(pointer), Some(template)) =
            (rules.item_ids.as_deref(), rules.detail_url_template.as_deref())
        {
            if let Some(ids) = lookup(&view, pointer) {
                record.links.extend(
                    as_text_list(ids)
                        .into_iter()
                        .map(|id| template.replace("{id}", &id)),
                );
            }
        }

        let number = |pointer: &Option<String>| {
            pointer
                .as_deref()
                .and_then(|p| lookup(&view, p))
                .and_then(as_i64)
                .and_then(|n| u64::try_from(n).ok())
        };

        record.pagination = Pagination {
            total_records: number(&rules.total_records),
            total_pages: number(&rules.total_pages),
            page_size: number(&rules.page_size),
            current_page: number(&rules.current_page),
            next_link: rules
                .next_link
                .as_deref()
                .and_then(|p| lookup(&view, p))
                .and_then(as_text),
        };

        Ok(record)
    }

    fn extract_detail(
        &self,
        body: &str,
        source: &str,
        (builder, rules): &(ViewBuilder, DetailRules),
        required: bool,
    ) -> Result<IntermediateRecord, ExtractError> {
        let view = builder.build(body)?;

        let mut record = read_product(&view, rules, source);
        record.vars = rules
            .vars
            .iter()
            .filter_map(|(name, pointer)| {
                lookup(&view, pointer).map(|value| (name.clone(), as_text_list(value)))
            })
            .filter(|(_, values)| !values.is_empty())
            .collect();

        if let Some(pointer) = rules.records.as_deref() {
            let members = match lookup(&view, pointer) {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(ExtractError::Malformed(format!(
                        "'{}' is not an array",
                        pointer
                    )))
                }
                None if required => return Err(ExtractError::MissingField(pointer.to_string())),
                None => return Ok(record),
            };

            record.group = members
                .iter()
                .map(|item| read_product(item, rules, source))
                .collect();

            if required {
                if record.group.is_empty() {
                    return Err(ExtractError::MissingField(format!("{} (empty)", pointer)));
                }
                for member in &record.group {
                    check_required(member, rules)?;
                }
            }
        } else if required {
            check_required(&record, rules)?;
        }

        Ok(record)
    }
}

impl Extractor for RuleExtractor {
    fn extract(&self, body: &str, kind: ExtractKind<'_>) -> Result<IntermediateRecord, ExtractError> {
        match kind {
            ExtractKind::Listing => self.extract_listing(body),
            ExtractKind::Detail => self.extract_detail(body, "detail", &self.detail, true),
            ExtractKind::SubResource(name) => {
                let rules = self
                    .dependents
                    .get(name)
                    .ok_or_else(|| ExtractError::UnknownResource(name.to_string()))?;
                self.extract_detail(body, name, rules, false)
            }
        }
    }
}

fn check_required(record: &IntermediateRecord, rules: &DetailRules) -> Result<(), ExtractError> {
    if record.title.is_none() {
        return Err(ExtractError::MissingField(
            rules.title.clone().unwrap_or_else(|| "title".to_string()),
        ));
    }
    if let Some(pointer) = &rules.id {
        if record.identity_id.is_none() {
            return Err(ExtractError::MissingField(pointer.clone()));
        }
    }
    Ok(())
}

fn text_at(view: &Value, pointer: &Option<String>) -> Option<String> {
    pointer.as_deref().and_then(|p| lookup(view, p)).and_then(as_text)
}

fn read_product(view: &Value, rules: &DetailRules, source: &str) -> IntermediateRecord {
    let mut record = IntermediateRecord::new(source);

    record.identity_id = text_at(view, &rules.id);
    record.title = text_at(view, &rules.title);
    record.url = text_at(view, &rules.url);
    record.brand = text_at(view, &rules.brand);
    record.description = text_at(view, &rules.description);
    record.crowd = text_at(view, &rules.crowd);
    record.rating = rules
        .rating
        .as_deref()
        .and_then(|p| lookup(view, p))
        .and_then(as_f64);
    record.review_count = rules
        .review_count
        .as_deref()
        .and_then(|p| lookup(view, p))
        .and_then(as_i64)
        .and_then(|n| u64::try_from(n).ok());

    if let Some(value) = rules.categories.as_deref().and_then(|p| lookup(view, p)) {
        record.categories = match value {
            Value::String(path) => path
                .split('>')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            other => as_text_list(other),
        };
    }

    if let Some(rule) = &rules.colors {
        record.colors = read_axis(view, rule);
    }
    if let Some(rule) = &rules.sizes {
        record.sizes = read_axis(view, rule);
    }
    if let Some(rule) = &rules.variants {
        record.variants = read_variants(view, rule);
    }
    record.price = read_price(view, &rules.price);
    record.stock = read_stock(view, &rules.stock);
    if let Some(rule) = &rules.media {
        record.media = read_media(view, rule);
    }

    record
}

fn items<'a>(view: &'a Value, pointer: &str) -> &'a [Value] {
    match lookup(view, pointer) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn read_price(item: &Value, rule: &PriceRule) -> RawPrice {
    RawPrice {
        current: text_at(item, &rule.current),
        msrp: text_at(item, &rule.msrp),
        currency: text_at(item, &rule.currency),
    }
}

fn read_stock(item: &Value, rule: &StockRule) -> StockSignal {
    StockSignal {
        quantity: rule
            .quantity
            .as_deref()
            .and_then(|p| lookup(item, p))
            .and_then(as_i64),
        available: rule
            .available
            .as_deref()
            .and_then(|p| lookup(item, p))
            .and_then(as_bool),
    }
}

fn read_axis(view: &Value, rule: &AxisRule) -> Vec<AxisOption> {
    items(view, &rule.list)
        .iter()
        .filter_map(|item| {
            let code = lookup(item, &rule.code).and_then(as_text)?;
            Some(AxisOption {
                code,
                name: text_at(item, &rule.name),
                price: read_price(item, &rule.price),
                stock: read_stock(item, &rule.stock),
            })
        })
        .collect()
}

fn read_variants(view: &Value, rule: &VariantRule) -> Vec<RawVariant> {
    items(view, &rule.list)
        .iter()
        .map(|item| RawVariant {
            source_id: text_at(item, &rule.id),
            color: text_at(item, &rule.color),
            size: text_at(item, &rule.size),
            price: read_price(item, &rule.price),
            stock: read_stock(item, &rule.stock),
        })
        .collect()
}

fn read_media(view: &Value, rule: &MediaRule) -> Vec<RawMediaRef> {
    items(view, &rule.list)
        .iter()
        .filter_map(|item| {
            let url = lookup(item, &rule.url).and_then(as_text)?;
            Some(RawMediaRef {
                url,
                variant_key: text_at(item, &rule.variant),
            })
        })
        .collect()
}
