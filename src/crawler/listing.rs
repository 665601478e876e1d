//! Listing walk: one listing page per step
//!
//! Each step turns a listing page into detail requests (with strictly
//! increasing ordinals) and at most one next-page request. The walk stops
//! when the pagination descriptor says the last page was reached, when a
//! page yields no new items, or when a configured ceiling is hit.

use crate::config::PaginationStyle;
use crate::crawler::request::CrawlRequest;
use crate::crawler::session::SessionContext;
use crate::crawler::transport::{FetchedResponse, RequestSpec};
use crate::extract::{ExtractKind, Pagination};
use crate::output::{Sink, Yielded};
use crate::state::{Cursor, PageToken};
use crate::url::{normalize_url, resolve_link, CrawlUrlClass};
use crate::{StepError, StepResult};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Why a listing walk stopped after this page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The page offered no next-page link
    NoNextPage,
    /// The pagination descriptor says this was the last page
    LastPage,
    /// As many items were walked as the listing declares
    TotalRecordsReached,
    /// The page yielded no new items
    ZeroItems,
    PageCeiling,
    RecordCeiling,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoNextPage => "no next page",
            Self::LastPage => "last page",
            Self::TotalRecordsReached => "total records reached",
            Self::ZeroItems => "no new items",
            Self::PageCeiling => "page ceiling",
            Self::RecordCeiling => "record ceiling",
        };
        f.write_str(s)
    }
}

/// What one listing step produced
#[derive(Debug, Clone)]
pub struct ListingOutcome {
    /// Cursor after this page: ordinals advanced, new identities seen
    pub cursor: Cursor,
    /// Detail requests emitted
    pub emitted: u64,
    /// URL of the emitted next-page request, if any
    pub next_page: Option<String>,
    /// Set when the walk ends with this page
    pub termination: Option<Termination>,
}

/// Processes one listing page
///
/// # Arguments
///
/// * `ctx` - Session context
/// * `request` - The request that fetched this page; carries the cursor
/// * `response` - The listing response
/// * `sink` - Receives detail requests, then the next-page request
pub async fn walk_listing(
    ctx: &SessionContext,
    request: &CrawlRequest,
    response: &FetchedResponse,
    sink: &mut dyn Sink,
) -> StepResult<ListingOutcome> {
    let site = &ctx.site;
    let record = site
        .extractor
        .extract(&response.body, ExtractKind::Listing)
        .map_err(|e| StepError::parse(&response.url, e))?;
    let base = Url::parse(&response.url).map_err(|e| StepError::parse(&response.url, e))?;
    let cursor = &request.cursor;

    let remaining = ctx
        .max_records
        .map(|max| max.saturating_sub(cursor.records_walked()));

    let mut keys: Vec<String> = Vec::new();
    let mut page_keys: HashSet<String> = HashSet::new();
    let mut targets: Vec<Url> = Vec::new();
    let mut capped = false;

    for href in &record.links {
        let resolved = match resolve_link(&base, href) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping link '{}' on {}: {}", href, response.url, e);
                continue;
            }
        };

        let class = site.router.classify_url(&resolved);
        if class != CrawlUrlClass::Detail {
            tracing::debug!("Skipping {} link {}", class, resolved);
            continue;
        }

        let key = match site.canonicalizer.canonicalize(resolved.as_str()) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Skipping uncanonicalizable link {}: {}", resolved, e);
                continue;
            }
        };
        if cursor.has_seen(&key) || page_keys.contains(&key) {
            continue;
        }

        if remaining.map_or(false, |r| targets.len() as u64 >= r) {
            capped = true;
            break;
        }

        page_keys.insert(key.clone());
        keys.push(key);
        targets.push(resolved);
    }

    let first_ordinal = cursor.next_ordinal();
    let emitted = targets.len() as u64;
    let next_cursor = cursor.advance(emitted).with_seen(keys);

    for (i, target) in targets.iter().enumerate() {
        let spec = RequestSpec::get(target.as_str()).with_referer(&response.url);
        let detail = CrawlRequest::new(spec, next_cursor.clone(), Some(first_ordinal + i as u64));
        sink.emit(Yielded::Request(detail))
            .await
            .map_err(|e| StepError::sink(&response.url, e))?;
    }

    let ceiling_hit = capped || remaining.map_or(false, |r| emitted >= r);

    let stop = if emitted == 0 {
        Some(Termination::ZeroItems)
    } else if ceiling_hit {
        Some(Termination::RecordCeiling)
    } else if ctx
        .max_pages
        .map_or(false, |max| cursor.pages_walked().saturating_add(1) >= max)
    {
        Some(Termination::PageCeiling)
    } else if record
        .pagination
        .total_records
        .map_or(false, |total| next_cursor.records_walked() >= total)
    {
        Some(Termination::TotalRecordsReached)
    } else {
        None
    };

    let mut outcome = ListingOutcome {
        cursor: next_cursor,
        emitted,
        next_page: None,
        termination: stop,
    };
    if stop.is_some() {
        return Ok(outcome);
    }

    match next_page(ctx, cursor, &base, &record.pagination, record.links.len()) {
        Ok((url, token)) => {
            let spec = RequestSpec::get(url.clone()).with_referer(&response.url);
            let next = CrawlRequest::new(spec, outcome.cursor.with_page(token), None);
            sink.emit(Yielded::Request(next))
                .await
                .map_err(|e| StepError::sink(&response.url, e))?;
            outcome.next_page = Some(url);
        }
        Err(termination) => outcome.termination = Some(termination),
    }

    Ok(outcome)
}

/// Works out the next page's URL and token, or why there is none
fn next_page(
    ctx: &SessionContext,
    cursor: &Cursor,
    base: &Url,
    pagination: &Pagination,
    items_on_page: usize,
) -> Result<(String, PageToken), Termination> {
    let config = &ctx.site.config.pagination;
    let page_size = pagination.page_size.or(config.page_size);

    match config.style {
        PaginationStyle::Offset => {
            let param = config.param.as_deref().ok_or(Termination::NoNextPage)?;
            let current = match cursor.page_token() {
                PageToken::Offset(offset) => *offset,
                _ => query_number(base, param).unwrap_or(0),
            };
            let step = page_size.unwrap_or(items_on_page as u64);
            if step == 0 {
                return Err(Termination::ZeroItems);
            }
            if let Some(total) = pagination.total_records {
                if current.saturating_add(step) >= total {
                    return Err(Termination::LastPage);
                }
            }

            let next = current + step;
            Ok((
                with_query_param(base, param, &next.to_string()),
                PageToken::Offset(next),
            ))
        }
        PaginationStyle::Page => {
            let param = config.param.as_deref().ok_or(Termination::NoNextPage)?;
            let current = pagination
                .current_page
                .or(match cursor.page_token() {
                    PageToken::Page(page) => Some(u64::from(*page)),
                    _ => None,
                })
                .or_else(|| query_number(base, param))
                .unwrap_or(1)
                .max(1);

            if pagination.total_pages.map_or(false, |total| current >= total) {
                return Err(Termination::LastPage);
            }
            if let (Some(total), Some(size)) = (pagination.total_records, page_size) {
                if current.saturating_mul(size) >= total {
                    return Err(Termination::LastPage);
                }
            }

            let next = current + 1;
            let token = u32::try_from(next).map_err(|_| Termination::LastPage)?;
            Ok((
                with_query_param(base, param, &next.to_string()),
                PageToken::Page(token),
            ))
        }
        PaginationStyle::Link => {
            let link = pagination
                .next_link
                .as_deref()
                .ok_or(Termination::NoNextPage)?;
            let resolved = resolve_link(base, link).map_err(|_| Termination::NoNextPage)?;

            let same_page = match (normalize_url(resolved.as_str()), normalize_url(base.as_str())) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            if same_page {
                return Err(Termination::LastPage);
            }

            let url = resolved.to_string();
            Ok((url.clone(), PageToken::Link(url)))
        }
    }
}

fn query_number(url: &Url, param: &str) -> Option<u64> {
    url.query_pairs()
        .find(|(k, _)| k == param)
        .and_then(|(_, v)| v.trim().parse().ok())
}

/// Returns `url` with `param` set to `value`, other parameters untouched
fn with_query_param(url: &Url, param: &str, value: &str) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match pairs.iter_mut().find(|(k, _)| k == param) {
        Some(pair) => pair.1 = value.to_string(),
        None => pairs.push((param.to_string(), value.to_string())),
    }

    let mut next = url.clone();
    next.query_pairs_mut().clear().extend_pairs(pairs);
    next.to_string()
}
