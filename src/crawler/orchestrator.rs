//! Dependent-fetch orchestration for detail steps
//!
//! A detail page rarely holds everything: per-color image sets, inventory
//! and prices often live behind further requests whose URLs are built from
//! values found on the page. Dependents run as sequential stages in config
//! order, so a later stage can use variables scraped by an earlier one.
//! Within a stage, an `each` dependent fans out one fetch per distinct value
//! with bounded concurrency.
//!
//! Any sub-fetch failure aborts the whole detail step; in-flight siblings are
//! dropped with it.

use crate::config::DependentFetchConfig;
use crate::crawler::session::SessionContext;
use crate::crawler::transport::{FetchedResponse, RequestSpec};
use crate::extract::{ExtractKind, IntermediateRecord};
use crate::{StepError, StepResult};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;

/// Template variables visible to dependent URL templates
pub type TemplateVars = BTreeMap<String, Vec<String>>;

/// Built-in variables plus the ones the shell record extracted
///
/// Built-ins: `url` (final detail URL), `id` (source identity) and
/// `color-codes` (distinct color codes).
pub fn initial_vars(detail_url: &str, shell: &IntermediateRecord) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("url".to_string(), vec![detail_url.to_string()]);

    let ids: Vec<String> = match &shell.identity_id {
        Some(id) => vec![id.clone()],
        None => shell
            .group
            .iter()
            .filter_map(|member| member.identity_id.clone())
            .collect(),
    };
    if !ids.is_empty() {
        vars.insert("id".to_string(), ids);
    }

    let mut colors = shell.color_codes();
    for member in &shell.group {
        for code in member.color_codes() {
            if !colors.contains(&code) {
                colors.push(code);
            }
        }
    }
    if !colors.is_empty() {
        vars.insert("color-codes".to_string(), colors);
    }

    merge_vars(&mut vars, &shell.vars);
    vars
}

fn merge_vars(into: &mut TemplateVars, from: &BTreeMap<String, Vec<String>>) {
    for (name, values) in from {
        let entry = into.entry(name.clone()).or_default();
        for value in values {
            if !entry.contains(value) {
                entry.push(value.clone());
            }
        }
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Expands `{name}` placeholders; `{each}` takes `each`
///
/// A variable with several values expands to its first. Returns the name of
/// the first variable that has no value.
pub fn render_template(
    template: &str,
    vars: &TemplateVars,
    each: Option<&str>,
) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let name = &after[..end];
        let value = if name == "each" {
            each
        } else {
            vars.get(name).and_then(|values| values.first()).map(String::as_str)
        };
        match value {
            Some(value) => out.push_str(&encode(value)),
            None => return Err(name.to_string()),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Runs every dependent fetch of one detail step
///
/// # Arguments
///
/// * `ctx` - Session context (transport, cancellation, limits)
/// * `parent` - The detail response; its URL is every sub-fetch's Referer
/// * `shell` - Record extracted from the detail body
///
/// # Returns
///
/// * `Ok(fragments)` - One record per sub-fetch, fan-out values in order
/// * `Err(StepError)` - The first sub-fetch failure; the step is aborted
pub async fn gather_dependents(
    ctx: &SessionContext,
    parent: &FetchedResponse,
    shell: &IntermediateRecord,
) -> StepResult<Vec<IntermediateRecord>> {
    let mut vars = initial_vars(&parent.url, shell);
    let mut fragments = Vec::new();

    for dependent in &ctx.site.config.dependents {
        let stage = run_stage(ctx, parent, dependent, &vars).await?;
        for fragment in &stage {
            merge_vars(&mut vars, &fragment.vars);
        }
        fragments.extend(stage);
    }

    Ok(fragments)
}

async fn run_stage(
    ctx: &SessionContext,
    parent: &FetchedResponse,
    dependent: &DependentFetchConfig,
    vars: &TemplateVars,
) -> StepResult<Vec<IntermediateRecord>> {
    let Some(each) = dependent.each.as_deref() else {
        let fragment = fetch_one(ctx, parent, dependent, vars, None).await?;
        return Ok(vec![fragment]);
    };

    let values: Vec<String> = vars.get(each).cloned().unwrap_or_default();
    if values.is_empty() {
        tracing::debug!(
            "Skipping dependent '{}' for {}: no values for '{}'",
            dependent.name,
            parent.url,
            each
        );
        return Ok(Vec::new());
    }

    tracing::debug!(
        "Fanning out '{}' over {} values of '{}'",
        dependent.name,
        values.len(),
        each
    );

    stream::iter(values)
        .map(|value| async move { fetch_one(ctx, parent, dependent, vars, Some(value)).await })
        .buffered(ctx.max_subfetches.max(1))
        .try_collect()
        .await
}

async fn fetch_one(
    ctx: &SessionContext,
    parent: &FetchedResponse,
    dependent: &DependentFetchConfig,
    vars: &TemplateVars,
    each: Option<String>,
) -> StepResult<IntermediateRecord> {
    let url = render_template(&dependent.url, vars, each.as_deref()).map_err(|missing| {
        StepError::parse(
            &parent.url,
            format!(
                "dependent '{}' needs variable '{}' which the page did not provide",
                dependent.name, missing
            ),
        )
    })?;

    let mut spec = RequestSpec::get(url).with_referer(&parent.url);
    for (name, value) in &dependent.headers {
        spec = spec.with_header(name.clone(), value.clone());
    }

    let response = ctx.fetch(&spec).await?;
    ctx.check_genuine(&response, dependent.marker.as_deref())?;

    let mut fragment = ctx
        .site
        .extractor
        .extract(&response.body, ExtractKind::SubResource(&dependent.name))
        .map_err(|e| StepError::parse(&response.url, e))?;
    fragment.variant_key = each;

    Ok(fragment)
}
