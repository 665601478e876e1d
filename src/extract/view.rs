//! JSON view of a raw body
//!
//! Field rules never look at HTML directly. A body is first turned into one
//! JSON value: JSON bodies as-is, HTML bodies as their embedded JSON blob
//! plus named CSS selections under `/select/<name>`.

use crate::config::{compile_pattern, SelectRule, ViewRules};
use crate::extract::ExtractError;
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
struct Selection {
    name: String,
    selector: Selector,
    attr: Option<String>,
    all: bool,
}

/// Compiled form of [`ViewRules`]
#[derive(Debug, Clone)]
pub struct ViewBuilder {
    embedded_json: Option<Regex>,
    embedded_json_css: Option<Selector>,
    selections: Vec<Selection>,
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css)
        .map_err(|e| ConfigError::InvalidPattern(format!("selector '{}': {:?}", css, e)))
}

impl ViewBuilder {
    pub fn from_rules(rules: &ViewRules) -> Result<Self, ConfigError> {
        let selections = rules
            .select
            .iter()
            .map(|(name, rule): (&String, &SelectRule)| {
                Ok(Selection {
                    name: name.clone(),
                    selector: parse_selector(&rule.css)?,
                    attr: rule.attr.clone(),
                    all: rule.all,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            embedded_json: rules.embedded_json.as_deref().map(compile_pattern).transpose()?,
            embedded_json_css: rules
                .embedded_json_css
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            selections,
        })
    }

    /// Builds the view of `body`
    ///
    /// Bodies that parse as JSON are returned unchanged. Everything else is
    /// treated as HTML. A configured embedded-JSON rule that finds nothing is
    /// an error; malformed markup is not.
    pub fn build(&self, body: &str) -> Result<Value, ExtractError> {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                return Ok(value);
            }
        }

        let document = Html::parse_document(body);
        let mut root = Map::new();

        if let Some(blob) = self.embedded_blob(body, &document)? {
            match blob {
                Value::Object(map) => root.extend(map),
                other => {
                    root.insert("embedded".to_string(), other);
                }
            }
        }

        if !self.selections.is_empty() {
            let mut selected = Map::new();
            for selection in &self.selections {
                let values: Vec<Value> = document
                    .select(&selection.selector)
                    .filter_map(|element| read_element(element, selection.attr.as_deref()))
                    .map(Value::String)
                    .collect();

                let value = if selection.all {
                    Value::Array(values)
                } else {
                    values.into_iter().next().unwrap_or(Value::Null)
                };
                selected.insert(selection.name.clone(), value);
            }
            root.insert("select".to_string(), Value::Object(selected));
        }

        Ok(Value::Object(root))
    }

    fn embedded_blob(&self, body: &str, document: &Html) -> Result<Option<Value>, ExtractError> {
        if let Some(pattern) = &self.embedded_json {
            let captured = pattern
                .captures(body)
                .and_then(|caps| caps.get(1))
                .ok_or_else(|| ExtractError::MissingField("embedded-json".to_string()))?;
            return Ok(Some(serde_json::from_str(captured.as_str())?));
        }

        if let Some(selector) = &self.embedded_json_css {
            let text = document
                .select(selector)
                .next()
                .map(|element| element.text().collect::<String>())
                .ok_or_else(|| ExtractError::MissingField("embedded-json-css".to_string()))?;
            return Ok(Some(serde_json::from_str(text.trim())?));
        }

        Ok(None)
    }
}

fn read_element(element: ElementRef<'_>, attr: Option<&str>) -> Option<String> {
    let raw = match attr {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element.text().collect::<Vec<_>>().join(" "),
    };

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Reads a pointer, treating JSON `null` as absent
pub fn lookup<'a>(view: &'a Value, pointer: &str) -> Option<&'a Value> {
    view.pointer(pointer).filter(|value| !value.is_null())
}

/// Scalar as text; arrays yield their first scalar
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.iter().find_map(as_text),
        _ => None,
    }
}

/// Every scalar of an array (or the one scalar) as text
pub fn as_text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        other => as_text(other).into_iter().collect(),
    }
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '-')
                .collect();
            digits.parse().ok()
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Loose truthiness for availability flags ("true", "InStock", 1, ...)
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f > 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            let s = s.rsplit('/').next().unwrap_or(&s).to_string();
            match s.as_str() {
                "true" | "yes" | "y" | "1" | "instock" | "in_stock" | "in stock" | "available" => {
                    Some(true)
                }
                "false" | "no" | "n" | "0" | "outofstock" | "out_of_stock" | "out of stock"
                | "soldout" | "sold out" | "unavailable" => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}
