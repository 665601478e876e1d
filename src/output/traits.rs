//! Sink traits and the values steps yield
//!
//! A step yields two kinds of values: follow-up requests, which go back into
//! the session's frontier, and product documents, which go to a consumer.
//! Both travel through [`Sink`]; the consumer end is a [`ProductSink`].

use crate::crawler::CrawlRequest;
use crate::model::ProductDocument;
use crate::{FailureKind, StepError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a consumer can reject a yielded value with
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Consumer rejected value: {0}")]
    Rejected(String),

    #[error("Consumer channel closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Sink task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// One value yielded by a step
#[derive(Debug, Clone)]
pub enum Yielded {
    /// A follow-up top-level request (detail page or next listing page)
    Request(CrawlRequest),
    /// A normalized product
    Product(ProductDocument),
}

/// Receives what a step yields, in order
///
/// The first error aborts the step: no further values are produced for it.
#[async_trait]
pub trait Sink: Send {
    async fn emit(&mut self, value: Yielded) -> SinkResult<()>;
}

/// One terminal step failure as it is reported and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub site: String,
    pub session_id: String,
    pub kind: FailureKind,
    pub url: String,
    /// Top-level request whose step failed, when `url` is a sub-fetch or
    /// redirect target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
    pub status: Option<u16>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn from_step_error(site: &str, session_id: &str, error: &StepError) -> Self {
        let status = match error {
            StepError::TransientFetch { status, .. } => *status,
            _ => None,
        };

        Self {
            site: site.to_string(),
            session_id: session_id.to_string(),
            kind: error.kind(),
            url: error.url().to_string(),
            parent_url: None,
            status,
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }

    /// Notes the step URL if the failure happened somewhere else
    pub fn with_step_url(mut self, step_url: &str) -> Self {
        if step_url != self.url {
            self.parent_url = Some(step_url.to_string());
        }
        self
    }
}

/// Downstream consumer of product documents and the failure log
///
/// Shared by all sessions of a run; implementations must be thread-safe.
#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Accepts one product document
    async fn put_product(&self, doc: &ProductDocument) -> SinkResult<()>;

    /// Records a terminal step failure
    async fn record_failure(&self, _failure: &FailureRecord) -> SinkResult<()> {
        Ok(())
    }

    /// Called once after the last session finished
    async fn finish(&self) -> SinkResult<()> {
        Ok(())
    }
}
