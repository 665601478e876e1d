use crate::crawler::site::Site;
use crate::crawler::transport::{FetchedResponse, RequestSpec, Transport};
use crate::output::CrawlStats;
use crate::{StepError, StepResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-session state shared by every step of that session
///
/// Owns the session's transport (and with it the cookie jar) and the
/// cancellation token every fetch races against.
#[derive(Clone)]
pub struct SessionContext {
    pub id: Arc<str>,
    pub site: Arc<Site>,
    pub transport: Arc<dyn Transport>,
    pub cancel: CancellationToken,
    pub config_hash: Arc<str>,
    pub max_subfetches: usize,
    pub max_pages: Option<u32>,
    pub max_records: Option<u64>,
    pub stats: Arc<CrawlStats>,
}

impl SessionContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetches through the session transport, abandoning the request on cancel
    ///
    /// Transport failures become `TransientFetch`; HTTP statuses are left to
    /// the caller.
    pub async fn fetch(&self, spec: &RequestSpec) -> StepResult<FetchedResponse> {
        if self.cancel.is_cancelled() {
            return Err(StepError::cancelled(&spec.url));
        }

        self.stats.fetched();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StepError::cancelled(&spec.url)),
            result = self.transport.fetch(spec) => {
                result.map_err(|e| StepError::transient(&spec.url, None, e))
            }
        }
    }

    /// Rejects bodies that are block pages or otherwise not genuine
    ///
    /// # Arguments
    ///
    /// * `response` - The response to check
    /// * `marker` - Substring a genuine body must contain, if any
    pub fn check_genuine(&self, response: &FetchedResponse, marker: Option<&str>) -> StepResult<()> {
        if !response.is_success() {
            return Err(StepError::transient(
                &response.url,
                Some(response.status),
                format!("HTTP {}", response.status),
            ));
        }
        if let Some(found) = self.site.block_marker(&response.body) {
            return Err(StepError::transient(
                &response.url,
                Some(response.status),
                format!("block page ('{}')", found),
            ));
        }
        if let Some(marker) = marker {
            if !response.body.contains(marker) {
                return Err(StepError::transient(
                    &response.url,
                    Some(response.status),
                    format!("marker '{}' missing from body", marker),
                ));
            }
        }
        Ok(())
    }
}
