use crate::crawler::transport::RequestSpec;
use crate::state::Cursor;

/// A top-level request waiting in a session's frontier
///
/// Carries the cursor by value; the step that handles the response reads it
/// and hands a new one to whatever it yields.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub spec: RequestSpec,
    pub cursor: Cursor,
    /// Listing ordinal, set on detail requests emitted from a listing page
    pub ordinal: Option<u64>,
    /// How many times this request has already failed transiently
    pub attempt: u32,
}

impl CrawlRequest {
    /// The first request of a session
    pub fn seed(url: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            spec: RequestSpec::get(url),
            cursor,
            ordinal: None,
            attempt: 0,
        }
    }

    pub fn new(spec: RequestSpec, cursor: Cursor, ordinal: Option<u64>) -> Self {
        Self {
            spec,
            cursor,
            ordinal,
            attempt: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.spec.url
    }

    /// The same request, queued again after a transient failure
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}
