use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Where a listing walk currently is, in the site's own pagination terms
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageToken {
    /// The seed page; no pagination parameter applied yet
    #[default]
    Start,
    /// Record offset (e.g. `No=120`)
    Offset(u64),
    /// One-based page number
    Page(u32),
    /// Absolute next-page URL taken from the page itself
    Link(String),
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Offset(offset) => write!(f, "offset {}", offset),
            Self::Page(page) => write!(f, "page {}", page),
            Self::Link(url) => write!(f, "link {}", url),
        }
    }
}

/// Immutable ordinal and pagination state of one crawl session
///
/// Every step receives a `Cursor` by value and returns a new one; nothing
/// mutates a cursor in place. `next_ordinal` only ever grows, so two requests
/// issued from the same page can never be handed the same ordinal.
///
/// The `seen` set is shared between successive cursors and copied only when
/// a step adds identities to it.
#[derive(Debug, Clone)]
pub struct Cursor {
    session_id: Arc<str>,
    next_ordinal: u64,
    base_ordinal: u64,
    page_token: PageToken,
    pages_walked: u32,
    seen: Arc<BTreeSet<String>>,
}

impl Cursor {
    /// Creates the cursor for a fresh session (`next_ordinal == 0`)
    pub fn new(session_id: impl Into<Arc<str>>) -> Self {
        Self::starting_at(session_id, 0)
    }

    /// Creates a session cursor whose ordinals start at `base`
    pub fn starting_at(session_id: impl Into<Arc<str>>, base: u64) -> Self {
        Self {
            session_id: session_id.into(),
            next_ordinal: base,
            base_ordinal: base,
            page_token: PageToken::Start,
            pages_walked: 0,
            seen: Arc::new(BTreeSet::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    pub fn base_ordinal(&self) -> u64 {
        self.base_ordinal
    }

    pub fn page_token(&self) -> &PageToken {
        &self.page_token
    }

    /// Listing pages already processed in this session
    pub fn pages_walked(&self) -> u32 {
        self.pages_walked
    }

    /// Items emitted so far in this session's walk
    pub fn records_walked(&self) -> u64 {
        self.next_ordinal - self.base_ordinal
    }

    /// Returns a cursor whose `next_ordinal` moved past `emitted` items
    pub fn advance(&self, emitted: u64) -> Self {
        Self {
            next_ordinal: self.next_ordinal.saturating_add(emitted),
            ..self.clone()
        }
    }

    /// Returns a cursor positioned on the next page
    pub fn with_page(&self, token: PageToken) -> Self {
        Self {
            page_token: token,
            pages_walked: self.pages_walked.saturating_add(1),
            ..self.clone()
        }
    }

    /// Returns a cursor that also remembers `keys` as seen identities
    pub fn with_seen<I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = Arc::clone(&self.seen);
        let set = Arc::make_mut(&mut seen);
        set.extend(keys);

        Self {
            seen,
            ..self.clone()
        }
    }

    pub fn has_seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
