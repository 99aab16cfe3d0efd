//! Cursor-based pagination over provider list calls
//!
//! Provider listings return one page at a time together with an opaque
//! continuation token; an empty token marks the final page.
//! [`collect_all`] drains such a listing into a single collection so
//! callers never reason about cursors themselves.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Page size used when the configuration does not override it
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Position in a paginated listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    /// Opaque continuation token; empty for the first page
    pub token: String,
    /// Number of items requested per page
    pub page_size: u32,
}

impl PageCursor {
    /// Cursor for the first page of a listing
    pub fn first(page_size: u32) -> Self {
        Self {
            token: String::new(),
            page_size,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items in this page
    pub items: Vec<T>,
    /// Continuation token for the next page; empty when this is the last
    pub next_token: String,
}

impl<T> Page<T> {
    /// A page followed by more pages
    pub fn new(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: next_token.into(),
        }
    }

    /// The final page of a listing
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: String::new(),
        }
    }
}

/// Drain a paginated listing into one collection.
///
/// Starts from an empty token, threads each page's continuation token into
/// the next fetch, and stops when a page comes back without one. The first
/// fetch error aborts the whole collection; no partial result is returned.
pub async fn collect_all<T, F, Fut>(page_size: u32, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(PageCursor) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token = String::new();

    loop {
        let page = fetch(PageCursor { token, page_size }).await?;
        items.extend(page.items);
        if page.next_token.is_empty() {
            return Ok(items);
        }
        token = page.next_token;
    }
}
