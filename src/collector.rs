//! Cursor-based page collection.
//!
//! A [`Paginator`] drives a [`PageSource`] one page at a time. Callers
//! decide when the next page is fetched, and no two fetches are ever in
//! flight together. Once exhausted or failed it cannot be restarted.
//! Items already pulled are kept, so a caller that rendered pages one by
//! one can still ask for the full set without fetching anything twice.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::model::Identified;

// ─────────────────────────────────────────────────────────────────────────────
// Page / PageSource
// ─────────────────────────────────────────────────────────────────────────────

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_more: bool,
}

impl<T: Identified> Page<T> {
    /// Id of the last item, used as the cursor for the following page.
    pub fn cursor_candidate(&self) -> Option<&str> {
        self.data.last().map(Identified::id)
    }

    /// True when no further page should be requested. An empty page ends
    /// the sequence even if it claims to have more.
    pub fn is_terminal(&self) -> bool {
        !self.has_more || self.data.is_empty()
    }
}

/// Boxed future returned by [`PageSource::fetch_page`].
pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Page<T>, ExportError>> + Send + 'a>>;

/// Anything that can list records page by page.
///
/// Fetching the same cursor twice must return the same page.
pub trait PageSource: Send + Sync {
    type Item: Identified + Send;

    /// Fetches the page that follows `cursor`, or the first page for `None`.
    fn fetch_page<'a>(&'a self, cursor: Option<&'a str>) -> PageFuture<'a, Self::Item>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Paginator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Start,
    After(String),
    Exhausted,
    /// Display text of the error that stopped pagination.
    Failed(String),
}

/// Records collected before a page failed, for callers that accept a
/// partial export.
#[derive(Debug)]
pub struct PartialCollection<T> {
    pub items: Vec<T>,
    pub pages_fetched: u32,
    pub error: Option<ExportError>,
}

/// Pull-based iterator over the pages of a [`PageSource`].
pub struct Paginator<'s, S: PageSource> {
    source: &'s S,
    position: Position,
    items: Vec<S::Item>,
    pages_fetched: u32,
}

impl<'s, S: PageSource> Paginator<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            position: Position::Start,
            items: Vec::new(),
            pages_fetched: 0,
        }
    }

    /// Fetches the next page and returns its items, or `None` once the
    /// sequence has ended.
    ///
    /// # Errors
    ///
    /// Propagates the page source error unchanged. The paginator is then
    /// failed for good: every later call returns `ExportError::PageFetch`
    /// without fetching, so a failed sequence is never mistaken for a
    /// complete one.
    pub async fn next_page(&mut self) -> Result<Option<&[S::Item]>, ExportError> {
        let cursor = match &self.position {
            Position::Exhausted => return Ok(None),
            Position::Failed(reason) => {
                return Err(ExportError::PageFetch(format!(
                    "Paginator previously failed: {}",
                    reason
                )))
            }
            Position::Start => None,
            Position::After(cursor) => Some(cursor.clone()),
        };

        let page = match self.source.fetch_page(cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    "[COLLECT] Page {} failed after {} records",
                    self.pages_fetched + 1,
                    self.items.len()
                );
                self.position = Position::Failed(e.to_string());
                return Err(e);
            }
        };
        self.pages_fetched += 1;

        if page.has_more && page.data.is_empty() {
            warn!(
                "[COLLECT] Page {} is empty but reports more records, stopping",
                self.pages_fetched
            );
        }

        self.position = match page.cursor_candidate() {
            Some(next) if !page.is_terminal() => Position::After(next.to_string()),
            _ => Position::Exhausted,
        };

        debug!(
            "[COLLECT] Page {}: {} records (has_more={})",
            self.pages_fetched,
            page.data.len(),
            page.has_more
        );

        let start = self.items.len();
        self.items.extend(page.data);
        Ok(Some(&self.items[start..]))
    }

    /// True once no further page will be fetched.
    pub fn is_finished(&self) -> bool {
        matches!(self.position, Position::Exhausted | Position::Failed(_))
    }

    /// True if a page fetch failed. The items held are then incomplete.
    pub fn is_failed(&self) -> bool {
        matches!(self.position, Position::Failed(_))
    }

    /// Every item pulled so far, in source order.
    pub fn items(&self) -> &[S::Item] {
        &self.items
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Stops paginating and returns what was pulled so far.
    pub fn into_items(self) -> Vec<S::Item> {
        self.items
    }

    /// Pulls the remaining pages and returns all items, including those
    /// already returned by `next_page`.
    ///
    /// # Errors
    ///
    /// The first page failure aborts collection and discards everything
    /// gathered so far, including a failure seen by an earlier
    /// `next_page` call.
    pub async fn collect_all(mut self) -> Result<Vec<S::Item>, ExportError> {
        while self.next_page().await?.is_some() {}
        info!(
            "[COLLECT] Complete: {} records, {} pages",
            self.items.len(),
            self.pages_fetched
        );
        Ok(self.items)
    }

    /// Like [`collect_all`](Self::collect_all), but keeps the records
    /// gathered before a failure.
    pub async fn collect_partial(mut self) -> PartialCollection<S::Item> {
        let error = loop {
            match self.next_page().await {
                Ok(Some(_)) => continue,
                Ok(None) => break None,
                Err(e) => break Some(e),
            }
        };
        info!(
            "[COLLECT] Stopped: {} records, {} pages, failed={}",
            self.items.len(),
            self.pages_fetched,
            error.is_some()
        );
        PartialCollection {
            items: self.items,
            pages_fetched: self.pages_fetched,
            error,
        }
    }
}

/// Collects every record of `source`, all or nothing.
///
/// # Errors
///
/// Propagates the first page source error.
pub async fn collect_all<S: PageSource>(source: &S) -> Result<Vec<S::Item>, ExportError> {
    Paginator::new(source).collect_all().await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
