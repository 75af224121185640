//! Paginated lists merged from successive page fetches.
//!
//! Precondition: the server orders records newest-first and only ever adds new
//! records at the head. When a refreshed first page reports a larger total, the
//! `new_total - old_total` newest records are fetched on their own and prepended,
//! so items already shown keep their positions. A list whose total shrank breaks
//! that precondition and is reset to the fresh first page.

use crate::query::cache::{ErrorInfo, QueryCache};
use crate::query::key::QueryRequest;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// A record with a stable identity (e.g., a transaction hash).
pub trait Record {
    fn record_id(&self) -> String;
}

/// One page of a paginated endpoint.
pub trait Page: DeserializeOwned + Send + Sync + 'static {
    type Item: Record + Clone + Send + Sync + 'static;

    fn items(&self) -> &[Self::Item];

    /// Total number of records on the server.
    fn total(&self) -> u64;
}

/// Merged list state.
#[derive(Debug, Clone)]
pub struct ListState<I> {
    pub items: Vec<I>,
    /// Server total as of the last merged first page.
    pub total: u64,
    /// Highest page loaded; 0 before the first load.
    pub page: u32,
    pub error: Option<ErrorInfo>,
}

impl<I> Default for ListState<I> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 0,
            error: None,
        }
    }
}

impl<I> ListState<I> {
    pub fn has_more(&self) -> bool {
        self.page == 0 || (self.items.len() as u64) < self.total
    }
}

pub struct PagedList<P: Page> {
    cache: QueryCache,
    base: QueryRequest,
    limit: u32,
    state: watch::Sender<ListState<P::Item>>,
    // Serializes refresh/load_more so merges never interleave.
    op: Mutex<()>,
}

impl<P: Page> PagedList<P> {
    /// `base` is the request without `page`/`limit` parameters.
    pub fn new(cache: QueryCache, base: QueryRequest, limit: u32) -> Self {
        Self {
            cache,
            base,
            limit: limit.max(1),
            state: watch::Sender::new(ListState::default()),
            op: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ListState<P::Item> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<P::Item> {
        self.state.borrow().items.clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.borrow().has_more()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<P::Item>> {
        self.state.subscribe()
    }

    fn page_request(&self, page: u32, limit: u64) -> QueryRequest {
        self.base.clone().param("page", page).param("limit", limit)
    }

    async fn fetch(&self, page: u32, limit: u64) -> Result<Arc<P>, ErrorInfo> {
        let result = self
            .cache
            .query::<P>(self.page_request(page, limit))
            .wait_fresh_response()
            .await;
        if let Err(e) = &result {
            let recorded = e.clone();
            self.state.send_modify(|s| s.error = Some(recorded));
        }
        result
    }

    /// Refetch the first page and merge it into the list.
    pub async fn refresh(&self) -> Result<(), ErrorInfo> {
        let _op = self.op.lock().await;
        let first = self.fetch(1, self.limit as u64).await?;
        let current = self.state();

        if current.page == 0 || first.total() < current.total {
            if current.page > 0 {
                tracing::warn!(
                    "Total for {} shrank from {} to {}; resetting list",
                    self.base.path(),
                    current.total,
                    first.total()
                );
            }
            let items = dedup(first.items());
            self.state.send_modify(|s| {
                s.items = items;
                s.total = first.total();
                s.page = 1;
                s.error = None;
            });
            return Ok(());
        }

        let delta = first.total() - current.total;
        if delta == 0 {
            self.state.send_modify(|s| s.error = None);
            return Ok(());
        }

        tracing::debug!("{} new records for {}", delta, self.base.path());
        let newest = self.fetch(1, delta).await?;
        let known: HashSet<String> = current.items.iter().map(Record::record_id).collect();
        let mut merged: Vec<P::Item> = newest
            .items()
            .iter()
            .filter(|item| !known.contains(&item.record_id()))
            .cloned()
            .collect();
        merged.extend(current.items);

        self.state.send_modify(|s| {
            s.items = merged;
            s.total = first.total();
            s.error = None;
        });
        Ok(())
    }

    /// Fetch the next page and append it. Returns false when nothing was left to load.
    pub async fn load_more(&self) -> Result<bool, ErrorInfo> {
        let _op = self.op.lock().await;
        let current = self.state();
        if current.page > 0 && !current.has_more() {
            return Ok(false);
        }

        let next = current.page + 1;
        let page = self.fetch(next, self.limit as u64).await?;
        let mut known: HashSet<String> = current.items.iter().map(Record::record_id).collect();
        let appended: Vec<P::Item> = page
            .items()
            .iter()
            .filter(|item| known.insert(item.record_id()))
            .cloned()
            .collect();
        let added = !appended.is_empty();

        self.state.send_modify(|s| {
            s.items.extend(appended);
            s.page = next;
            if next == 1 {
                s.total = page.total();
            }
            s.error = None;
        });
        Ok(added || next == 1)
    }
}

fn dedup<I: Record + Clone>(items: &[I]) -> Vec<I> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.record_id()))
        .cloned()
        .collect()
}
