//! Memoized read-only projections over cache entries.

use crate::query::cache::Dependency;
use futures::future::{BoxFuture, select_all};
use std::sync::{Arc, Mutex};

type Compute<O> = Box<dyn Fn() -> O + Send + Sync>;

/// A value computed from one or more queries.
///
/// The projection is recomputed lazily, and only when the data version of some
/// dependency changed since the last computation. Reading a derived view never
/// triggers a fetch.
pub struct DerivedView<O> {
    deps: Vec<Box<dyn Dependency>>,
    compute: Compute<O>,
    memo: Mutex<Option<(Vec<u64>, Arc<O>)>>,
}

impl<O> DerivedView<O> {
    pub fn new<F>(deps: Vec<Box<dyn Dependency>>, compute: F) -> Self
    where
        F: Fn() -> O + Send + Sync + 'static,
    {
        Self {
            deps,
            compute: Box::new(compute),
            memo: Mutex::new(None),
        }
    }

    fn versions(&self) -> Vec<u64> {
        self.deps.iter().map(|d| d.version()).collect()
    }

    /// Current value, recomputed if any dependency changed.
    pub fn get(&self) -> Arc<O> {
        let versions = self.versions();
        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((seen, value)) = memo.as_ref()
            && *seen == versions
        {
            return value.clone();
        }
        let value = Arc::new((self.compute)());
        *memo = Some((versions, value.clone()));
        value
    }

    /// Resolves when any dependency publishes a change after this call.
    pub fn changed(&self) -> BoxFuture<'static, ()> {
        if self.deps.is_empty() {
            return Box::pin(futures::future::pending());
        }
        let futures: Vec<_> = self.deps.iter().map(|d| d.changed()).collect();
        Box::pin(async move {
            let _ = select_all(futures).await;
        })
    }
}
