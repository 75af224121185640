//! Reactive remote-data cache.

pub mod cache;
pub mod derived;
pub mod key;
pub mod paged;

pub use cache::{CacheEntry, Dependency, ErrorInfo, Query, QueryCache, Refreshable, refresh_all};
pub use derived::DerivedView;
pub use key::{QueryRequest, RequestKey};
pub use paged::{DEFAULT_PAGE_LIMIT, ListState, Page, PagedList, Record};
