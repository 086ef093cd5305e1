//! imt-cache
//!
//! Process-wide instrument catalog held in memory. On first use the cache is
//! warmed from the persistent store when it has rows, otherwise from the
//! remote catalog source, fetching the four categories in parallel and
//! writing each one back to the store.
//!
//! Partial success is success: the cache counts as initialized when at least
//! one category loaded.

mod cache;
mod error;
mod lookup;
mod paginate;

pub use cache::{
    InstrumentCache, InstrumentCacheBuilder, LoadReport, LoadSource, RetryPolicy,
    DEFAULT_INIT_TIMEOUT, DEFAULT_RETRY_BACKOFF, DEFAULT_STORE_READ_LIMIT,
};
pub use error::{CatalogError, CategoryFailure};
pub use paginate::{paginate, Page};
