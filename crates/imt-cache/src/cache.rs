use crate::error::{CatalogError, CategoryFailure};
use anyhow::anyhow;
use futures_util::FutureExt;
use imt_db::CatalogStore;
use imt_provider::CatalogSource;
use imt_schemas::{Bond, Category, Currency, Etf, InstrumentBatch, Share};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_STORE_READ_LIMIT: i64 = 5000;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(60);

/// What happens after an initialization attempt loaded nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// The failed attempt consumes the one-shot guard. `initialize` keeps
    /// returning the captured error; `ensure_initialized` succeeds with empty data.
    Never,
    /// The cache stays uninitialized. Callers get the captured error until the
    /// backoff elapses, then the next caller runs a fresh attempt.
    After(Duration),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::After(DEFAULT_RETRY_BACKOFF)
    }
}

impl RetryPolicy {
    pub fn from_backoff(backoff: Option<Duration>) -> Self {
        backoff.map_or(RetryPolicy::Never, RetryPolicy::After)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Store,
    Remote,
}

/// Summary of the initialization pass that populated the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub source: LoadSource,
    /// Record count per category that was replaced in memory.
    pub loaded: BTreeMap<Category, usize>,
    /// Categories left untouched, with the reason.
    pub failures: Vec<CategoryFailure>,
    /// Categories held in memory whose persistence failed.
    pub write_back_failures: Vec<CategoryFailure>,
    pub elapsed: Duration,
}

#[derive(Default)]
pub(crate) struct Collections {
    pub(crate) initialized: bool,
    pub(crate) bonds: Arc<Vec<Bond>>,
    pub(crate) shares: Arc<Vec<Share>>,
    pub(crate) etfs: Arc<Vec<Etf>>,
    pub(crate) currencies: Arc<Vec<Currency>>,
}

impl Collections {
    /// Swap in a whole category. Readers holding the old `Arc` keep their snapshot.
    fn replace(&mut self, batch: InstrumentBatch) {
        match batch {
            InstrumentBatch::Bonds(v) => self.bonds = Arc::new(v),
            InstrumentBatch::Shares(v) => self.shares = Arc::new(v),
            InstrumentBatch::Etfs(v) => self.etfs = Arc::new(v),
            InstrumentBatch::Currencies(v) => self.currencies = Arc::new(v),
        }
    }
}

#[derive(Debug)]
enum InitState {
    Pending,
    Loaded(LoadReport),
    Failed { error: CatalogError, at: Instant },
}

/// In-memory instrument catalog, warmed once from the store or the remote source.
///
/// Build one per process with [`InstrumentCache::builder`] and share it as
/// `Arc<InstrumentCache>`.
pub struct InstrumentCache {
    source: Arc<dyn CatalogSource>,
    store: Option<Arc<dyn CatalogStore>>,
    retry: RetryPolicy,
    store_read_limit: i64,
    pub(crate) data: Arc<RwLock<Collections>>,
    // Serializes initialization attempts. Never held together with `data`
    // across I/O.
    init: Mutex<InitState>,
}

impl fmt::Debug for InstrumentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentCache")
            .field("source", &self.source.source_name())
            .field("store", &self.store.is_some())
            .field("retry", &self.retry)
            .field("store_read_limit", &self.store_read_limit)
            .finish()
    }
}

pub struct InstrumentCacheBuilder {
    source: Arc<dyn CatalogSource>,
    store: Option<Arc<dyn CatalogStore>>,
    retry: RetryPolicy,
    store_read_limit: i64,
}

impl InstrumentCacheBuilder {
    pub fn store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// `None` runs the cache memory-only.
    pub fn store_opt(mut self, store: Option<Arc<dyn CatalogStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store_read_limit(mut self, limit: i64) -> Self {
        self.store_read_limit = limit;
        self
    }

    pub fn build(self) -> InstrumentCache {
        InstrumentCache {
            source: self.source,
            store: self.store,
            retry: self.retry,
            store_read_limit: self.store_read_limit,
            data: Arc::new(RwLock::new(Collections::default())),
            init: Mutex::new(InitState::Pending),
        }
    }
}

impl InstrumentCache {
    pub fn builder(source: Arc<dyn CatalogSource>) -> InstrumentCacheBuilder {
        InstrumentCacheBuilder {
            source,
            store: None,
            retry: RetryPolicy::default(),
            store_read_limit: DEFAULT_STORE_READ_LIMIT,
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.data.read().await.initialized
    }

    /// Run the load sequence once; later and concurrent callers get the
    /// captured outcome. A failed attempt is replayed or retried per
    /// [`RetryPolicy`]. A cancelled attempt leaves the guard untouched.
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<LoadReport, CatalogError> {
        let mut state = tokio::select! {
            biased;
            s = self.init.lock() => s,
            _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
        };

        match &*state {
            InitState::Loaded(report) => return Ok(report.clone()),
            InitState::Failed { error, at } => match self.retry {
                RetryPolicy::Never => return Err(error.clone()),
                RetryPolicy::After(backoff) if at.elapsed() < backoff => {
                    return Err(error.clone())
                }
                RetryPolicy::After(_) => {
                    tracing::info!("retrying instrument catalog initialization");
                }
            },
            InitState::Pending => {}
        }

        match self.load(cancel).await {
            Ok(report) => {
                tracing::info!(
                    source = ?report.source,
                    loaded = report.loaded.len(),
                    failed = report.failures.len(),
                    write_back_failed = report.write_back_failures.len(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "instrument catalog initialized"
                );
                *state = InitState::Loaded(report.clone());
                Ok(report)
            }
            Err(CatalogError::Cancelled) => {
                tracing::warn!("instrument catalog initialization cancelled");
                Err(CatalogError::Cancelled)
            }
            Err(error) => {
                tracing::error!(error = %error, "instrument catalog initialization failed");
                if self.retry == RetryPolicy::Never {
                    self.data.write().await.initialized = true;
                }
                *state = InitState::Failed {
                    error: error.clone(),
                    at: Instant::now(),
                };
                Err(error)
            }
        }
    }

    /// Initialize under a deadline. Work still in flight when it passes is
    /// cancelled; categories that already loaded are kept.
    pub async fn initialize_within(&self, timeout: Duration) -> Result<LoadReport, CatalogError> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };
        let result = self.initialize(&cancel).await;
        timer.abort();
        result
    }

    pub async fn ensure_initialized(&self, cancel: &CancellationToken) -> Result<(), CatalogError> {
        if self.data.read().await.initialized {
            return Ok(());
        }
        self.initialize(cancel).await.map(|_| ())
    }

    pub async fn bonds(&self, cancel: &CancellationToken) -> Result<Arc<Vec<Bond>>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        Ok(Arc::clone(&self.data.read().await.bonds))
    }

    pub async fn shares(&self, cancel: &CancellationToken) -> Result<Arc<Vec<Share>>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        Ok(Arc::clone(&self.data.read().await.shares))
    }

    pub async fn etfs(&self, cancel: &CancellationToken) -> Result<Arc<Vec<Etf>>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        Ok(Arc::clone(&self.data.read().await.etfs))
    }

    pub async fn currencies(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<Currency>>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        Ok(Arc::clone(&self.data.read().await.currencies))
    }

    async fn load(&self, cancel: &CancellationToken) -> Result<LoadReport, CatalogError> {
        let started = Instant::now();
        if let Some(store) = &self.store {
            if let Some(report) = self.load_from_store(store.as_ref(), cancel, started).await {
                return Ok(report);
            }
        }
        self.load_from_remote(cancel, started).await
    }

    /// `None` when no category had rows; the caller then goes remote.
    async fn load_from_store(
        &self,
        store: &dyn CatalogStore,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Option<LoadReport> {
        let limit = self.store_read_limit;
        let (bonds, shares, etfs, currencies) = tokio::join!(
            read_store(store, Category::Bond, limit, cancel),
            read_store(store, Category::Share, limit, cancel),
            read_store(store, Category::Etf, limit, cancel),
            read_store(store, Category::Currency, limit, cancel),
        );

        let mut usable: Vec<InstrumentBatch> = Vec::new();
        let mut failures: Vec<CategoryFailure> = Vec::new();
        for (category, result) in [
            (Category::Bond, bonds),
            (Category::Share, shares),
            (Category::Etf, etfs),
            (Category::Currency, currencies),
        ] {
            match result {
                Ok(batch) if batch.category() != category => {
                    let msg = format!("store returned {} rows", batch.category());
                    tracing::warn!(category = %category, error = %msg, "store read rejected");
                    failures.push(CategoryFailure::new(category, msg));
                }
                Ok(batch) if batch.is_empty() => {
                    tracing::info!(category = %category, "store has no rows");
                }
                Ok(batch) => usable.push(batch),
                Err(e) => {
                    let msg = format!("{e:#}");
                    tracing::warn!(category = %category, error = %msg, "store read failed");
                    failures.push(CategoryFailure::new(category, msg));
                }
            }
        }

        if usable.is_empty() {
            tracing::info!("store holds no instruments; loading from remote source");
            return None;
        }

        let mut loaded = BTreeMap::new();
        {
            let mut data = self.data.write().await;
            for batch in usable {
                loaded.insert(batch.category(), batch.len());
                data.replace(batch);
            }
            data.initialized = true;
        }

        Some(LoadReport {
            source: LoadSource::Store,
            loaded,
            failures,
            write_back_failures: Vec::new(),
            elapsed: started.elapsed(),
        })
    }

    async fn load_from_remote(
        &self,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<LoadReport, CatalogError> {
        // Dropping the set aborts every task still running.
        let mut tasks = JoinSet::new();
        for category in Category::ALL {
            let task = FetchTask {
                category,
                source: Arc::clone(&self.source),
                store: self.store.clone(),
                data: Arc::clone(&self.data),
                cancel: cancel.clone(),
            };
            tasks.spawn(task.run_contained());
        }

        let mut outcomes: BTreeMap<Category, CategoryOutcome> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((category, outcome)) => {
                    outcomes.insert(category, outcome);
                }
                Err(e) => tracing::error!(error = %e, "fetch task aborted"),
            }
        }

        let mut loaded = BTreeMap::new();
        let mut failures = Vec::new();
        let mut write_back_failures = Vec::new();
        for category in Category::ALL {
            match outcomes.remove(&category) {
                Some(CategoryOutcome::Loaded { count, write_back }) => {
                    loaded.insert(category, count);
                    write_back_failures.extend(write_back);
                }
                Some(CategoryOutcome::Failed(failure)) => failures.push(failure),
                None => failures.push(CategoryFailure::new(category, "fetch task aborted")),
            }
        }

        if loaded.is_empty() {
            if cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }
            return Err(CatalogError::NoCategoryLoaded { failures });
        }

        self.data.write().await.initialized = true;
        Ok(LoadReport {
            source: LoadSource::Remote,
            loaded,
            failures,
            write_back_failures,
            elapsed: started.elapsed(),
        })
    }
}

async fn read_store(
    store: &dyn CatalogStore,
    category: Category,
    limit: i64,
    cancel: &CancellationToken,
) -> anyhow::Result<InstrumentBatch> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(anyhow!("cancelled")),
        r = store.load_category(category, limit, 0) => r,
    }
}

enum CategoryOutcome {
    Loaded {
        count: usize,
        write_back: Option<CategoryFailure>,
    },
    Failed(CategoryFailure),
}

/// One category of the remote fan-out. Owns everything it touches so it
/// can run on its own worker.
struct FetchTask {
    category: Category,
    source: Arc<dyn CatalogSource>,
    store: Option<Arc<dyn CatalogStore>>,
    data: Arc<RwLock<Collections>>,
    cancel: CancellationToken,
}

impl FetchTask {
    /// A panic inside the task fails its category only.
    async fn run_contained(self) -> (Category, CategoryOutcome) {
        let category = self.category;
        let outcome = match AssertUnwindSafe(self.run()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                tracing::error!(category = %category, panic = %msg, "fetch task panicked");
                CategoryOutcome::Failed(CategoryFailure::new(
                    category,
                    format!("fetch task panicked: {msg}"),
                ))
            }
        };
        (category, outcome)
    }

    async fn run(self) -> CategoryOutcome {
        let category = self.category;
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(anyhow!("cancelled")),
            r = self.source.fetch(category) => r,
        };

        let batch = match fetched {
            Ok(batch) if batch.category() == category => batch,
            Ok(batch) => {
                let msg = format!("source returned {} records", batch.category());
                tracing::warn!(category = %category, error = %msg, "remote fetch rejected");
                return CategoryOutcome::Failed(CategoryFailure::new(category, msg));
            }
            Err(e) => {
                let msg = format!("{e:#}");
                tracing::warn!(category = %category, error = %msg, "remote fetch failed");
                return CategoryOutcome::Failed(CategoryFailure::new(category, msg));
            }
        };

        let count = batch.len();
        let to_persist = match &self.store {
            Some(_) if count > 0 => Some(batch.clone()),
            _ => None,
        };

        self.data.write().await.replace(batch);
        tracing::info!(category = %category, count, "category loaded from remote");

        let write_back = match (self.store.as_deref(), to_persist) {
            (Some(store), Some(batch)) => write_back(store, batch, &self.cancel).await.err(),
            _ => None,
        };

        CategoryOutcome::Loaded { count, write_back }
    }
}

/// Persist one fetched category. Errors and panics are logged and returned,
/// never propagated; the in-memory copy stays as is.
async fn write_back(
    store: &dyn CatalogStore,
    batch: InstrumentBatch,
    cancel: &CancellationToken,
) -> Result<u64, CategoryFailure> {
    let category = batch.category();
    let save = AssertUnwindSafe(store.save_category(&batch)).catch_unwind();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(category = %category, "write-back cancelled; in-memory data kept");
            return Err(CategoryFailure::new(category, "write-back cancelled"));
        }
        r = save => r,
    };

    match outcome {
        Ok(Ok(rows)) => {
            tracing::info!(category = %category, rows, "write-back committed");
            Ok(rows)
        }
        Ok(Err(e)) => {
            let msg = format!("{e:#}");
            tracing::warn!(category = %category, error = %msg, "write-back failed; in-memory data kept");
            Err(CategoryFailure::new(category, format!("write-back failed: {msg}")))
        }
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            tracing::error!(category = %category, panic = %msg, "write-back panicked; in-memory data kept");
            Err(CategoryFailure::new(
                category,
                format!("write-back panicked: {msg}"),
            ))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_from_backoff() {
        assert_eq!(RetryPolicy::from_backoff(None), RetryPolicy::Never);
        assert_eq!(
            RetryPolicy::from_backoff(Some(Duration::from_secs(5))),
            RetryPolicy::After(Duration::from_secs(5))
        );
        assert_eq!(
            RetryPolicy::default(),
            RetryPolicy::After(DEFAULT_RETRY_BACKOFF)
        );
    }

    #[test]
    fn replace_swaps_only_its_category() {
        let mut c = Collections::default();
        let old_bonds = Arc::clone(&c.bonds);
        c.replace(InstrumentBatch::Etfs(vec![Etf::default(), Etf::default()]));
        assert_eq!(c.etfs.len(), 2);
        assert!(Arc::ptr_eq(&old_bonds, &c.bonds));
        assert!(!c.initialized);
    }

    #[test]
    fn panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");
        let s: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(s.as_ref()), "bang");
        let s: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "non-string panic payload");
    }

    #[test]
    fn load_report_serializes_category_keys() {
        let mut loaded = BTreeMap::new();
        loaded.insert(Category::Bond, 3);
        let r = LoadReport {
            source: LoadSource::Remote,
            loaded,
            failures: vec![],
            write_back_failures: vec![],
            elapsed: Duration::from_millis(5),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["source"], "remote");
        assert_eq!(v["loaded"]["BOND"], 3);
    }
}
