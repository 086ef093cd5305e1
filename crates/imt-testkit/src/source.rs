//! Scripted [`CatalogSource`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use imt_provider::CatalogSource;
use imt_schemas::{Category, InstrumentBatch};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What a scripted category returns on every fetch.
#[derive(Debug, Clone)]
pub enum Step {
    Records(InstrumentBatch),
    Fail(String),
    Panic(String),
    /// Never resolves; only cancellation gets the caller out.
    Hang,
}

/// Unscripted categories return an empty list.
#[derive(Debug, Default)]
pub struct StubSource {
    steps: Mutex<HashMap<Category, Step>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    calls_by_category: Mutex<HashMap<Category, usize>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, batch: InstrumentBatch) -> Self {
        self.set(batch.category(), Step::Records(batch));
        self
    }

    pub fn failing(self, category: Category, message: &str) -> Self {
        self.set(category, Step::Fail(message.to_string()));
        self
    }

    pub fn panicking(self, category: Category, message: &str) -> Self {
        self.set(category, Step::Panic(message.to_string()));
        self
    }

    pub fn hanging(self, category: Category) -> Self {
        self.set(category, Step::Hang);
        self
    }

    /// Applied to every fetch before the scripted step runs.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Rescript a category while the source is shared.
    pub fn set(&self, category: Category, step: Step) {
        lock(&self.steps).insert(category, step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, category: Category) -> usize {
        lock(&self.calls_by_category)
            .get(&category)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CatalogSource for StubSource {
    fn source_name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(&self, category: Category) -> Result<InstrumentBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.calls_by_category).entry(category).or_insert(0) += 1;

        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }

        let step = lock(&self.steps).get(&category).cloned();
        match step {
            None => Ok(InstrumentBatch::empty(category)),
            Some(Step::Records(batch)) => Ok(batch),
            Some(Step::Fail(msg)) => Err(anyhow!("{msg}")),
            Some(Step::Panic(msg)) => panic!("{msg}"),
            Some(Step::Hang) => std::future::pending().await,
        }
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}
