//! In-memory [`CatalogStore`] with scripted read and save failures.

use crate::source::lock;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use imt_db::CatalogStore;
use imt_schemas::{
    Asset, Bond, CatalogRecord, Category, Currency, Etf, InstrumentBatch, Share,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub enum SaveStep {
    #[default]
    Commit,
    Fail(String),
    Panic(String),
    Hang,
}

#[derive(Debug, Default)]
struct Rows {
    bonds: Vec<Bond>,
    shares: Vec<Share>,
    etfs: Vec<Etf>,
    currencies: Vec<Currency>,
    assets: BTreeMap<String, Category>,
}

/// Rows are kept ordered by (ticker, uid), matching the Postgres store.
#[derive(Debug, Default)]
pub struct StubStore {
    rows: Mutex<Rows>,
    read_errors: Mutex<HashMap<Category, String>>,
    save_step: Mutex<SaveStep>,
    saved: Mutex<Vec<InstrumentBatch>>,
    loads: AtomicUsize,
}

impl StubStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, batch: InstrumentBatch) -> Self {
        self.upsert(&batch);
        self
    }

    pub fn failing_read(self, category: Category, message: &str) -> Self {
        lock(&self.read_errors).insert(category, message.to_string());
        self
    }

    pub fn saves(self, step: SaveStep) -> Self {
        self.set_save_step(step);
        self
    }

    pub fn set_save_step(&self, step: SaveStep) {
        *lock(&self.save_step) = step;
    }

    /// Batches committed so far, in commit order.
    pub fn saved(&self) -> Vec<InstrumentBatch> {
        lock(&self.saved).clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn rows(&self, category: Category) -> InstrumentBatch {
        let rows = lock(&self.rows);
        match category {
            Category::Bond => InstrumentBatch::Bonds(rows.bonds.clone()),
            Category::Share => InstrumentBatch::Shares(rows.shares.clone()),
            Category::Etf => InstrumentBatch::Etfs(rows.etfs.clone()),
            Category::Currency => InstrumentBatch::Currencies(rows.currencies.clone()),
        }
    }

    /// Asset index rows, ordered by uid.
    pub fn assets(&self) -> Vec<Asset> {
        lock(&self.rows)
            .assets
            .iter()
            .map(|(uid, category)| Asset {
                uid: uid.clone(),
                instrument_type: *category,
            })
            .collect()
    }

    fn upsert(&self, batch: &InstrumentBatch) {
        let mut guard = lock(&self.rows);
        let rows = &mut *guard;
        match batch {
            InstrumentBatch::Bonds(v) => upsert_by_uid(&mut rows.bonds, &mut rows.assets, v),
            InstrumentBatch::Shares(v) => upsert_by_uid(&mut rows.shares, &mut rows.assets, v),
            InstrumentBatch::Etfs(v) => upsert_by_uid(&mut rows.etfs, &mut rows.assets, v),
            InstrumentBatch::Currencies(v) => {
                upsert_by_uid(&mut rows.currencies, &mut rows.assets, v)
            }
        }
    }
}

fn upsert_by_uid<T: CatalogRecord>(
    existing: &mut Vec<T>,
    assets: &mut BTreeMap<String, Category>,
    incoming: &[T],
) {
    for r in incoming {
        assets.insert(r.common().uid.clone(), T::CATEGORY);
        match existing
            .iter_mut()
            .find(|e| e.common().uid == r.common().uid)
        {
            Some(slot) => *slot = r.clone(),
            None => existing.push(r.clone()),
        }
    }
    existing.sort_by(|a, b| {
        (&a.common().ticker, &a.common().uid).cmp(&(&b.common().ticker, &b.common().uid))
    });
}

fn window<T: CatalogRecord>(rows: &[T], limit: i64, offset: i64) -> InstrumentBatch {
    let page: Vec<T> = rows
        .iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect();
    T::into_batch(page)
}

#[async_trait]
impl CatalogStore for StubStore {
    async fn load_category(
        &self,
        category: Category,
        limit: i64,
        offset: i64,
    ) -> Result<InstrumentBatch> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = lock(&self.read_errors).get(&category) {
            return Err(anyhow!("{msg}"));
        }
        let rows = lock(&self.rows);
        Ok(match category {
            Category::Bond => window(&rows.bonds, limit, offset),
            Category::Share => window(&rows.shares, limit, offset),
            Category::Etf => window(&rows.etfs, limit, offset),
            Category::Currency => window(&rows.currencies, limit, offset),
        })
    }

    async fn save_category(&self, batch: &InstrumentBatch) -> Result<u64> {
        let step = lock(&self.save_step).clone();
        match step {
            SaveStep::Commit => {
                self.upsert(batch);
                lock(&self.saved).push(batch.clone());
                Ok(batch.len() as u64)
            }
            SaveStep::Fail(msg) => Err(anyhow!("{msg}")),
            SaveStep::Panic(msg) => panic!("{msg}"),
            SaveStep::Hang => std::future::pending().await,
        }
    }
}
