//! imt-schemas
//!
//! Instrument catalog data model shared by the provider, the store and the cache.
//! The four record kinds form a closed set: [`CatalogRecord`] is sealed and
//! [`InstrumentBatch`] / [`Instrument`] are the sum types code matches on.

mod records;

pub use records::{Bond, Currency, Etf, InstrumentCommon, Share};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument category. Each category owns a disjoint collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Bond,
    Share,
    Etf,
    Currency,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Bond,
        Category::Share,
        Category::Etf,
        Category::Currency,
    ];

    /// Instrument type tag (`BOND`, `SHARE`, `ETF`, `CURRENCY`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bond => "BOND",
            Category::Share => "SHARE",
            Category::Etf => "ETF",
            Category::Currency => "CURRENCY",
        }
    }

    /// Store table / log label for the category.
    pub fn table_name(&self) -> &'static str {
        match self {
            Category::Bond => "bonds",
            Category::Share => "shares",
            Category::Etf => "etfs",
            Category::Currency => "currencies",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bond" | "bonds" => Ok(Category::Bond),
            "share" | "shares" => Ok(Category::Share),
            "etf" | "etfs" => Ok(Category::Etf),
            "currency" | "currencies" => Ok(Category::Currency),
            other => Err(anyhow!(
                "invalid category '{}'. expected one of: bonds | shares | etfs | currencies",
                other
            )),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Bond {}
    impl Sealed for super::Share {}
    impl Sealed for super::Etf {}
    impl Sealed for super::Currency {}
}

/// Implemented by exactly the four record kinds.
pub trait CatalogRecord: sealed::Sealed + Clone + Send + Sync + 'static {
    const CATEGORY: Category;

    fn common(&self) -> &InstrumentCommon;

    fn into_batch(records: Vec<Self>) -> InstrumentBatch;
}

impl CatalogRecord for Bond {
    const CATEGORY: Category = Category::Bond;

    fn common(&self) -> &InstrumentCommon {
        &self.common
    }

    fn into_batch(records: Vec<Self>) -> InstrumentBatch {
        InstrumentBatch::Bonds(records)
    }
}

impl CatalogRecord for Share {
    const CATEGORY: Category = Category::Share;

    fn common(&self) -> &InstrumentCommon {
        &self.common
    }

    fn into_batch(records: Vec<Self>) -> InstrumentBatch {
        InstrumentBatch::Shares(records)
    }
}

impl CatalogRecord for Etf {
    const CATEGORY: Category = Category::Etf;

    fn common(&self) -> &InstrumentCommon {
        &self.common
    }

    fn into_batch(records: Vec<Self>) -> InstrumentBatch {
        InstrumentBatch::Etfs(records)
    }
}

impl CatalogRecord for Currency {
    const CATEGORY: Category = Category::Currency;

    fn common(&self) -> &InstrumentCommon {
        &self.common
    }

    fn into_batch(records: Vec<Self>) -> InstrumentBatch {
        InstrumentBatch::Currencies(records)
    }
}

/// All records of one category, as fetched from a source or read from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentBatch {
    Bonds(Vec<Bond>),
    Shares(Vec<Share>),
    Etfs(Vec<Etf>),
    Currencies(Vec<Currency>),
}

impl InstrumentBatch {
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Bond => InstrumentBatch::Bonds(Vec::new()),
            Category::Share => InstrumentBatch::Shares(Vec::new()),
            Category::Etf => InstrumentBatch::Etfs(Vec::new()),
            Category::Currency => InstrumentBatch::Currencies(Vec::new()),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            InstrumentBatch::Bonds(_) => Category::Bond,
            InstrumentBatch::Shares(_) => Category::Share,
            InstrumentBatch::Etfs(_) => Category::Etf,
            InstrumentBatch::Currencies(_) => Category::Currency,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            InstrumentBatch::Bonds(v) => v.len(),
            InstrumentBatch::Shares(v) => v.len(),
            InstrumentBatch::Etfs(v) => v.len(),
            InstrumentBatch::Currencies(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single instrument of any category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "instrumentType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instrument {
    Bond(Bond),
    Share(Share),
    Etf(Etf),
    Currency(Currency),
}

impl Instrument {
    pub fn category(&self) -> Category {
        match self {
            Instrument::Bond(_) => Category::Bond,
            Instrument::Share(_) => Category::Share,
            Instrument::Etf(_) => Category::Etf,
            Instrument::Currency(_) => Category::Currency,
        }
    }

    pub fn common(&self) -> &InstrumentCommon {
        match self {
            Instrument::Bond(b) => &b.common,
            Instrument::Share(s) => &s.common,
            Instrument::Etf(e) => &e.common,
            Instrument::Currency(c) => &c.common,
        }
    }
}

/// Flat index row: which category an instrument id belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub uid: String,
    pub instrument_type: Category,
}

impl Asset {
    pub fn of<T: CatalogRecord>(record: &T) -> Self {
        Self {
            uid: record.common().uid.clone(),
            instrument_type: T::CATEGORY,
        }
    }
}
