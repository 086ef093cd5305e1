//! Read-side queries over the cached catalog.
//!
//! Every query warms the cache first and then scans one snapshot under a
//! single read lock. Category order for cross-category scans is
//! bond, share, etf, currency.

use crate::cache::{Collections, InstrumentCache};
use crate::error::CatalogError;
use imt_schemas::{Asset, Bond, Category, Instrument, InstrumentCommon};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

impl Collections {
    fn find(&self, pred: impl Fn(&InstrumentCommon) -> bool) -> Option<Instrument> {
        if let Some(b) = self.bonds.iter().find(|b| pred(&b.common)) {
            return Some(Instrument::Bond(b.clone()));
        }
        if let Some(s) = self.shares.iter().find(|s| pred(&s.common)) {
            return Some(Instrument::Share(s.clone()));
        }
        if let Some(e) = self.etfs.iter().find(|e| pred(&e.common)) {
            return Some(Instrument::Etf(e.clone()));
        }
        self.currencies
            .iter()
            .find(|c| pred(&c.common))
            .map(|c| Instrument::Currency(c.clone()))
    }

    fn find_in(
        &self,
        category: Category,
        pred: impl Fn(&InstrumentCommon) -> bool,
    ) -> Option<Instrument> {
        match category {
            Category::Bond => self
                .bonds
                .iter()
                .find(|b| pred(&b.common))
                .map(|b| Instrument::Bond(b.clone())),
            Category::Share => self
                .shares
                .iter()
                .find(|s| pred(&s.common))
                .map(|s| Instrument::Share(s.clone())),
            Category::Etf => self
                .etfs
                .iter()
                .find(|e| pred(&e.common))
                .map(|e| Instrument::Etf(e.clone())),
            Category::Currency => self
                .currencies
                .iter()
                .find(|c| pred(&c.common))
                .map(|c| Instrument::Currency(c.clone())),
        }
    }
}

impl InstrumentCache {
    /// uid/category index over every cached instrument.
    pub async fn assets(&self, cancel: &CancellationToken) -> Result<Vec<Asset>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        let data = self.data.read().await;
        let mut out = Vec::with_capacity(
            data.bonds.len() + data.shares.len() + data.etfs.len() + data.currencies.len(),
        );
        out.extend(data.bonds.iter().map(Asset::of));
        out.extend(data.shares.iter().map(Asset::of));
        out.extend(data.etfs.iter().map(Asset::of));
        out.extend(data.currencies.iter().map(Asset::of));
        Ok(out)
    }

    /// First instrument whose ticker matches, ignoring ASCII case.
    pub async fn find_by_ticker(
        &self,
        ticker: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Instrument>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        let data = self.data.read().await;
        Ok(data.find(|c| c.ticker.eq_ignore_ascii_case(ticker)))
    }

    pub async fn find_by_figi(
        &self,
        figi: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Instrument>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        let data = self.data.read().await;
        Ok(data.find(|c| c.figi == figi))
    }

    pub async fn find_by_isin(
        &self,
        isin: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Instrument>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        let data = self.data.read().await;
        Ok(data.find(|c| c.isin == isin))
    }

    /// Instrument by uid, the identity key shared with the store's asset index.
    pub async fn find_by_uid(
        &self,
        uid: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Instrument>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        let data = self.data.read().await;
        Ok(data.find(|c| c.uid == uid))
    }

    /// FIGI lookup restricted to one category. The same FIGI can appear
    /// under several categories upstream.
    pub async fn find_by_figi_and_type(
        &self,
        figi: &str,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<Option<Instrument>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        let data = self.data.read().await;
        Ok(data.find_in(category, |c| c.figi == figi))
    }

    /// Bonds whose ticker is in `tickers` (ASCII case-insensitive), in cache order.
    pub async fn bonds_by_tickers(
        &self,
        tickers: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<Bond>, CatalogError> {
        self.ensure_initialized(cancel).await?;
        if tickers.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<String> = tickers.iter().map(|t| t.to_ascii_uppercase()).collect();
        let data = self.data.read().await;
        Ok(data
            .bonds
            .iter()
            .filter(|b| wanted.contains(&b.common.ticker.to_ascii_uppercase()))
            .cloned()
            .collect())
    }
}
