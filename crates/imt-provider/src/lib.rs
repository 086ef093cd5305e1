//! imt-provider
//!
//! Remote instrument catalog. [`CatalogSource`] is the seam the cache loads
//! through; [`TinvestCatalogClient`] is the T-Invest REST implementation.
//! This crate does not touch the store.

pub mod wire;

use anyhow::{anyhow, Context, Result};
use imt_schemas::{Bond, CatalogRecord, Category, Currency, Etf, InstrumentBatch, Share};
use serde::de::DeserializeOwned;
use std::time::Duration;
use wire::{BondWire, CurrencyWire, EtfWire, InstrumentsResponse, ShareWire};

pub const DEFAULT_BASE_URL: &str = "https://invest-public-api.tbank.ru/rest/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const INSTRUMENTS_SERVICE: &str = "tinkoff.public.invest.api.contract.v1.InstrumentsService";
const ERROR_BODY_PREVIEW: usize = 200;
const DECODE_BODY_PREVIEW: usize = 500;

/// Pluggable catalog source.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Full listing of one category. An empty batch is a valid answer.
    async fn fetch(&self, category: Category) -> Result<InstrumentBatch>;
}

/// T-Invest InstrumentsService client.
///
/// The token is passed in by the caller; it is never logged.
#[derive(Clone)]
pub struct TinvestCatalogClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TinvestCatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TinvestCatalogClient")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl TinvestCatalogClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_settings(DEFAULT_BASE_URL.to_string(), token, DEFAULT_TIMEOUT)
    }

    pub fn with_settings(base_url: String, token: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build catalog http client")?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            INSTRUMENTS_SERVICE,
            method
        )
    }

    /// One POST against an InstrumentsService listing method.
    async fn list_instruments<W>(&self, method: &str) -> Result<Vec<W>>
    where
        W: DeserializeOwned,
    {
        let url = self.method_url(method);
        tracing::debug!(method, "catalog request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "instrumentStatus": "INSTRUMENT_STATUS_BASE" }))
            .send()
            .await
            .with_context(|| format!("catalog request failed: {method}"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("catalog response read failed: {method}"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "catalog http error method={} status={} body={}",
                method,
                status.as_u16(),
                preview(&body, ERROR_BODY_PREVIEW)
            ));
        }

        let decoded: InstrumentsResponse<W> = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(
                    method,
                    error = %e,
                    body = %preview(&body, DECODE_BODY_PREVIEW),
                    "catalog response decode failed"
                );
                return Err(anyhow!("catalog response decode failed: {method}: {e}"));
            }
        };

        decoded
            .instruments
            .ok_or_else(|| anyhow!("catalog response has no instruments: {method}"))
    }

    pub async fn fetch_bonds(&self) -> Result<Vec<Bond>> {
        let rows: Vec<BondWire> = self.list_instruments("Bonds").await?;
        Ok(rows.into_iter().map(Bond::from).collect())
    }

    pub async fn fetch_shares(&self) -> Result<Vec<Share>> {
        let rows: Vec<ShareWire> = self.list_instruments("Shares").await?;
        Ok(rows.into_iter().map(Share::from).collect())
    }

    pub async fn fetch_etfs(&self) -> Result<Vec<Etf>> {
        let rows: Vec<EtfWire> = self.list_instruments("Etfs").await?;
        Ok(rows.into_iter().map(Etf::from).collect())
    }

    pub async fn fetch_currencies(&self) -> Result<Vec<Currency>> {
        let rows: Vec<CurrencyWire> = self.list_instruments("Currencies").await?;
        Ok(rows.into_iter().map(Currency::from).collect())
    }
}

#[async_trait::async_trait]
impl CatalogSource for TinvestCatalogClient {
    fn source_name(&self) -> &'static str {
        "tinvest"
    }

    async fn fetch(&self, category: Category) -> Result<InstrumentBatch> {
        let batch = match category {
            Category::Bond => Bond::into_batch(self.fetch_bonds().await?),
            Category::Share => Share::into_batch(self.fetch_shares().await?),
            Category::Etf => Etf::into_batch(self.fetch_etfs().await?),
            Category::Currency => Currency::into_batch(self.fetch_currencies().await?),
        };
        tracing::debug!(category = %category, count = batch.len(), "catalog fetched");
        Ok(batch)
    }
}

fn preview(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
