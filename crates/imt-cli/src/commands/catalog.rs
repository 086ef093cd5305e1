use super::{db, print_json, AppContext};
use anyhow::{bail, Result};
use imt_cache::{paginate, InstrumentCache, LoadReport, RetryPolicy};
use imt_db::{CatalogStore, PgCatalogStore};
use imt_provider::TinvestCatalogClient;
use imt_schemas::Category;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub enum Lookup {
    Ticker(String),
    Figi(String),
    Isin(String),
    Uid(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Ticker(v) => write!(f, "ticker={v}"),
            Lookup::Figi(v) => write!(f, "figi={v}"),
            Lookup::Isin(v) => write!(f, "isin={v}"),
            Lookup::Uid(v) => write!(f, "uid={v}"),
        }
    }
}

/// Wire the cache from config. The store is attached only when the
/// database URL variable is set.
async fn build_cache(ctx: &AppContext) -> Result<InstrumentCache> {
    let api = &ctx.settings.api;
    let token = ctx.secrets.require_api_token()?;
    let client =
        TinvestCatalogClient::with_settings(api.base_url.clone(), token.to_string(), api.timeout())?;

    let store: Option<Arc<dyn CatalogStore>> = if ctx.secrets.database_url.is_some() {
        Some(Arc::new(PgCatalogStore::new(db::connect(ctx).await?)))
    } else {
        tracing::info!(
            var = %ctx.secrets.database_url_var,
            "database url not set; cache runs memory-only"
        );
        None
    };

    let cache = &ctx.settings.cache;
    Ok(InstrumentCache::builder(Arc::new(client))
        .store_opt(store)
        .retry_policy(RetryPolicy::from_backoff(cache.retry_backoff()))
        .store_read_limit(cache.store_read_limit)
        .build())
}

async fn warmed(ctx: &AppContext) -> Result<(InstrumentCache, LoadReport)> {
    let cache = build_cache(ctx).await?;
    let report = cache
        .initialize_within(ctx.settings.cache.init_timeout())
        .await?;
    Ok((cache, report))
}

pub async fn warm(ctx: &AppContext) -> Result<()> {
    let (_, report) = warmed(ctx).await?;
    print_json(&report)
}

pub async fn list(ctx: &AppContext, category: Category, page: i64, limit: i64) -> Result<()> {
    let (cache, _) = warmed(ctx).await?;
    let cancel = CancellationToken::new();
    match category {
        Category::Bond => {
            let all = cache.bonds(&cancel).await?;
            print_json(&paginate(all.as_slice(), page, limit))
        }
        Category::Share => {
            let all = cache.shares(&cancel).await?;
            print_json(&paginate(all.as_slice(), page, limit))
        }
        Category::Etf => {
            let all = cache.etfs(&cancel).await?;
            print_json(&paginate(all.as_slice(), page, limit))
        }
        Category::Currency => {
            let all = cache.currencies(&cancel).await?;
            print_json(&paginate(all.as_slice(), page, limit))
        }
    }
}

pub async fn find(ctx: &AppContext, lookup: Lookup) -> Result<()> {
    let (cache, _) = warmed(ctx).await?;
    let cancel = CancellationToken::new();
    let found = match &lookup {
        Lookup::Ticker(t) => cache.find_by_ticker(t, &cancel).await?,
        Lookup::Figi(f) => cache.find_by_figi(f, &cancel).await?,
        Lookup::Isin(i) => cache.find_by_isin(i, &cancel).await?,
        Lookup::Uid(u) => cache.find_by_uid(u, &cancel).await?,
    };
    match found {
        Some(instrument) => print_json(&instrument),
        None => bail!("instrument not found: {lookup}"),
    }
}
