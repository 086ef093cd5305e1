//! imt-db
//!
//! Persistent instrument catalog on Postgres: pool setup, embedded migrations,
//! paginated reads and chunked transactional write-back.

mod catalog;

pub use catalog::{PgCatalogStore, Stored, ASSETS_TABLE, WRITE_CHUNK_SIZE};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use imt_schemas::{Category, InstrumentBatch};
use sqlx::postgres::PgPoolOptions;

pub use sqlx::PgPool;

/// Persistent store seam used by the cache.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Up to `limit` records of one category starting at `offset`, ordered by ticker.
    async fn load_category(
        &self,
        category: Category,
        limit: i64,
        offset: i64,
    ) -> Result<InstrumentBatch>;

    /// Upsert every record of the batch, and its asset index rows,
    /// atomically. Returns category rows written.
    async fn save_category(&self, batch: &InstrumentBatch) -> Result<u64>;
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    /// All four catalog tables and the asset index exist.
    pub has_catalog_tables: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let tables: Vec<String> = Category::ALL
        .iter()
        .map(|c| c.table_name())
        .chain([ASSETS_TABLE])
        .map(str::to_string)
        .collect();
    let (present,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from information_schema.tables
        where table_schema = 'public' and table_name = any($1)
        "#,
    )
    .bind(&tables)
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_catalog_tables: present == tables.len() as i64,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub category: Category,
    pub rows: i64,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Row count and freshness per category.
pub async fn catalog_stats(pool: &PgPool) -> Result<Vec<CategoryStats>> {
    let mut out = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let sql = format!(
            "select count(*)::bigint, max(updated_at) from {}",
            category.table_name()
        );
        let (rows, last_updated_at): (i64, Option<DateTime<Utc>>) = sqlx::query_as(&sql)
            .fetch_one(pool)
            .await
            .with_context(|| format!("catalog_stats failed: {}", category.table_name()))?;
        out.push(CategoryStats {
            category,
            rows,
            last_updated_at,
        });
    }
    Ok(out)
}
