use crate::CatalogStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use imt_schemas::{
    Asset, Bond, CatalogRecord, Category, Currency, Etf, InstrumentBatch, InstrumentCommon, Share,
};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::query_builder::Separated;
use sqlx::{PgPool, QueryBuilder, Row};
use std::collections::HashSet;

/// Rows per upsert statement. Bonds bind 52 params per row, which keeps a
/// full chunk under the Postgres 65535 bind-parameter limit.
pub const WRITE_CHUNK_SIZE: usize = 1000;

/// uid -> instrument type index, maintained by every category save.
pub const ASSETS_TABLE: &str = "assets";

const COMMON_COLUMNS: &[&str] = &[
    "uid",
    "figi",
    "ticker",
    "position_uid",
    "class_code",
    "isin",
    "lot",
    "currency",
    "klong",
    "kshort",
    "dlong",
    "dshort",
    "dlong_min",
    "dshort_min",
    "exchange",
    "real_exchange",
    "short_enabled_flag",
    "name",
    "country_of_risk_name",
    "trading_status",
    "otc_flag",
    "buy_available_flag",
    "sell_available_flag",
    "min_price_increment",
    "api_trade_available_flag",
    "asset_uid",
    "for_iis_flag",
    "for_qual_investor_flag",
    "weekend_flag",
    "blocked_tca_flag",
    "liquidity_flag",
    "first_1min_candle_date",
    "first_1day_candle_date",
];

/// A record as persisted, with store bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub record: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Stored<T> {
    pub fn into_record(self) -> T {
        self.record
    }
}

/// Per-category column layout. Binding order must match `EXTRA_COLUMNS`.
trait CatalogTable: CatalogRecord {
    const EXTRA_COLUMNS: &'static [&'static str];

    fn bind_extra(b: &mut Separated<'_, '_, Postgres, &'static str>, r: &Self);

    fn decode(row: &PgRow, common: InstrumentCommon) -> Result<Self>;
}

fn columns<T: CatalogTable>() -> Vec<&'static str> {
    COMMON_COLUMNS
        .iter()
        .chain(T::EXTRA_COLUMNS.iter())
        .copied()
        .collect()
}

fn update_set(cols: &[&str]) -> String {
    let mut parts: Vec<String> = cols
        .iter()
        .filter(|c| **c != "uid")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    parts.push("updated_at = now()".to_string());
    parts.join(", ")
}

fn bind_common(b: &mut Separated<'_, '_, Postgres, &'static str>, c: &InstrumentCommon) {
    b.push_bind(c.uid.clone())
        .push_bind(c.figi.clone())
        .push_bind(c.ticker.clone())
        .push_bind(c.position_uid.clone())
        .push_bind(c.class_code.clone())
        .push_bind(c.isin.clone())
        .push_bind(c.lot)
        .push_bind(c.currency.clone())
        .push_bind(c.klong)
        .push_bind(c.kshort)
        .push_bind(c.dlong)
        .push_bind(c.dshort)
        .push_bind(c.dlong_min)
        .push_bind(c.dshort_min)
        .push_bind(c.exchange.clone())
        .push_bind(c.real_exchange.clone())
        .push_bind(c.short_enabled_flag)
        .push_bind(c.name.clone())
        .push_bind(c.country_of_risk_name.clone())
        .push_bind(c.trading_status.clone())
        .push_bind(c.otc_flag)
        .push_bind(c.buy_available_flag)
        .push_bind(c.sell_available_flag)
        .push_bind(c.min_price_increment)
        .push_bind(c.api_trade_available_flag)
        .push_bind(c.asset_uid.clone())
        .push_bind(c.for_iis_flag)
        .push_bind(c.for_qual_investor_flag)
        .push_bind(c.weekend_flag)
        .push_bind(c.blocked_tca_flag)
        .push_bind(c.liquidity_flag)
        .push_bind(c.first_1min_candle_date.clone())
        .push_bind(c.first_1day_candle_date.clone());
}

fn decode_common(r: &PgRow) -> Result<InstrumentCommon> {
    Ok(InstrumentCommon {
        uid: r.try_get("uid")?,
        figi: r.try_get("figi")?,
        ticker: r.try_get("ticker")?,
        position_uid: r.try_get("position_uid")?,
        class_code: r.try_get("class_code")?,
        isin: r.try_get("isin")?,
        lot: r.try_get("lot")?,
        currency: r.try_get("currency")?,
        klong: r.try_get("klong")?,
        kshort: r.try_get("kshort")?,
        dlong: r.try_get("dlong")?,
        dshort: r.try_get("dshort")?,
        dlong_min: r.try_get("dlong_min")?,
        dshort_min: r.try_get("dshort_min")?,
        exchange: r.try_get("exchange")?,
        real_exchange: r.try_get("real_exchange")?,
        short_enabled_flag: r.try_get("short_enabled_flag")?,
        name: r.try_get("name")?,
        country_of_risk_name: r.try_get("country_of_risk_name")?,
        trading_status: r.try_get("trading_status")?,
        otc_flag: r.try_get("otc_flag")?,
        buy_available_flag: r.try_get("buy_available_flag")?,
        sell_available_flag: r.try_get("sell_available_flag")?,
        min_price_increment: r.try_get("min_price_increment")?,
        api_trade_available_flag: r.try_get("api_trade_available_flag")?,
        asset_uid: r.try_get("asset_uid")?,
        for_iis_flag: r.try_get("for_iis_flag")?,
        for_qual_investor_flag: r.try_get("for_qual_investor_flag")?,
        weekend_flag: r.try_get("weekend_flag")?,
        blocked_tca_flag: r.try_get("blocked_tca_flag")?,
        liquidity_flag: r.try_get("liquidity_flag")?,
        first_1min_candle_date: r.try_get("first_1min_candle_date")?,
        first_1day_candle_date: r.try_get("first_1day_candle_date")?,
    })
}

impl CatalogTable for Bond {
    const EXTRA_COLUMNS: &'static [&'static str] = &[
        "aci_value",
        "amortization_flag",
        "country_of_risk",
        "coupon_quantity_per_year",
        "floating_coupon_flag",
        "initial_nominal",
        "issue_kind",
        "issue_size",
        "issue_size_plan",
        "maturity_date",
        "nominal",
        "perpetual_flag",
        "placement_date",
        "placement_price",
        "risk_level",
        "sector",
        "state_reg_date",
        "subordinated_flag",
        "bond_type",
    ];

    fn bind_extra(b: &mut Separated<'_, '_, Postgres, &'static str>, r: &Self) {
        b.push_bind(r.aci_value)
            .push_bind(r.amortization_flag)
            .push_bind(r.country_of_risk.clone())
            .push_bind(r.coupon_quantity_per_year)
            .push_bind(r.floating_coupon_flag)
            .push_bind(r.initial_nominal)
            .push_bind(r.issue_kind.clone())
            .push_bind(r.issue_size.clone())
            .push_bind(r.issue_size_plan.clone())
            .push_bind(r.maturity_date.clone())
            .push_bind(r.nominal)
            .push_bind(r.perpetual_flag)
            .push_bind(r.placement_date.clone())
            .push_bind(r.placement_price)
            .push_bind(r.risk_level.clone())
            .push_bind(r.sector.clone())
            .push_bind(r.state_reg_date.clone())
            .push_bind(r.subordinated_flag)
            .push_bind(r.bond_type.clone());
    }

    fn decode(r: &PgRow, common: InstrumentCommon) -> Result<Self> {
        Ok(Bond {
            common,
            aci_value: r.try_get("aci_value")?,
            amortization_flag: r.try_get("amortization_flag")?,
            country_of_risk: r.try_get("country_of_risk")?,
            coupon_quantity_per_year: r.try_get("coupon_quantity_per_year")?,
            floating_coupon_flag: r.try_get("floating_coupon_flag")?,
            initial_nominal: r.try_get("initial_nominal")?,
            issue_kind: r.try_get("issue_kind")?,
            issue_size: r.try_get("issue_size")?,
            issue_size_plan: r.try_get("issue_size_plan")?,
            maturity_date: r.try_get("maturity_date")?,
            nominal: r.try_get("nominal")?,
            perpetual_flag: r.try_get("perpetual_flag")?,
            placement_date: r.try_get("placement_date")?,
            placement_price: r.try_get("placement_price")?,
            risk_level: r.try_get("risk_level")?,
            sector: r.try_get("sector")?,
            state_reg_date: r.try_get("state_reg_date")?,
            subordinated_flag: r.try_get("subordinated_flag")?,
            bond_type: r.try_get("bond_type")?,
        })
    }
}

impl CatalogTable for Share {
    const EXTRA_COLUMNS: &'static [&'static str] = &[
        "div_yield_flag",
        "ipo_date",
        "issue_size",
        "issue_size_plan",
        "nominal",
        "sector",
        "share_type",
    ];

    fn bind_extra(b: &mut Separated<'_, '_, Postgres, &'static str>, r: &Self) {
        b.push_bind(r.div_yield_flag)
            .push_bind(r.ipo_date.clone())
            .push_bind(r.issue_size.clone())
            .push_bind(r.issue_size_plan.clone())
            .push_bind(r.nominal)
            .push_bind(r.sector.clone())
            .push_bind(r.share_type.clone());
    }

    fn decode(r: &PgRow, common: InstrumentCommon) -> Result<Self> {
        Ok(Share {
            common,
            div_yield_flag: r.try_get("div_yield_flag")?,
            ipo_date: r.try_get("ipo_date")?,
            issue_size: r.try_get("issue_size")?,
            issue_size_plan: r.try_get("issue_size_plan")?,
            nominal: r.try_get("nominal")?,
            sector: r.try_get("sector")?,
            share_type: r.try_get("share_type")?,
        })
    }
}

impl CatalogTable for Etf {
    const EXTRA_COLUMNS: &'static [&'static str] = &[
        "fixed_commission",
        "focus_type",
        "released_date",
        "num_shares",
        "sector",
        "rebalancing_freq",
    ];

    fn bind_extra(b: &mut Separated<'_, '_, Postgres, &'static str>, r: &Self) {
        b.push_bind(r.fixed_commission)
            .push_bind(r.focus_type.clone())
            .push_bind(r.released_date.clone())
            .push_bind(r.num_shares)
            .push_bind(r.sector.clone())
            .push_bind(r.rebalancing_freq.clone());
    }

    fn decode(r: &PgRow, common: InstrumentCommon) -> Result<Self> {
        Ok(Etf {
            common,
            fixed_commission: r.try_get("fixed_commission")?,
            focus_type: r.try_get("focus_type")?,
            released_date: r.try_get("released_date")?,
            num_shares: r.try_get("num_shares")?,
            sector: r.try_get("sector")?,
            rebalancing_freq: r.try_get("rebalancing_freq")?,
        })
    }
}

impl CatalogTable for Currency {
    const EXTRA_COLUMNS: &'static [&'static str] = &["nominal", "iso_currency_name"];

    fn bind_extra(b: &mut Separated<'_, '_, Postgres, &'static str>, r: &Self) {
        b.push_bind(r.nominal).push_bind(r.iso_currency_name.clone());
    }

    fn decode(r: &PgRow, common: InstrumentCommon) -> Result<Self> {
        Ok(Currency {
            common,
            nominal: r.try_get("nominal")?,
            iso_currency_name: r.try_get("iso_currency_name")?,
        })
    }
}

/// Keeps the last occurrence of each uid. A single upsert statement may not
/// touch the same row twice.
fn dedupe_by_uid<T: CatalogRecord>(records: &[T]) -> Vec<&T> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    let mut out: Vec<&T> = records
        .iter()
        .rev()
        .filter(|r| seen.insert(r.common().uid.as_str()))
        .collect();
    out.reverse();
    out
}

/// Postgres-backed catalog store.
#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn fetch_bonds(&self, limit: i64, offset: i64) -> Result<Vec<Stored<Bond>>> {
        self.fetch_rows(limit, offset).await
    }

    pub async fn fetch_shares(&self, limit: i64, offset: i64) -> Result<Vec<Stored<Share>>> {
        self.fetch_rows(limit, offset).await
    }

    pub async fn fetch_etfs(&self, limit: i64, offset: i64) -> Result<Vec<Stored<Etf>>> {
        self.fetch_rows(limit, offset).await
    }

    pub async fn fetch_currencies(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Stored<Currency>>> {
        self.fetch_rows(limit, offset).await
    }

    /// Index entry for one instrument id, whatever its category.
    pub async fn asset_by_uid(&self, uid: &str) -> Result<Option<Asset>> {
        let row: Option<(String, String)> = sqlx::query_as(&format!(
            "select uid, instrument_type from {ASSETS_TABLE} where uid = $1"
        ))
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .context("asset lookup failed")?;

        row.map(|(uid, instrument_type)| {
            Ok(Asset {
                uid,
                instrument_type: Category::parse(&instrument_type)?,
            })
        })
        .transpose()
    }

    /// Upsert the batch and its asset index rows in one transaction,
    /// `WRITE_CHUNK_SIZE` rows per statement. Any chunk failure rolls the
    /// whole batch back.
    pub async fn save_batch(&self, batch: &InstrumentBatch) -> Result<u64> {
        match batch {
            InstrumentBatch::Bonds(v) => self.save_rows(v).await,
            InstrumentBatch::Shares(v) => self.save_rows(v).await,
            InstrumentBatch::Etfs(v) => self.save_rows(v).await,
            InstrumentBatch::Currencies(v) => self.save_rows(v).await,
        }
    }

    async fn fetch_rows<T: CatalogTable>(&self, limit: i64, offset: i64) -> Result<Vec<Stored<T>>> {
        let table = T::CATEGORY.table_name();
        let sql = format!(
            "select {}, created_at, updated_at from {} \
             order by ticker collate \"C\" asc, uid collate \"C\" asc \
             limit $1 offset $2",
            columns::<T>().join(", "),
            table
        );

        let rows = sqlx::query(&sql)
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("{table} fetch failed"))?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let common = decode_common(&r).with_context(|| format!("{table} decode failed"))?;
            out.push(Stored {
                record: T::decode(&r, common).with_context(|| format!("{table} decode failed"))?,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            });
        }
        Ok(out)
    }

    async fn load<T: CatalogTable>(&self, limit: i64, offset: i64) -> Result<InstrumentBatch> {
        let rows = self.fetch_rows::<T>(limit, offset).await?;
        Ok(T::into_batch(
            rows.into_iter().map(Stored::into_record).collect(),
        ))
    }

    async fn save_rows<T: CatalogTable>(&self, records: &[T]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let table = T::CATEGORY.table_name();
        let rows = dedupe_by_uid(records);
        let cols = columns::<T>();
        let insert_head = format!("insert into {} ({}) ", table, cols.join(", "));
        let conflict_tail = format!(" on conflict (uid) do update set {}", update_set(&cols));

        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| format!("{table} save: begin failed"))?;

        let mut written: u64 = 0;
        for (i, chunk) in rows.chunks(WRITE_CHUNK_SIZE).enumerate() {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(&insert_head);
            qb.push_values(chunk, |mut b, r| {
                bind_common(&mut b, r.common());
                T::bind_extra(&mut b, r);
            });
            qb.push(&conflict_tail);

            // Returning early drops `tx`, which rolls back.
            let res = qb
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("{table} save: chunk {i} failed"))?;
            written += res.rows_affected();
        }

        let asset_head = format!("insert into {ASSETS_TABLE} (uid, instrument_type) ");
        let asset_tail =
            " on conflict (uid) do update set instrument_type = excluded.instrument_type, \
             updated_at = now()";
        for (i, chunk) in rows.chunks(WRITE_CHUNK_SIZE).enumerate() {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(&asset_head);
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.common().uid.clone())
                    .push_bind(T::CATEGORY.as_str());
            });
            qb.push(asset_tail);

            qb.build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("{table} save: asset index chunk {i} failed"))?;
        }

        tx.commit()
            .await
            .with_context(|| format!("{table} save: commit failed"))?;

        tracing::info!(table, rows = written, "catalog batch saved");
        Ok(written)
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn load_category(
        &self,
        category: Category,
        limit: i64,
        offset: i64,
    ) -> Result<InstrumentBatch> {
        match category {
            Category::Bond => self.load::<Bond>(limit, offset).await,
            Category::Share => self.load::<Share>(limit, offset).await,
            Category::Etf => self.load::<Etf>(limit, offset).await,
            Category::Currency => self.load::<Currency>(limit, offset).await,
        }
    }

    async fn save_category(&self, batch: &InstrumentBatch) -> Result<u64> {
        self.save_batch(batch).await
    }
}
