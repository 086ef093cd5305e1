use super::AppContext;
use anyhow::{bail, Result};
use imt_db::{PgCatalogStore, PgPool};

pub async fn connect(ctx: &AppContext) -> Result<PgPool> {
    let url = ctx.secrets.require_database_url()?;
    imt_db::connect(url, ctx.settings.db.max_connections).await
}

pub async fn status(ctx: &AppContext) -> Result<()> {
    let pool = connect(ctx).await?;
    let s = imt_db::status(&pool).await?;
    println!("db_ok={} has_catalog_tables={}", s.ok, s.has_catalog_tables);

    if s.has_catalog_tables {
        for st in imt_db::catalog_stats(&pool).await? {
            let last = st
                .last_updated_at
                .map(|d| d.to_rfc3339())
                .unwrap_or_default();
            println!(
                "category={} rows={} last_updated_at={}",
                st.category, st.rows, last
            );
        }
    }
    Ok(())
}

pub async fn migrate(ctx: &AppContext) -> Result<()> {
    let pool = connect(ctx).await?;
    imt_db::migrate(&pool).await?;
    println!("migrations_applied=true");
    Ok(())
}

pub async fn asset(ctx: &AppContext, uid: &str) -> Result<()> {
    let store = PgCatalogStore::new(connect(ctx).await?);
    match store.asset_by_uid(uid).await? {
        Some(a) => {
            println!("uid={} instrument_type={}", a.uid, a.instrument_type.as_str());
            Ok(())
        }
        None => bail!("asset not found: uid={uid}"),
    }
}
