//! Remote fan-out: each category is fetched on its own task and loads or
//! fails independently of the others.

use imt_cache::{CatalogError, InstrumentCache, LoadSource};
use imt_schemas::{Category, InstrumentBatch};
use imt_testkit::fixtures::{bonds, currency, etf, share};
use imt_testkit::{Step, StubSource};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_equals_what_the_source_returned() {
    let b = bonds(3);
    let s = vec![share("SBER"), share("GAZP")];
    let e = vec![etf("TMOS")];
    let c = vec![currency("USD000UTSTOM"), currency("EUR_RUB__TOM")];
    let source = Arc::new(
        StubSource::new()
            .with(InstrumentBatch::Bonds(b.clone()))
            .with(InstrumentBatch::Shares(s.clone()))
            .with(InstrumentBatch::Etfs(e.clone()))
            .with(InstrumentBatch::Currencies(c.clone())),
    );
    let cache = InstrumentCache::builder(source.clone()).build();
    let cancel = CancellationToken::new();

    let report = cache.initialize(&cancel).await.unwrap();
    assert_eq!(report.source, LoadSource::Remote);
    assert_eq!(report.loaded.len(), 4);
    assert!(report.failures.is_empty());

    assert_eq!(*cache.bonds(&cancel).await.unwrap(), b);
    assert_eq!(*cache.shares(&cancel).await.unwrap(), s, "source order is kept");
    assert_eq!(*cache.etfs(&cancel).await.unwrap(), e);
    assert_eq!(*cache.currencies(&cancel).await.unwrap(), c);
    for cat in Category::ALL {
        assert_eq!(source.calls_for(cat), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_of_four_is_enough() {
    let source = Arc::new(
        StubSource::new()
            .with(InstrumentBatch::Etfs(vec![etf("TMOS"), etf("TGLD")]))
            .failing(Category::Bond, "catalog http error method=Bonds status=500")
            .failing(Category::Share, "connection reset")
            .failing(Category::Currency, "catalog response decode failed"),
    );
    let cache = InstrumentCache::builder(source).build();
    let cancel = CancellationToken::new();

    let report = cache.initialize(&cancel).await.expect("partial success is success");
    assert_eq!(report.loaded.get(&Category::Etf), Some(&2));
    let failed: Vec<Category> = report.failures.iter().map(|f| f.category).collect();
    assert_eq!(failed, vec![Category::Bond, Category::Share, Category::Currency]);

    assert_eq!(cache.etfs(&cancel).await.unwrap().len(), 2);
    assert!(cache.bonds(&cancel).await.unwrap().is_empty());
    assert!(cache.shares(&cancel).await.unwrap().is_empty());
    assert!(cache.currencies(&cancel).await.unwrap().is_empty());
    assert!(cache.is_initialized().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn explicit_empty_list_counts_as_loaded() {
    // Unscripted categories return an empty list.
    let source = Arc::new(StubSource::new());
    let cache = InstrumentCache::builder(source).build();
    let cancel = CancellationToken::new();

    let report = cache.initialize(&cancel).await.unwrap();
    assert_eq!(report.loaded.len(), 4);
    assert!(report.loaded.values().all(|n| *n == 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_fetch_fails_only_its_category() {
    let source = Arc::new(
        StubSource::new()
            .with(InstrumentBatch::Bonds(bonds(2)))
            .panicking(Category::Share, "decoder blew up"),
    );
    let cache = InstrumentCache::builder(source).build();
    let cancel = CancellationToken::new();

    let report = cache.initialize(&cancel).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].category, Category::Share);
    assert!(report.failures[0].message.contains("fetch task panicked: decoder blew up"));
    assert_eq!(cache.bonds(&cancel).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batch_of_the_wrong_category_is_rejected() {
    let source = Arc::new(StubSource::new().with(InstrumentBatch::Bonds(bonds(1))));
    // Script the share slot with bonds: the cache must not file them as shares.
    source.set(Category::Share, Step::Records(InstrumentBatch::Bonds(bonds(4))));
    let cache = InstrumentCache::builder(source).build();
    let cancel = CancellationToken::new();

    let report = cache.initialize(&cancel).await.unwrap();
    assert!(report
        .failures
        .iter()
        .any(|f| f.category == Category::Share));
    assert!(cache.shares(&cancel).await.unwrap().is_empty());
    assert_eq!(cache.bonds(&cancel).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_failed_error_names_every_category() {
    let source = Arc::new(
        StubSource::new()
            .failing(Category::Bond, "e1")
            .failing(Category::Share, "e2")
            .failing(Category::Etf, "e3")
            .failing(Category::Currency, "e4"),
    );
    let cache = InstrumentCache::builder(source).build();
    let err = cache
        .initialize(&CancellationToken::new())
        .await
        .unwrap_err();
    match &err {
        CatalogError::NoCategoryLoaded { failures } => assert_eq!(failures.len(), 4),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "no instrument category loaded: bonds: e1; shares: e2; etfs: e3; currencies: e4"
    );
}
