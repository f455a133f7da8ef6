//! Refresh sweeps and concurrent access against SQLite
mod common;

use std::sync::Arc;

use common::{Harness, raw_listings, test_config};
use listing_harvester_lib::domain::{ListingStore, RawListing};
use listing_harvester_lib::HaltReason;

#[tokio::test]
async fn refresh_rescrapes_from_page_one_and_merges() {
    let h = Harness::in_memory().await;
    h.upstream.listings("taladro", 1, 2);
    h.upstream.listings("taladro", 2, 2);
    h.state.on_demand.get_products("taladro", 2).await.unwrap();
    h.upstream.reset_calls();

    // page 1 now shows an extra listing; old ones are kept
    let mut page_one = raw_listings(1, 2);
    page_one.push(RawListing {
        title: Some("Taladro nuevo".into()),
        price: Some("$ 99.000".into()),
        ..RawListing::default()
    });
    h.upstream.set("taladro", 1, Ok(page_one));

    let report = h.state.refresh.refresh_all().await.unwrap();

    assert_eq!(h.upstream.fetched("taladro"), vec![1, 2]);
    assert_eq!(report.queries_processed, 1);
    assert_eq!(report.outcomes[0].rows_added, 1);
    assert_eq!(h.product_count("taladro").await, 5);
    assert_eq!(h.watermark("taladro").await, 2);
}

#[tokio::test]
async fn failed_refresh_never_lowers_watermark() {
    let h = Harness::in_memory().await;
    for page in 1..=3 {
        h.upstream.listings("taladro", page, 2);
    }
    h.state.on_demand.get_products("taladro", 3).await.unwrap();
    let before = h.store.find_query("taladro").await.unwrap().unwrap();

    h.upstream.fail("taladro", 1);
    let report = h.state.refresh.refresh_all().await.unwrap();

    assert_eq!(report.queries_failed, 1);
    assert_eq!(report.outcomes[0].halt, Some(HaltReason::Error));
    let after = h.store.find_query("taladro").await.unwrap().unwrap();
    assert_eq!(after.watermark, 3);
    assert!(after.last_updated >= before.last_updated);
    assert_eq!(h.product_count("taladro").await, 6);
}

#[tokio::test]
async fn one_failing_query_does_not_abort_the_sweep() {
    let h = Harness::in_memory().await;
    for term in ["airpods", "broca", "taladro"] {
        h.upstream.listings(term, 1, 2);
        h.state.on_demand.get_products(term, 1).await.unwrap();
    }
    h.upstream.fail("broca", 1);
    h.upstream.reset_calls();

    let report = h.state.refresh.refresh_all().await.unwrap();

    assert_eq!(report.queries_processed, 3);
    assert_eq!(report.queries_failed, 1);
    let failed: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|o| o.failed())
        .map(|o| o.term.as_str())
        .collect();
    assert_eq!(failed, vec!["broca"]);
    assert_eq!(h.upstream.fetched("airpods"), vec![1]);
    assert_eq!(h.upstream.fetched("taladro"), vec![1]);
}

#[tokio::test]
async fn never_scraped_queries_are_skipped() {
    let h = Harness::in_memory().await;
    // creates the query but leaves the watermark at 0
    let _ = h.state.on_demand.get_products("vacio", 1).await;
    h.upstream.reset_calls();

    let report = h.state.refresh.refresh_all().await.unwrap();

    assert_eq!(report.queries_processed, 0);
    assert_eq!(report.queries_skipped, 1);
    assert!(h.upstream.fetched("vacio").is_empty());
}

#[tokio::test]
async fn concurrent_requests_for_one_term_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("listings.db").display());
    let mut config = test_config();
    config.scraping.commit_retry_limit = 10;
    let h = Arc::new(Harness::with_url(&url, config).await);
    for page in 1..=3 {
        h.upstream.listings("taladro", page, 4);
    }

    let mut handles = Vec::new();
    for pages in [2, 3, 3, 1] {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.state.on_demand.get_products("taladro", pages).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.watermark("taladro").await, 3);
    assert_eq!(h.product_count("taladro").await, 12);
    assert_eq!(h.store.list_queries().await.unwrap().len(), 1);
}
