//! End-to-end behaviour of the on-demand entry point against SQLite
mod common;

use common::Harness;
use listing_harvester_lib::domain::ListingStore;
use listing_harvester_lib::{HaltReason, HarvestError};

#[tokio::test]
async fn taladro_scenario_serves_first_page_after_empty_second() {
    let h = Harness::in_memory().await;
    h.upstream.listings("taladro", 1, 5);
    h.upstream.empty("taladro", 2);

    let response = h.state.on_demand.get_products("taladro", 2).await.unwrap();

    assert_eq!(response.rows.len(), 5);
    assert!(response.rows.iter().all(|row| row.page == 1));
    assert_eq!(response.watermark, 1);
    assert_eq!(response.halt, Some(HaltReason::Exhausted));
    assert_eq!(h.watermark("taladro").await, 1);
}

#[tokio::test]
async fn second_identical_request_is_served_from_cache() {
    let h = Harness::in_memory().await;
    for page in 1..=3 {
        h.upstream.listings("taladro", page, 4);
    }

    let first = h.state.on_demand.get_products("taladro", 3).await.unwrap();
    h.upstream.reset_calls();
    let second = h.state.on_demand.get_products("taladro", 3).await.unwrap();

    assert_eq!(first.rows, second.rows);
    assert!(h.upstream.fetched("taladro").is_empty());
    assert_eq!(second.halt, None);
    assert!(second.fetched_pages.is_empty());
}

#[tokio::test]
async fn only_the_gap_is_fetched() {
    let h = Harness::in_memory().await;
    for page in 1..=5 {
        h.upstream.listings("taladro", page, 2);
    }
    h.state.on_demand.get_products("taladro", 3).await.unwrap();
    h.upstream.reset_calls();

    let response = h.state.on_demand.get_products("taladro", 5).await.unwrap();

    assert_eq!(h.upstream.fetched("taladro"), vec![4, 5]);
    assert_eq!(response.fetched_pages, vec![4, 5]);
    assert_eq!(response.rows.len(), 10);
    assert_eq!(h.watermark("taladro").await, 5);
}

#[tokio::test]
async fn smaller_request_serves_a_prefix_without_fetching() {
    let h = Harness::in_memory().await;
    for page in 1..=4 {
        h.upstream.listings("taladro", page, 2);
    }
    h.state.on_demand.get_products("taladro", 4).await.unwrap();
    h.upstream.reset_calls();

    let response = h.state.on_demand.get_products("taladro", 2).await.unwrap();

    assert!(h.upstream.fetched("taladro").is_empty());
    assert_eq!(response.served_through_page, 2);
    assert_eq!(response.rows.len(), 4);
    assert_eq!(response.watermark, 4);
    assert!(!response.is_short());
}

#[tokio::test]
async fn failure_mid_range_keeps_earlier_pages_and_stops() {
    let h = Harness::in_memory().await;
    h.upstream.listings("taladro", 1, 3);
    h.upstream.fail("taladro", 2);
    h.upstream.listings("taladro", 3, 3);
    h.upstream.listings("taladro", 4, 3);

    let response = h.state.on_demand.get_products("taladro", 4).await.unwrap();

    assert_eq!(h.upstream.fetched("taladro"), vec![1, 2]);
    assert_eq!(h.watermark("taladro").await, 1);
    assert_eq!(response.rows.len(), 3);
    assert_eq!(response.halt, Some(HaltReason::Error));
    assert!(response.is_partial());
}

#[tokio::test]
async fn empty_page_does_not_advance_watermark() {
    let h = Harness::in_memory().await;
    h.upstream.listings("taladro", 1, 2);
    h.upstream.listings("taladro", 2, 2);
    h.state.on_demand.get_products("taladro", 2).await.unwrap();
    h.upstream.empty("taladro", 3);
    h.upstream.listings("taladro", 4, 2);
    h.upstream.reset_calls();

    let response = h.state.on_demand.get_products("taladro", 4).await.unwrap();

    assert_eq!(h.upstream.fetched("taladro"), vec![3]);
    assert_eq!(response.watermark, 2);
    assert_eq!(response.served_through_page, 2);
}

#[tokio::test]
async fn nothing_obtainable_is_not_found() {
    let h = Harness::in_memory().await;

    let err = h.state.on_demand.get_products("producto inexistente", 2).await.unwrap_err();

    assert!(matches!(err, HarvestError::NotFound { max_page: 2, .. }));
    // the attempt is still recorded
    assert!(h.store.find_query("producto inexistente").await.unwrap().is_some());
}

#[tokio::test]
async fn upstream_down_without_cache_is_reported_as_such() {
    let h = Harness::in_memory().await;
    h.upstream.fail("taladro", 1);

    let err = h.state.on_demand.get_products("taladro", 1).await.unwrap_err();

    assert!(matches!(err, HarvestError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn refetching_identical_pages_never_duplicates() {
    let h = Harness::in_memory().await;
    h.upstream.listings("taladro", 1, 4);
    h.state.on_demand.get_products("taladro", 1).await.unwrap();

    // same page committed again through a refresh
    h.state.refresh.refresh_all().await.unwrap();
    h.state.refresh.refresh_all().await.unwrap();

    assert_eq!(h.product_count("taladro").await, 4);
}

#[tokio::test]
async fn terms_are_normalised_before_lookup() {
    let h = Harness::in_memory().await;
    h.upstream.listings("taladro", 1, 1);
    h.state.on_demand.get_products("  TALADRO ", 1).await.unwrap();
    h.upstream.reset_calls();

    let response = h.state.on_demand.get_products("Taladro", 1).await.unwrap();

    assert_eq!(response.term, "taladro");
    assert!(h.upstream.fetched("taladro").is_empty());
    assert_eq!(h.store.list_queries().await.unwrap().len(), 1);
}
