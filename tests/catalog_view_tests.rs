//! End-to-end behavior of a mounted catalog view against the in-memory fake.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use species_catalog_lib::catalog::{ItemStatus, RetryPolicy};
use species_catalog_lib::domain::AcquisitionMode;
use species_catalog_lib::infrastructure::config::CatalogConfig;
use species_catalog_lib::test_utils::{FakeCatalog, detail, locator_for, shared};
use species_catalog_lib::{CatalogError, CatalogView, FilterState, OperationStatus, ViewEvent};
use tokio_test::{assert_err, assert_ok};

fn view(fake: FakeCatalog) -> (Arc<FakeCatalog>, CatalogView) {
    let (fake, api) = shared(fake);
    let view = CatalogView::new(
        api,
        CatalogConfig::default(),
        RetryPolicy::default().without_jitter(),
    );
    (fake, view)
}

fn categories(names: &[&str]) -> FilterState {
    FilterState::new("", names.iter().copied(), std::iter::empty())
}

fn ranges(ids: &[u32]) -> FilterState {
    FilterState::new("", Vec::<String>::new(), ids.iter().copied())
}

/// `total` species that all share the fire category, named `fire-0001`...
fn fire_catalog(total: u32) -> FakeCatalog {
    FakeCatalog::from_species(
        (1..=total)
            .map(|id| detail(&format!("fire-{id:04}"), id, &["fire"]))
            .collect(),
    )
}

fn assert_unique(view_stubs: &[species_catalog_lib::SpeciesStub]) {
    let unique: HashSet<_> = view_stubs.iter().map(|s| s.identifier.as_str()).collect();
    assert_eq!(unique.len(), view_stubs.len(), "duplicate identifiers in stub list");
}

#[tokio::test(start_paused = true)]
async fn mount_emits_stub_replacement() {
    let (_, view) = view(FakeCatalog::generated(45));
    let mut events = view.subscribe();

    view.mount().await.unwrap();

    match events.recv().await.unwrap() {
        ViewEvent::StubsReplaced {
            mode,
            count,
            more_available,
        } => {
            assert_eq!(mode, AcquisitionMode::Paginated);
            assert_eq!(count, 20);
            assert!(more_available);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn mode_switch_clears_item_cache() {
    let (fake, view) = view(FakeCatalog::generated(40));
    view.mount().await.unwrap();
    view.resolve_item("charmander").await.unwrap();
    assert_eq!(fake.detail_requests(&locator_for(4)), 1);

    // Same mode, cached record is reused
    view.resolve_item("charmander").await.unwrap();
    assert_eq!(fake.detail_requests(&locator_for(4)), 1);

    view.set_filters(ranges(&[1])).await.unwrap();
    let snapshot = view.snapshot().await;
    assert_eq!(snapshot.mode, AcquisitionMode::RangeScan);
    let charmander = snapshot
        .visible
        .iter()
        .find(|e| e.stub.identifier == "charmander")
        .unwrap();
    assert_eq!(charmander.status, ItemStatus::Pending);

    view.resolve_item("charmander").await.unwrap();
    assert_eq!(fake.detail_requests(&locator_for(4)), 2);
}

#[tokio::test(start_paused = true)]
async fn category_view_shows_only_resolved_matches() {
    let (_, view) =
        view(FakeCatalog::generated(60).with_detail_latency(Duration::from_millis(50)));
    view.mount().await.unwrap();

    view.set_filters(categories(&["fire"])).await.unwrap();
    // Stubs are in, details are still in flight
    let snapshot = view.snapshot().await;
    assert!(snapshot.total_stubs > 0);
    assert!(snapshot.visible.is_empty());
    assert!(snapshot.detail_batch.is_loading());

    view.settled().await;
    let snapshot = view.snapshot().await;
    assert_eq!(snapshot.visible.len(), snapshot.total_stubs);
    assert!(snapshot.visible.iter().all(|e| e.status == ItemStatus::Resolved));
    assert!(snapshot.visible.iter().any(|e| e.stub.identifier == "charmander"));
    assert_eq!(snapshot.detail_batch, OperationStatus::Idle);

    for entry in &snapshot.visible {
        let detail = view.resolve_item(&entry.stub.identifier).await.unwrap();
        assert!(detail.categories.iter().any(|c| c == "fire"));
    }
}

#[tokio::test(start_paused = true)]
async fn teardown_mid_retry_stops_all_work() {
    let (fake, view) = view(FakeCatalog::generated(20));
    fake.fail_detail("charmander", 10);
    view.mount().await.unwrap();
    view.set_filters(categories(&["fire"])).await.unwrap();

    // First attempt has failed; the fetcher is now backing off
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.detail_requests(&locator_for(4)), 1);

    view.unmount();
    tokio::time::sleep(Duration::from_secs(120)).await;
    view.settled().await;

    assert_eq!(fake.detail_requests(&locator_for(4)), 1);
    let snapshot = view.snapshot().await;
    assert!(snapshot.visible.iter().all(|e| e.stub.identifier != "charmander"));
    assert_eq!(
        view.set_filters(categories(&["water"])).await,
        Err(CatalogError::Cancelled)
    );
}

#[tokio::test(start_paused = true)]
async fn failed_acquisition_can_be_retried() {
    let (fake, view) = view(FakeCatalog::generated(30));
    fake.fail_list_pages(true);

    assert_err!(view.mount().await);
    let snapshot = view.snapshot().await;
    assert!(snapshot.is_failed());
    assert!(matches!(snapshot.initial_load, OperationStatus::Failed(_)));
    assert_eq!(snapshot.total_stubs, 0);
    assert!(!snapshot.is_empty_result());

    fake.fail_list_pages(false);
    assert_ok!(view.reload().await);
    let snapshot = view.snapshot().await;
    assert!(!snapshot.is_failed());
    assert_eq!(snapshot.total_stubs, 20);
}

#[tokio::test(start_paused = true)]
async fn failed_category_keeps_previous_results_out() {
    let (fake, view) = view(FakeCatalog::generated(30));
    fake.fail_category("water");
    view.mount().await.unwrap();

    let result = view.set_filters(categories(&["fire", "water"])).await;
    assert!(matches!(result, Err(CatalogError::Network(_))));
    let snapshot = view.snapshot().await;
    assert_eq!(snapshot.total_stubs, 0);
    assert!(matches!(snapshot.filter_reload, OperationStatus::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn overlapping_pages_never_duplicate_stubs() {
    let (fake, view) = view(FakeCatalog::generated(70).with_page_overlap(5));
    view.mount().await.unwrap();

    let mut added = Vec::new();
    loop {
        let n = view.load_next_page().await.unwrap();
        if n == 0 {
            break;
        }
        added.push(n);
    }

    assert_eq!(added, [20, 20, 10]);
    let stubs = view.visible().await;
    assert_eq!(stubs.len(), 70);
    assert_unique(&stubs);
    let offsets: Vec<u32> = fake.list_requests().iter().map(|r| r.offset).collect();
    assert_eq!(offsets, [0, 20, 40, 60]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_page_loads_are_serialized() {
    let (fake, view) = view(FakeCatalog::generated(100));
    view.mount().await.unwrap();

    let (a, b) = tokio::join!(view.load_next_page(), view.load_next_page());
    assert_eq!(a.unwrap() + b.unwrap(), 40);
    assert_unique(&view.visible().await);
    let offsets: Vec<u32> = fake.list_requests().iter().map(|r| r.offset).collect();
    assert_eq!(offsets, [0, 20, 40]);
}

#[tokio::test(start_paused = true)]
async fn last_filter_change_wins() {
    let (_, view) = view(FakeCatalog::generated(60));
    view.mount().await.unwrap();

    let (_, second) = tokio::join!(
        view.set_filters(categories(&["fire"])),
        view.set_filters(categories(&["water"]))
    );
    second.unwrap();
    view.settled().await;

    assert_eq!(view.filters().await, categories(&["water"]));
    let visible = view.visible().await;
    assert!(!visible.is_empty());
    for stub in visible {
        let detail = view.resolve_item(&stub.identifier).await.unwrap();
        assert!(detail.categories.iter().any(|c| c == "water"));
    }
}

#[tokio::test(start_paused = true)]
async fn comparison_survives_filter_changes() {
    let (_, view) = view(FakeCatalog::generated(40));
    view.mount().await.unwrap();
    view.resolve_item("bulbasaur").await.unwrap();
    view.resolve_item("squirtle").await.unwrap();
    view.toggle_compare("bulbasaur").await.unwrap();
    view.toggle_compare("squirtle").await.unwrap();

    view.set_filters(ranges(&[2])).await.unwrap();
    let snapshot = view.snapshot().await;
    assert!(snapshot.comparison_ready);
    let names: Vec<_> = snapshot.comparison.iter().map(|d| d.identifier.as_str()).collect();
    assert_eq!(names, ["bulbasaur", "squirtle"]);

    // Re-mounting starts with an empty selection
    view.mount().await.unwrap();
    assert!(view.comparison().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn load_more_results_widens_the_window_in_batches() {
    let (fake, view) = view(fire_catalog(120).with_detail_latency(Duration::from_millis(500)));
    view.mount().await.unwrap();
    view.set_filters(categories(&["fire"])).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.total_detail_requests(), 10);

    view.settled().await;
    let snapshot = view.snapshot().await;
    assert_eq!(fake.total_detail_requests(), 50);
    assert_eq!(snapshot.visible.len(), 50);
    assert!(snapshot.can_load_more_results);
    assert_eq!(snapshot.detail_batch, OperationStatus::Idle);

    assert_eq!(view.load_more_results().await.unwrap(), 50);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.total_detail_requests(), 60);
    view.settled().await;
    assert_eq!(fake.total_detail_requests(), 100);
    assert_eq!(view.snapshot().await.visible.len(), 100);

    assert_eq!(view.load_more_results().await.unwrap(), 20);
    view.settled().await;
    let snapshot = view.snapshot().await;
    assert_eq!(snapshot.visible.len(), 120);
    assert!(!snapshot.can_load_more_results);
    assert_eq!(fake.total_detail_requests(), 120);
}

#[tokio::test(start_paused = true)]
async fn repeated_widening_keeps_one_batch_in_flight() {
    let (fake, view) = view(fire_catalog(200).with_detail_latency(Duration::from_millis(500)));
    view.mount().await.unwrap();
    view.set_filters(categories(&["fire"])).await.unwrap();
    assert_eq!(view.load_more_results().await.unwrap(), 50);
    assert_eq!(view.load_more_results().await.unwrap(), 50);
    view.set_search_term("fire").await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.total_detail_requests(), 10);

    // First batch lands at 500ms, the second starts after the 300ms pause
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(fake.total_detail_requests(), 10);
    tokio::time::sleep(Duration::from_millis(340)).await;
    assert_eq!(fake.total_detail_requests(), 20);

    view.settled().await;
    assert_eq!(fake.total_detail_requests(), 150);
    for id in 1..=150 {
        assert_eq!(fake.detail_requests(&locator_for(id)), 1, "species {id}");
    }
}

#[tokio::test(start_paused = true)]
async fn batch_failure_is_cleared_by_the_next_pass() {
    let (fake, view) = view(fire_catalog(5));
    fake.fail_detail("fire-0001", u32::MAX);
    view.mount().await.unwrap();

    view.set_filters(categories(&["fire"])).await.unwrap();
    view.settled().await;
    assert_eq!(
        view.snapshot().await.detail_batch,
        OperationStatus::Failed("1 species could not be resolved".into())
    );

    view.set_filters(FilterState::default()).await.unwrap();
    view.settled().await;
    let snapshot = view.snapshot().await;
    assert_eq!(snapshot.mode, AcquisitionMode::Paginated);
    assert_eq!(snapshot.detail_batch, OperationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn on_demand_resolve_never_duplicates_a_batch_fetch() {
    let (fake, view) = view(fire_catalog(30).with_detail_latency(Duration::from_millis(500)));
    view.mount().await.unwrap();
    view.set_filters(categories(&["fire"])).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.total_detail_requests(), 10);

    // In the running batch: joins the fetch already underway
    let joined = view.resolve_item("fire-0003").await.unwrap();
    assert_eq!(joined.numeric_id, 3);
    assert_eq!(fake.detail_requests(&locator_for(3)), 1);

    // Still queued: fetched now and dropped from the queue
    let pulled = view.resolve_item("fire-0025").await.unwrap();
    assert_eq!(pulled.numeric_id, 25);

    view.settled().await;
    assert_eq!(fake.detail_requests(&locator_for(25)), 1);
    assert_eq!(fake.total_detail_requests(), 30);
    assert_eq!(view.snapshot().await.visible.len(), 30);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn page_loads_keep_identifiers_unique(total in 1u32..120, overlap in 0u32..20, extra in 0usize..8) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let (stub_count, unique_count) = runtime.block_on(async {
            let (_, view) = view(FakeCatalog::generated(total).with_page_overlap(overlap));
            view.mount().await.unwrap();
            for _ in 0..extra {
                view.load_next_page().await.unwrap();
            }
            let stubs = view.visible().await;
            let unique: HashSet<_> = stubs.iter().map(|s| s.identifier.clone()).collect();
            (stubs.len(), unique.len())
        });

        prop_assert_eq!(stub_count, unique_count);
        prop_assert!(stub_count <= total as usize);
    }
}
