//! Reference counting, deduplication and cascading unload in the bundle cache.

mod common;

use std::sync::{Arc, Mutex};

use common::{RecordingHandler, manifest, progress_recorder};
use stowage::{BundleCache, CacheSetting, Error};
use stowage_fetch::{FetchHandler, ProgressSink};
use stowage_manifest::Fingerprint;

fn cache_with(handler: &Arc<RecordingHandler>, bundles: &[(&str, u32, &[&str])]) -> BundleCache {
    let cache = BundleCache::new(Arc::clone(handler) as Arc<dyn FetchHandler>);
    cache.set_manifest(manifest(bundles));
    cache
}

async fn wait_for_waiters(cache: &BundleCache, name: &str, waiters: usize) {
    for _ in 0..1000 {
        if cache.waiters(name) == waiters {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {waiters} waiters on {name}, found {}", cache.waiters(name));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let handler = Arc::new(RecordingHandler::gated());
    let cache = cache_with(&handler, &[("X", 1, &[])]);

    let requests: Vec<_> = (0..3)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_bundle("X", CacheSetting::UseManifest).await })
        })
        .collect();

    wait_for_waiters(&cache, "X", 3).await;
    assert!(cache.is_loading("X"));
    assert_eq!(cache.ref_count("X"), None);
    handler.open();

    let mut bundles = Vec::new();
    for request in requests {
        bundles.push(request.await.unwrap().unwrap());
    }
    assert!(bundles[0].same_resource(&bundles[1]));
    assert!(bundles[0].same_resource(&bundles[2]));
    assert_eq!(handler.count("X"), 1);
    assert_eq!(cache.ref_count("X"), Some(3));
    assert!(!cache.is_loading("X"));
}

#[tokio::test]
async fn test_waiters_are_notified_in_request_order() {
    let handler = Arc::new(RecordingHandler::gated());
    let cache = cache_with(&handler, &[("X", 1, &[])]);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut requests = Vec::new();
    for i in 0..5 {
        let order = Arc::clone(&order);
        let sink: ProgressSink = Arc::new(move |p| {
            if p >= 1.0 {
                order.lock().unwrap().push(i);
            }
        });
        let task_cache = cache.clone();
        requests.push(tokio::spawn(async move {
            task_cache.get_bundle_with_progress("X", CacheSetting::UseManifest, Some(sink)).await
        }));
        wait_for_waiters(&cache, "X", i + 1).await;
    }
    handler.open();

    for request in requests {
        request.await.unwrap().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), [0, 1, 2, 3, 4]);
    assert_eq!(cache.ref_count("X"), Some(5));
}

#[tokio::test]
async fn test_progress_reaches_every_waiter() {
    let handler = Arc::new(RecordingHandler::gated().reporting(&[0.25, 0.1, 0.75, 1.0]));
    let cache = cache_with(&handler, &[("X", 1, &["D"]), ("D", 1, &[])]);

    let mut requests = Vec::new();
    let mut recorders = Vec::new();
    for waiters in 1..=2 {
        let (sink, seen) = progress_recorder();
        recorders.push(seen);
        let task_cache = cache.clone();
        requests.push(tokio::spawn(async move {
            task_cache.get_bundle_with_progress("X", CacheSetting::UseManifest, Some(sink)).await
        }));
        wait_for_waiters(&cache, "X", waiters).await;
    }
    // A request without a sink shares the load all the same.
    let silent = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_bundle("X", CacheSetting::UseManifest).await })
    };
    wait_for_waiters(&cache, "X", 3).await;
    handler.open();

    for request in requests {
        request.await.unwrap().unwrap();
    }
    silent.await.unwrap().unwrap();
    for seen in recorders {
        assert_eq!(*seen.lock().unwrap(), [0.25_f32, 0.75, 1.0]);
    }
    assert_eq!(handler.count("X"), 1);
}

#[tokio::test]
async fn test_active_hit_reports_completion_only() {
    let handler = Arc::new(RecordingHandler::new().reporting(&[0.5]));
    let cache = cache_with(&handler, &[("X", 1, &[])]);
    cache.get_bundle("X", CacheSetting::UseManifest).await.unwrap();

    let (sink, seen) = progress_recorder();
    cache
        .get_bundle_with_progress("X", CacheSetting::UseManifest, Some(sink))
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), [1.0_f32]);
    assert_eq!(handler.count("X"), 1);
}

#[tokio::test]
async fn test_failed_load_still_completes_progress() {
    let handler = Arc::new(RecordingHandler::new().failing(&["X"]).reporting(&[0.5]));
    let cache = cache_with(&handler, &[("X", 1, &[])]);

    let (sink, seen) = progress_recorder();
    let result = cache.get_bundle_with_progress("X", CacheSetting::UseManifest, Some(sink)).await;
    assert!(matches!(result, Err(Error::Unavailable { .. })));
    assert_eq!(*seen.lock().unwrap(), [0.5_f32, 1.0]);
}

#[tokio::test]
async fn test_cycle_check_skipped_for_active_bundle() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 1, &[]), ("B", 1, &[])]);
    cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap();

    // Already-loaded bundles are served as they are, even if a later
    // manifest makes their graph cyclic; new loads are still rejected.
    cache.set_manifest(manifest(&[("A", 1, &["B"]), ("B", 1, &["A"])]));
    assert!(cache.get_bundle("A", CacheSetting::UseManifest).await.is_ok());
    assert_eq!(cache.ref_count("A"), Some(2));
    assert!(matches!(
        cache.get_bundle("B", CacheSetting::UseManifest).await,
        Err(Error::DependencyCycle { .. })
    ));
    assert!(!cache.is_loading("B"));
}

#[tokio::test]
async fn test_ref_count_tracks_gets_and_unloads() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("X", 1, &[])]);

    let first = cache.get_bundle("X", CacheSetting::UseManifest).await.unwrap();
    let second = cache.get_bundle("X", CacheSetting::UseManifest).await.unwrap();
    assert!(first.same_resource(&second));
    assert_eq!(handler.count("X"), 1);
    assert_eq!(cache.ref_count("X"), Some(2));

    assert_eq!(cache.unload_bundle("X", false, false), 0);
    assert_eq!(cache.ref_count("X"), Some(1));
    assert!(!first.is_released());

    assert_eq!(cache.unload_bundle("X", true, false), 1);
    assert_eq!(cache.ref_count("X"), None);
    assert!(first.is_released());
    assert!(first.loaded_objects_destroyed());

    assert_eq!(cache.unload_bundle("X", false, false), 0);
    assert_eq!(cache.unload_bundle("never-loaded", false, true), 0);
}

#[tokio::test]
async fn test_force_unload_ignores_remaining_references() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("X", 1, &[])]);

    for _ in 0..4 {
        cache.get_bundle("X", CacheSetting::UseManifest).await.unwrap();
    }
    assert_eq!(cache.ref_count("X"), Some(4));
    assert_eq!(cache.unload_bundle("X", false, true), 1);
    assert!(cache.active_names().is_empty());
}

#[tokio::test]
async fn test_dependencies_load_before_dependent() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 1, &["B", "C"]), ("B", 2, &[]), ("C", 3, &[])]);

    let a = cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap();
    assert_eq!(a.fingerprint(), &Fingerprint::from_version(1));

    let names = handler.names();
    assert_eq!(names.len(), 3);
    assert_eq!(names.last().map(String::as_str), Some("A"));
    assert_eq!(cache.dependencies("A").unwrap(), ["B", "C"]);
    assert_eq!(cache.ref_count("B"), Some(1));
    assert_eq!(cache.ref_count("C"), Some(1));
    assert_eq!(cache.active_names(), ["A", "B", "C"]);
}

#[tokio::test]
async fn test_cascading_unload_releases_whole_graph() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 1, &["B"]), ("B", 1, &["C"]), ("C", 1, &[])]);

    let a = cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap();
    let c = cache.get_bundle("C", CacheSetting::UseManifest).await.unwrap();
    assert_eq!(cache.ref_count("C"), Some(2));

    assert_eq!(cache.unload_bundle("A", false, false), 2);
    assert!(a.is_released());
    assert_eq!(cache.active_names(), ["C"]);
    assert_eq!(cache.ref_count("C"), Some(1));
    assert!(!c.is_released());

    assert_eq!(cache.unload_bundle("C", false, false), 1);
    assert!(cache.active_names().is_empty());
}

#[tokio::test]
async fn test_shared_dependency_is_fetched_once() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 1, &["S"]), ("B", 1, &["S"]), ("S", 1, &[])]);

    let (a, b) = tokio::join!(
        cache.get_bundle("A", CacheSetting::UseManifest),
        cache.get_bundle("B", CacheSetting::UseManifest),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(handler.count("S"), 1);
    assert_eq!(cache.ref_count("S"), Some(2));

    cache.unload_bundle("A", false, false);
    assert_eq!(cache.ref_count("S"), Some(1));
    cache.unload_bundle("B", false, false);
    assert!(cache.active_names().is_empty());
}

#[tokio::test]
async fn test_failure_reaches_every_waiter_and_leaves_no_entry() {
    let handler = Arc::new(RecordingHandler::gated().failing(&["X"]));
    let cache = cache_with(&handler, &[("X", 1, &[])]);

    let requests: Vec<_> = (0..2)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_bundle("X", CacheSetting::UseManifest).await })
        })
        .collect();
    wait_for_waiters(&cache, "X", 2).await;
    handler.open();

    for request in requests {
        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Unavailable { ref name } if name == "X"));
    }
    assert!(!cache.is_loading("X"));
    assert_eq!(cache.ref_count("X"), None);

    // A later request starts over.
    assert!(cache.get_bundle("X", CacheSetting::UseManifest).await.is_err());
    assert_eq!(handler.count("X"), 2);
}

#[tokio::test]
async fn test_failed_dependency_does_not_block_dependent() {
    let handler = Arc::new(RecordingHandler::new().failing(&["B"]));
    let cache = cache_with(&handler, &[("A", 1, &["B", "C"]), ("B", 1, &[]), ("C", 1, &[])]);

    cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap();
    assert_eq!(cache.dependencies("A").unwrap(), ["C"]);
    assert_eq!(cache.active_names(), ["A", "C"]);

    cache.unload_bundle("A", false, false);
    assert!(cache.active_names().is_empty());
}

#[tokio::test]
async fn test_failed_dependent_returns_dependency_references() {
    let handler = Arc::new(RecordingHandler::new().failing(&["A"]));
    let cache = cache_with(&handler, &[("A", 1, &["B"]), ("B", 1, &[])]);

    assert!(cache.get_bundle("A", CacheSetting::UseManifest).await.is_err());
    assert_eq!(handler.names(), ["B", "A"]);
    assert!(cache.active_names().is_empty());
}

#[tokio::test]
async fn test_cycle_is_rejected_before_fetching() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 1, &["B"]), ("B", 1, &["A"]), ("free", 1, &[])]);

    let err = cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap_err();
    match err {
        Error::DependencyCycle { name, cycle } => {
            assert_eq!(name, "A");
            assert_eq!(cycle.first(), cycle.last());
        }
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
    assert!(handler.names().is_empty());

    assert!(cache.get_bundle("free", CacheSetting::UseManifest).await.is_ok());
}

#[tokio::test]
async fn test_requests_fail_fast_without_manifest() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = BundleCache::new(Arc::clone(&handler) as Arc<dyn FetchHandler>);

    assert!(!cache.is_initialized());
    let err = cache.get_bundle("X", CacheSetting::UseManifest).await.unwrap_err();
    assert!(matches!(err, Error::NotInitialized));
    assert!(handler.names().is_empty());
}

#[tokio::test]
async fn test_bypass_requests_unversioned_main_bundle_only() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 4, &["B"]), ("B", 5, &[])]);

    cache.get_bundle("A", CacheSetting::Bypass).await.unwrap();
    assert_eq!(handler.commands(), [
        ("B".to_string(), Fingerprint::from_version(5)),
        ("A".to_string(), Fingerprint::unversioned()),
    ]);
}

#[tokio::test]
async fn test_unknown_bundle_is_requested_unversioned() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[]);

    cache.get_bundle("extra", CacheSetting::UseManifest).await.unwrap();
    assert_eq!(handler.commands(), [("extra".to_string(), Fingerprint::unversioned())]);
}

#[tokio::test]
async fn test_unload_uses_dependencies_recorded_at_load_time() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 1, &["B"]), ("B", 1, &[]), ("C", 1, &[])]);

    cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap();
    cache.get_bundle("C", CacheSetting::UseManifest).await.unwrap();
    cache.set_manifest(manifest(&[("A", 2, &["C"]), ("B", 1, &[]), ("C", 1, &[])]));

    cache.unload_bundle("A", false, false);
    assert_eq!(cache.active_names(), ["C"]);
    assert_eq!(cache.ref_count("C"), Some(1));
}

#[tokio::test]
async fn test_dispose_releases_everything() {
    let handler = Arc::new(RecordingHandler::new());
    let cache = cache_with(&handler, &[("A", 1, &["B"]), ("B", 1, &[])]);

    let a = cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap();
    cache.get_bundle("A", CacheSetting::UseManifest).await.unwrap();
    cache.dispose();

    assert!(a.is_released());
    assert!(a.loaded_objects_destroyed());
    assert!(cache.active_names().is_empty());
    assert_eq!(cache.unload_bundle("A", false, false), 0);
}
