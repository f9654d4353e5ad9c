use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use hoard::{
    LoadStatus,
    events::{Event, LoadEvent, Subscription, Topic},
};
use hoard_test_utils::{Dirs, dirs};
use rstest::rstest;

use crate::common::{built_in, gui_and_common, tick_times, tick_until};

/// Addresses of `Unloaded` events received so far, by kind.
fn unloaded(events: &mut Subscription, kind: &str) -> Vec<String> {
    events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            Event::Load(LoadEvent::Unloaded { address, kind: k }) if k == kind => Some(address),
            _ => None,
        })
        .collect()
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_requests_share_one_loadable(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;

    let first = hoard.request_asset("ui/icon.png");
    let second = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || first.is_done()).await;

    assert!(second.is_done());
    assert_eq!(first.snapshot(), second.snapshot());
    let stats = hoard.stats();
    assert_eq!(stats.assets, 1);
    assert_eq!(stats.dependencies, 1);
    assert_eq!(stats.packages, 2);

    // A sibling asset in the same package shares the dependency.
    let button = hoard.request_asset("ui/button.png");
    tick_until(&hoard, || button.is_done()).await;
    let stats = hoard.stats();
    assert_eq!(stats.assets, 2);
    assert_eq!(stats.dependencies, 1);
    assert_eq!(stats.packages, 2);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn sibling_assets_keep_their_shared_dependency(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;
    let mut events = hoard.subscribe_to(&[Topic::Load]);

    let icon = hoard.request_asset("ui/icon.png");
    let button = hoard.request_asset("ui/button.png");
    tick_until(&hoard, || icon.is_done() && button.is_done()).await;
    assert_eq!(hoard.stats().dependencies, 1);

    drop(icon);
    tick_until(&hoard, || hoard.stats().assets == 1).await;

    let stats = hoard.stats();
    assert_eq!(stats.dependencies, 1);
    assert_eq!(stats.packages, 2);
    assert!(unloaded(&mut events, "dependency").is_empty());
    assert_eq!(button.status(), LoadStatus::LoadSuccessful);
    assert_eq!(button.bytes(), Some(Bytes::from_static(crate::common::GUI)));

    drop(button);
    tick_until(&hoard, || hoard.stats().loadables == 0).await;
    assert_eq!(unloaded(&mut events, "dependency").len(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn released_asset_unloads_on_next_sweep(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;
    let mut events = hoard.subscribe_to(&[Topic::Load]);

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || icon.is_done()).await;
    let observer = icon.clone();
    drop(icon);
    drop(observer);

    // Parked, not yet gone.
    let stats = hoard.stats();
    assert_eq!(stats.assets, 1);
    assert_eq!(stats.unused, 1);

    tick_until(&hoard, || hoard.stats().loadables == 0).await;
    assert_eq!(unloaded(&mut events, "asset"), vec!["ui/icon.png".to_string()]);
    assert!(hoard.is_idle());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn packages_unload_after_their_dependents(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;
    let mut events = hoard.subscribe_to(&[Topic::Load]);

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || icon.is_done()).await;
    icon.release();
    tick_until(&hoard, || hoard.stats().loadables == 0).await;

    let kinds: Vec<&str> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            Event::Load(LoadEvent::Unloaded { kind, .. }) => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds.len(), 4);
    assert!(kinds[..2].contains(&"asset"));
    assert!(kinds[..2].contains(&"dependency"));
    assert_eq!(kinds[2..], ["package", "package"]);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn reacquire_before_sweep_keeps_it_loaded(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;
    let mut events = hoard.subscribe_to(&[Topic::Load]);

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || icon.is_done()).await;
    drop(icon);

    let again = hoard.request_asset("ui/icon.png");
    assert_eq!(again.status(), LoadStatus::LoadSuccessful);
    tick_times(&hoard, 5).await;

    assert_eq!(again.status(), LoadStatus::LoadSuccessful);
    assert_eq!(hoard.stats().assets, 1);
    assert_eq!(hoard.stats().unused, 0);
    assert!(unloaded(&mut events, "asset").is_empty());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn completion_fires_once_per_callback(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;
    let fired = Arc::new(AtomicUsize::new(0));

    let icon = hoard.request_asset("ui/icon.png");
    let counter = Arc::clone(&fired);
    icon.on_complete(move |snapshot| {
        assert!(snapshot.is_successful());
        counter.fetch_add(1, Ordering::SeqCst);
    });
    tick_until(&hoard, || icon.is_done()).await;
    tick_times(&hoard, 3).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Registered after the fact: runs at once.
    let counter = Arc::clone(&fired);
    icon.on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 2);

    let snapshot = icon.wait().await;
    assert!(snapshot.is_successful());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn handles_outliving_shutdown_report_unloaded(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || icon.is_done()).await;
    hoard.shutdown();

    assert_eq!(icon.status(), LoadStatus::Unloaded);
    assert!(icon.bytes().is_none());
    assert_eq!(hoard.stats().loadables, 0);
    assert!(!hoard.contains_asset("ui/icon.png"));
}
