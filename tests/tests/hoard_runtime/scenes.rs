use std::{sync::Arc, time::Duration};

use hoard::{Hoard, LoadStatus, SceneMode};
use hoard_test_utils::{Dirs, dirs, package};
use rstest::rstest;

use crate::common::{ManualScenes, built_in_with, tick_times, tick_until};

const LEVEL: &str = "scenes/level.scene";
const OVERLAY: &str = "scenes/overlay.scene";

async fn scene_world(dirs: &Dirs, scenes: &Arc<ManualScenes>) -> Hoard {
    let level = package(
        "level.pack",
        b"level package contents",
        &[LEVEL, OVERLAY, "textures/floor.png"],
        None,
    );
    let host = Arc::clone(scenes);
    built_in_with(dirs, &[&level], &[], move |config| config.with_scene_host(host)).await
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn scene_progress_spans_package_and_activation(dirs: Dirs) {
    let scenes = Arc::new(ManualScenes::default());
    let hoard = scene_world(&dirs, &scenes).await;

    let level = hoard.load_scene(LEVEL, SceneMode::Single);
    tick_until(&hoard, || level.status() == LoadStatus::Loading).await;
    tick_times(&hoard, 2).await;

    // Package share done, activation halfway.
    assert!((level.progress() - 0.65).abs() < 1e-4, "{}", level.progress());
    assert!(!level.is_done());

    scenes.finish();
    tick_until(&hoard, || level.is_done()).await;
    assert!(level.snapshot().is_successful());
    assert!((level.progress() - 1.0).abs() < f32::EPSILON);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_scene_fails_at_request(dirs: Dirs) {
    let scenes = Arc::new(ManualScenes::default());
    let hoard = scene_world(&dirs, &scenes).await;

    let missing = hoard.load_scene("scenes/missing.scene", SceneMode::Single);

    assert_eq!(missing.status(), LoadStatus::LoadFailed);
    assert_eq!(
        missing.error().as_deref(),
        Some("scenes/missing.scene not found in any manifest")
    );
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn additive_scene_lives_as_long_as_the_main_scene(dirs: Dirs) {
    let scenes = Arc::new(ManualScenes::default());
    scenes.finish();
    let hoard = scene_world(&dirs, &scenes).await;

    let level = hoard.load_scene(LEVEL, SceneMode::Single);
    tick_until(&hoard, || level.is_done()).await;
    let overlay = hoard.load_scene(OVERLAY, SceneMode::Additive);
    tick_until(&hoard, || overlay.is_done()).await;
    assert!(overlay.snapshot().is_successful());

    drop(overlay);
    tick_times(&hoard, 5).await;
    assert!(scenes.unloaded().is_empty());
    // Two scenes sharing one dependency on one package.
    assert_eq!(hoard.stats().loadables, 4);
    assert_eq!(hoard.stats().dependencies, 1);

    drop(level);
    tick_until(&hoard, || hoard.stats().loadables == 0).await;
    assert_eq!(scenes.unloaded(), vec![OVERLAY.to_string()]);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn eviction_waits_for_scene_activation(dirs: Dirs) {
    let scenes = Arc::new(ManualScenes::default());
    let hoard = scene_world(&dirs, &scenes).await;

    let floor = hoard.request_asset("textures/floor.png");
    tick_until(&hoard, || floor.is_done()).await;

    let level = hoard.load_scene(LEVEL, SceneMode::Single);
    tick_until(&hoard, || level.status() == LoadStatus::Loading).await;
    drop(floor);
    tick_times(&hoard, 5).await;
    assert_eq!(hoard.stats().assets, 1);

    scenes.finish();
    tick_until(&hoard, || hoard.stats().assets == 0).await;
    assert!(level.snapshot().is_successful());
    assert_eq!(hoard.stats().packages, 1);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn immediate_scene_load_waits_for_activation(dirs: Dirs) {
    let scenes = Arc::new(ManualScenes::default());
    let hoard = scene_world(&dirs, &scenes).await;

    let level = hoard.load_scene(LEVEL, SceneMode::Single);
    // Activation has begun once progress passes the package share.
    tick_until(&hoard, || level.progress() > 0.6).await;
    assert!(!level.is_done());

    let finisher = Arc::clone(&scenes);
    let activation = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        finisher.finish();
    });
    let snapshot = tokio::task::block_in_place(|| level.load_immediately());
    activation.join().unwrap();

    assert!(snapshot.is_successful(), "{:?}", snapshot.error);
    assert!((level.progress() - 1.0).abs() < f32::EPSILON);
}
