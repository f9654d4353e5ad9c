use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use hoard::{LoadStatus, manifest::AddressAlias};
use hoard_test_utils::{Dirs, dirs, package};
use rstest::rstest;

use crate::common::{COMMON, GUI, built_in, built_in_with, gui_and_common, tick_until};

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn asset_loads_with_its_dependency(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || icon.is_done()).await;

    let snapshot = icon.snapshot();
    assert!(snapshot.is_successful(), "{:?}", snapshot.error);
    assert!((snapshot.progress - 1.0).abs() < f32::EPSILON);
    assert_eq!(icon.asset::<Bytes>().as_deref(), Some(&Bytes::from_static(GUI)));
    assert_eq!(icon.bytes(), Some(Bytes::from_static(GUI)));

    let stats = hoard.stats();
    assert_eq!(stats.assets, 1);
    assert_eq!(stats.dependencies, 1);
    assert_eq!(stats.packages, 2);

    let font = hoard.request_asset("fonts/main.ttf");
    tick_until(&hoard, || font.is_done()).await;
    assert_eq!(font.bytes(), Some(Bytes::from_static(COMMON)));
    assert_eq!(hoard.stats().packages, 2);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn load_asset_finishes_before_returning(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;

    let icon = hoard.load_asset("ui/icon.png");

    assert_eq!(icon.status(), LoadStatus::LoadSuccessful);
    assert_eq!(icon.bytes(), Some(Bytes::from_static(GUI)));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_path_fails_with_not_found(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &[]).await;

    assert!(hoard.contains_asset("ui/icon.png"));
    assert!(!hoard.contains_asset("ui/missing.png"));

    let missing = hoard.request_asset("ui/missing.png");
    assert!(missing.is_done());
    assert_eq!(missing.status(), LoadStatus::LoadFailed);
    assert_eq!(
        missing.error().as_deref(),
        Some("ui/missing.png not found in any manifest")
    );
    assert!(missing.asset::<Bytes>().is_none());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn failed_dependency_fails_the_asset(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let hoard = built_in(&dirs, &[&gui, &common], &["common.pack"]).await;

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || icon.is_done()).await;

    assert_eq!(icon.status(), LoadStatus::LoadFailed);
    let error = icon.error().unwrap();
    assert!(error.contains("common.pack"), "unexpected error: {error}");
    assert!(icon.bytes().is_none());
    assert!(icon.asset::<Bytes>().is_none());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn raw_file_reports_its_path(dirs: Dirs) {
    let settings = package("config/settings.json", b"{\"volume\":3}", &["config/settings.json"], None)
        .raw();
    let hoard = built_in(&dirs, &[&settings], &[]).await;

    let first = hoard.request_raw_file("config/settings.json");
    let second = hoard.request_raw_file("config/settings.json");
    tick_until(&hoard, || first.is_done() && second.is_done()).await;

    assert!(first.snapshot().is_successful(), "{:?}", first.error());
    assert_eq!(first.path(), Some(dirs.local.join("config/settings.json")));
    assert_eq!(first.bytes(), Some(Bytes::from_static(b"{\"volume\":3}")));
    // Raw files are not shared between requests.
    assert_eq!(hoard.stats().loadables, 2);
    assert_eq!(hoard.stats().packages, 0);

    let immediate = hoard.load_raw_file("config/settings.json");
    assert_eq!(immediate.status(), LoadStatus::LoadSuccessful);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn alias_resolves_to_the_asset_path(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let alias: AddressAlias = Arc::new(|path: &str| {
        let file = path.rsplit('/').next()?;
        file.split('.').next().map(str::to_string)
    });
    let hoard = built_in_with(&dirs, &[&gui, &common], &[], move |config| {
        config.with_address_alias(alias)
    })
    .await;

    assert!(hoard.contains_asset("icon"));
    let icon = hoard.request_asset("icon");
    tick_until(&hoard, || icon.is_done()).await;
    assert_eq!(icon.address(), "icon");
    assert_eq!(icon.bytes(), Some(Bytes::from_static(GUI)));
}
