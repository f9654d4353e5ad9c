use std::time::Duration;

use bytes::Bytes;
use hoard::{Hoard, ManifestUpdate, Settings, manifest::ManifestCodec};
use hoard_test_utils::{
    Dirs, FileServer, PackageFixture, RequestLog, TestHttpServer, dirs, manifest, package,
    write_build,
};
use rstest::rstest;

use crate::common::{config, gui_and_common, init, remote_dir, tick_until};

const NEW_GUI: &[u8] = b"gui package contents, second build";

struct Published {
    hoard: Hoard,
    _server: TestHttpServer,
    log: RequestLog,
    new_gui: PackageFixture,
}

/// Build 1 ships locally; the server publishes a build with `timestamp`
/// whose gui package gained `ui/new.png`.
async fn publish(dirs: &Dirs, timestamp: i64, settings: Settings) -> Published {
    let codec = ManifestCodec::plain();
    let (gui, common) = gui_and_common(None);
    write_build(&dirs.local, &codec, 1, 1000, &[manifest("main", &[&gui, &common])]);

    let remote = remote_dir(dirs);
    let new_gui = package("gui.pack", NEW_GUI, &["ui/icon.png", "ui/new.png"], None)
        .with_dependencies(&[1]);
    new_gui.write_to(&remote);
    common.write_to(&remote);
    write_build(&remote, &codec, 2, timestamp, &[manifest("main", &[&new_gui, &common])]);

    let files = FileServer::new(&remote);
    let log = files.log();
    let server = files.spawn().await;
    let hoard =
        Hoard::new(config(dirs, server.base_url().clone()).with_settings(settings)).unwrap();
    Published {
        hoard,
        _server: server,
        log,
        new_gui,
    }
}

fn publish_as(dirs: &Dirs, name: &str) {
    let remote = remote_dir(dirs);
    std::fs::copy(remote.join("version.json"), remote.join(name)).unwrap();
}

async fn run_update(hoard: &Hoard, version: u32) -> ManifestUpdate {
    let op = hoard.update_manifests(version);
    tick_until(hoard, || op.is_done()).await;
    assert!(op.snapshot().is_successful(), "{:?}", op.error());
    op.result().unwrap()
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn newer_build_is_downloaded_and_registered(dirs: Dirs) {
    let published = publish(&dirs, 2000, Settings::default()).await;
    let hoard = &published.hoard;
    assert_eq!(init(hoard).await, 1);
    assert!(!hoard.contains_asset("ui/new.png"));

    let update = run_update(hoard, 0).await;
    assert_eq!(update.version, 2);
    assert!(update.needs_download());
    assert_eq!(update.to_download.len(), 1);
    assert_eq!(update.to_download[0].name, "main");
    assert_eq!(update.download_size, update.to_download[0].size);

    let batch = hoard.start_update_manifests(&update).unwrap();
    tick_until(hoard, || batch.is_done()).await;
    assert!(batch.report().is_successful(), "{:?}", batch.error());
    hoard.refresh_new_manifests(&update).unwrap();

    assert!(hoard.contains_asset("ui/new.png"));
    assert_eq!(
        hoard.manifests().version_file_name().as_deref(),
        Some("version.json")
    );

    let asset = hoard.request_asset("ui/new.png");
    tick_until(hoard, || asset.is_done()).await;
    assert_eq!(asset.bytes(), Some(Bytes::from_static(NEW_GUI)));
    assert_eq!(
        published
            .log
            .requests_for(&published.new_gui.file_name())
            .len(),
        1
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn older_build_keeps_the_built_in_manifests(dirs: Dirs) {
    let published = publish(&dirs, 500, Settings::default()).await;
    publish_as(&dirs, "version_v7.json");
    let hoard = &published.hoard;
    init(hoard).await;

    let update = run_update(hoard, 7).await;

    assert_eq!(update.version, 1);
    assert!(!update.needs_download());
    assert_eq!(update.download_size, 0);
    assert_eq!(published.log.requests_for("version_v7.json").len(), 1);
    assert!(!hoard.contains_asset("ui/new.png"));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn latest_pointer_is_fetched_on_request(dirs: Dirs) {
    let published = publish(&dirs, 2000, Settings::default()).await;
    publish_as(&dirs, "latest_version.json");
    let hoard = &published.hoard;
    init(hoard).await;

    let op = hoard.update_latest_manifests();
    tick_until(hoard, || op.is_done()).await;

    assert_eq!(op.result().map(|u| u.version), Some(2));
    assert_eq!(published.log.requests_for("latest_version.json").len(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn current_manifest_files_are_not_fetched_again(dirs: Dirs) {
    let published = publish(&dirs, 2000, Settings::default()).await;
    let hoard = &published.hoard;
    init(hoard).await;
    std::fs::copy(
        remote_dir(&dirs).join("main.json"),
        dirs.download.join("main.json"),
    )
    .unwrap();

    let update = run_update(hoard, 0).await;

    assert_eq!(update.version, 2);
    assert!(!update.needs_download());
    assert_eq!(update.download_size, 0);
    assert!(published.log.requests_for("main.json").is_empty());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn refresh_reports_unreadable_manifests(dirs: Dirs) {
    let published = publish(&dirs, 2000, Settings::default()).await;
    let hoard = &published.hoard;
    init(hoard).await;

    let update = run_update(hoard, 0).await;
    let batch = hoard.start_update_manifests(&update).unwrap();
    tick_until(hoard, || batch.is_done()).await;
    std::fs::write(dirs.download.join("main.json"), b"not a manifest").unwrap();

    let error = hoard.refresh_new_manifests(&update).unwrap_err();
    assert!(
        error.starts_with("failed to load manifest main, file main.json: "),
        "unexpected error: {error}"
    );
    assert!(!hoard.contains_asset("ui/new.png"));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn offline_runtime_skips_updates(dirs: Dirs) {
    let published = publish(&dirs, 2000, Settings::default().with_offline(true)).await;
    let hoard = &published.hoard;
    init(hoard).await;

    let op = hoard.update_manifests(0);

    assert!(op.is_done());
    assert_eq!(op.result(), Some(ManifestUpdate::default()));
    assert_eq!(published.log.count(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn update_before_init_fails(dirs: Dirs) {
    let published = publish(&dirs, 2000, Settings::default()).await;
    let hoard = &published.hoard;

    let op = hoard.update_manifests(0);
    tick_until(hoard, || op.is_done()).await;

    let error = op.error().unwrap();
    assert!(error.contains("initialise manifests first"), "unexpected error: {error}");
    assert!(!dirs.temp.join("version.json").exists());
}
