use std::time::Duration;

use hoard::{
    Hoard, OperationStatus, Settings,
    events::{Event, OperationEvent},
    manifest::ManifestCodec,
};
use hoard_test_utils::{Dirs, dirs, manifest, package, write_build};
use rstest::rstest;

use crate::common::{config, gui_and_common, init, tick_until, unreachable_url};

fn local_build(dirs: &Dirs) {
    let (gui, common) = gui_and_common(None);
    write_build(
        &dirs.local,
        &ManifestCodec::plain(),
        1,
        1000,
        &[manifest("main", &[&gui, &common])],
    );
}

/// A later build left in the download dir by an earlier update.
fn downloaded_build(dirs: &Dirs) {
    let patch = package("patch.pack", b"patch contents", &["ui/patched.png"], None);
    let (gui, common) = gui_and_common(None);
    write_build(
        &dirs.download,
        &ManifestCodec::plain(),
        2,
        2000,
        &[
            manifest("main", &[&gui, &common]),
            manifest("patch", &[&patch]),
        ],
    );
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn init_prefers_a_newer_downloaded_build(dirs: Dirs) {
    local_build(&dirs);
    downloaded_build(&dirs);
    let hoard = Hoard::new(config(&dirs, unreachable_url())).unwrap();

    assert_eq!(init(&hoard).await, 2);
    assert!(hoard.contains_asset("ui/patched.png"));
    let mut names = hoard.manifests().manifest_names();
    names.sort();
    assert_eq!(names, vec!["main".to_string(), "patch".to_string()]);
    // The built-in version file is kept as the update baseline.
    assert!(dirs.temp.join("version.json").exists());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn init_falls_back_when_a_downloaded_manifest_is_missing(dirs: Dirs) {
    local_build(&dirs);
    downloaded_build(&dirs);
    std::fs::remove_file(dirs.download.join("patch.json")).unwrap();
    let hoard = Hoard::new(config(&dirs, unreachable_url())).unwrap();

    assert_eq!(init(&hoard).await, 1);
    assert!(!hoard.contains_asset("ui/patched.png"));
    assert!(hoard.contains_asset("ui/icon.png"));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn init_without_any_build_fails(dirs: Dirs) {
    let hoard = Hoard::new(config(&dirs, unreachable_url())).unwrap();

    let op = hoard.init_manifests();
    tick_until(&hoard, || op.is_done()).await;

    assert_eq!(op.status(), OperationStatus::Failed);
    let error = op.error().unwrap();
    assert!(error.contains("manifest file not found"), "unexpected error: {error}");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn clear_history_keeps_referenced_files(dirs: Dirs) {
    local_build(&dirs);
    let (gui, _) = gui_and_common(None);
    let hoard = Hoard::new(config(&dirs, unreachable_url())).unwrap();
    init(&hoard).await;
    let mut events = hoard.subscribe();

    let kept = gui.write_to(&dirs.download);
    let stale = dirs.download.join("gui_0123abcd.pack");
    let nested = dirs.download.join("old/manifest.json");
    std::fs::write(&stale, b"previous build").unwrap();
    std::fs::create_dir_all(nested.parent().unwrap()).unwrap();
    std::fs::write(&nested, b"{}").unwrap();

    let op = hoard.clear_history();
    tick_until(&hoard, || op.is_done()).await;

    assert_eq!(op.result(), Some(2));
    assert!(kept.exists());
    assert!(!stale.exists());
    assert!(!nested.exists());

    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        if event
            == Event::Operation(OperationEvent::Finished {
                name: "clear_history",
                error: None,
            })
        {
            finished = true;
        }
    }
    assert!(finished);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn download_size_counts_only_missing_bytes(dirs: Dirs) {
    let (gui, common) = gui_and_common(None);
    let settings_file =
        package("config/settings.json", b"{\"volume\":3}", &["config/settings.json"], None).raw();
    let bundled = package("bundled.pack", b"bundled contents", &["ui/splash.png"], None);
    write_build(
        &dirs.local,
        &ManifestCodec::plain(),
        1,
        1000,
        &[manifest("main", &[&gui, &common, &settings_file, &bundled])],
    );
    let settings = Settings::default().with_built_in([bundled.info.name_with_hash()]);
    let hoard = Hoard::new(config(&dirs, unreachable_url()).with_settings(settings)).unwrap();
    init(&hoard).await;

    // Resident, partial, and a stale raw file.
    gui.write_to(&dirs.download);
    std::fs::write(dirs.download.join(common.file_name()), &common.stored[..3]).unwrap();
    let raw = settings_file.write_to(&dirs.download);
    std::fs::write(&raw, b"{}").unwrap();

    let packages = vec![
        gui.info.clone(),
        common.info.clone(),
        settings_file.info.clone(),
        bundled.info.clone(),
        common.info.clone(),
    ];
    let op = hoard.download_size(packages);
    tick_until(&hoard, || op.is_done()).await;
    let size = op.result().unwrap();

    assert_eq!(size.infos.len(), 2);
    assert_eq!(
        size.total_size,
        common.info.size - 3 + settings_file.info.size
    );
    assert!(!raw.exists());
    let raw_info = size
        .infos
        .iter()
        .find(|i| i.dest == raw)
        .unwrap();
    assert!(!raw_info.resumable);

    let unknown = hoard.download_size_for(&["ui/unknown.png"]).unwrap_err();
    assert_eq!(unknown.to_string(), "ui/unknown.png not found in any manifest");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_operation_fails_on_next_tick(dirs: Dirs) {
    local_build(&dirs);
    let hoard = Hoard::new(config(&dirs, unreachable_url())).unwrap();
    init(&hoard).await;

    let (gui, _) = gui_and_common(None);
    let op = hoard.download_size(vec![gui.info]);
    op.cancel();
    tick_until(&hoard, || op.is_done()).await;

    assert_eq!(op.status(), OperationStatus::Failed);
    assert_eq!(op.error().as_deref(), Some("get_download_size cancelled"));
    assert!(op.result().is_none());
}
