use std::time::Duration;

use bytes::Bytes;
use hoard::{
    Hoard, OperationStatus,
    download::DownloadInfo,
    manifest::ManifestCodec,
};
use hoard_test_utils::{
    Dirs, FileServer, PackageFixture, RequestLog, TestHttpServer, dirs, manifest, package,
    tracing_setup, write_build,
};
use rstest::rstest;

use crate::common::{COMMON, GUI, config, gui_and_common, init, remote_dir, tick_until};

struct Remote {
    hoard: Hoard,
    server: TestHttpServer,
    log: RequestLog,
    gui: PackageFixture,
    common: PackageFixture,
}

/// Packages published only on the server; the manifests ship locally.
async fn remote_world(dirs: &Dirs, ranges: bool) -> Remote {
    let (gui, common) = gui_and_common(None);
    let remote = remote_dir(dirs);
    gui.write_to(&remote);
    common.write_to(&remote);
    write_build(
        &dirs.local,
        &ManifestCodec::plain(),
        1,
        1000,
        &[manifest("main", &[&gui, &common])],
    );

    let mut files = FileServer::new(&remote);
    if !ranges {
        files = files.without_ranges();
    }
    let log = files.log();
    let server = files.spawn().await;
    let hoard = Hoard::new(config(dirs, server.base_url().clone())).unwrap();
    init(&hoard).await;
    Remote {
        hoard,
        server,
        log,
        gui,
        common,
    }
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn remote_packages_are_downloaded_then_loaded(dirs: Dirs) {
    let world = remote_world(&dirs, true).await;
    let hoard = &world.hoard;

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(hoard, || icon.is_done()).await;

    assert!(icon.snapshot().is_successful(), "{:?}", icon.error());
    assert_eq!(icon.bytes(), Some(Bytes::from_static(GUI)));
    assert_eq!(
        std::fs::read(dirs.download.join(world.common.file_name())).unwrap(),
        COMMON
    );
    assert_eq!(world.log.requests_for(&world.gui.file_name()).len(), 1);
    assert_eq!(world.log.requests_for(&world.common.file_name()).len(), 1);

    // Resident now: a fresh request reads from disk.
    drop(icon);
    tick_until(hoard, || hoard.stats().loadables == 0).await;
    let again = hoard.request_asset("ui/icon.png");
    tick_until(hoard, || again.is_done()).await;
    assert!(again.snapshot().is_successful());
    assert_eq!(world.log.count(), 2);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_requests_share_one_transfer(dirs: Dirs) {
    let world = remote_world(&dirs, true).await;
    let hoard = &world.hoard;

    let icon = hoard.request_asset("ui/icon.png");
    let button = hoard.request_asset("ui/button.png");
    let font = hoard.request_asset("fonts/main.ttf");
    tick_until(hoard, || icon.is_done() && button.is_done() && font.is_done()).await;

    for handle in [&icon, &button, &font] {
        assert!(handle.snapshot().is_successful(), "{:?}", handle.error());
    }
    assert_eq!(world.log.requests_for(&world.gui.file_name()).len(), 1);
    assert_eq!(world.log.requests_for(&world.common.file_name()).len(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn partial_package_resumes_from_existing_bytes(_tracing_setup: (), dirs: Dirs) {
    let world = remote_world(&dirs, true).await;
    let hoard = &world.hoard;
    let partial = dirs.download.join(world.gui.file_name());
    std::fs::write(&partial, &world.gui.stored[..5]).unwrap();

    let size = hoard.download_size_for(&["ui/icon.png"]).unwrap();
    tick_until(hoard, || size.is_done()).await;
    let size = size.result().unwrap();
    assert_eq!(size.infos.len(), 2);
    assert_eq!(size.total_size, world.gui.info.size - 5 + world.common.info.size);

    let batch = hoard.download(size.infos);
    tick_until(hoard, || batch.is_done()).await;

    let report = batch.report();
    assert_eq!(report.status, OperationStatus::Successful);
    assert_eq!(report.succeeded, 2);
    assert_eq!(
        report.downloaded_bytes,
        world.gui.info.size + world.common.info.size
    );
    assert_eq!(std::fs::read(&partial).unwrap(), world.gui.stored);
    let ranges: Vec<_> = world
        .log
        .requests_for(&world.gui.file_name())
        .into_iter()
        .map(|r| r.range)
        .collect();
    assert_eq!(ranges, vec![Some("bytes=5-".to_string())]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn server_without_ranges_restarts_transfer(_tracing_setup: (), dirs: Dirs) {
    let world = remote_world(&dirs, false).await;
    let hoard = &world.hoard;
    let partial = dirs.download.join(world.gui.file_name());
    std::fs::write(&partial, &world.gui.stored[..5]).unwrap();

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(hoard, || icon.is_done()).await;

    assert!(icon.snapshot().is_successful(), "{:?}", icon.error());
    assert_eq!(std::fs::read(&partial).unwrap(), world.gui.stored);
    // Range refused, then a plain request.
    assert_eq!(world.log.requests_for(&world.gui.file_name()).len(), 2);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn failed_files_are_summarised_and_retried(_tracing_setup: (), dirs: Dirs) {
    let world = remote_world(&dirs, true).await;
    let hoard = &world.hoard;
    let remote = remote_dir(&dirs);

    let files: Vec<PackageFixture> = (0..5)
        .map(|i| {
            let content = format!("batch file {i} ").repeat(i + 1);
            package(&format!("batch{i}.bin"), content.as_bytes(), &[], None)
        })
        .collect();
    let missing = [1, 3];
    for (i, file) in files.iter().enumerate() {
        if !missing.contains(&i) {
            file.write_to(&remote);
        }
    }
    let infos: Vec<DownloadInfo> = files
        .iter()
        .map(|f| {
            DownloadInfo::new(
                world.server.url(&f.file_name()),
                dirs.download.join(f.file_name()),
                f.info.size,
                f.info.hash.clone(),
            )
        })
        .collect();

    let batch = hoard.download(infos);
    tick_until(hoard, || batch.is_done()).await;

    let report = batch.report();
    assert_eq!(report.status, OperationStatus::Failed);
    let error = report.error.clone().unwrap();
    assert!(
        error.starts_with("2 files failed, first reason: "),
        "unexpected error: {error}"
    );
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed.len(), 2);
    let succeeded_bytes: u64 = files
        .iter()
        .enumerate()
        .filter(|(i, _)| !missing.contains(i))
        .map(|(_, f)| f.info.size)
        .sum();
    assert_eq!(report.downloaded_bytes, succeeded_bytes);

    for i in missing {
        files[i].write_to(&remote);
    }
    assert!(batch.retry());
    tick_until(hoard, || batch.is_done()).await;

    let report = batch.report();
    assert_eq!(report.status, OperationStatus::Successful, "{:?}", report.error);
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.total_size, files.iter().map(|f| f.info.size).sum::<u64>());
    assert!((report.progress - 1.0).abs() < f32::EPSILON);
    // Finished files are not fetched again.
    assert_eq!(world.log.requests_for(&files[0].file_name()).len(), 1);
    assert!(!batch.retry());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_batch_fails_and_can_be_retried(_tracing_setup: (), dirs: Dirs) {
    let world = remote_world(&dirs, true).await;
    let hoard = &world.hoard;
    let infos: Vec<DownloadInfo> = [&world.gui, &world.common]
        .into_iter()
        .map(|f| {
            DownloadInfo::new(
                world.server.url(&f.file_name()),
                dirs.download.join(f.file_name()),
                f.info.size,
                f.info.hash.clone(),
            )
        })
        .collect();

    let batch = hoard.download(infos);
    batch.cancel();
    tick_until(hoard, || batch.is_done()).await;

    let report = batch.report();
    assert_eq!(report.status, OperationStatus::Failed);
    assert_eq!(report.error.as_deref(), Some("download_batch cancelled"));

    // Let the cancelled transfers wind down before asking again.
    tick_until(hoard, || hoard.is_idle()).await;
    assert!(batch.retry());
    tick_until(hoard, || batch.is_done()).await;
    let report = batch.report();
    assert_eq!(report.status, OperationStatus::Successful, "{:?}", report.error);
    assert_eq!(report.succeeded, 2);
    assert_eq!(
        std::fs::read(dirs.download.join(world.gui.file_name())).unwrap(),
        world.gui.stored
    );
}
