use std::time::Duration;

use bytes::Bytes;
use hoard::{Hoard, Settings, manifest::{ManifestCodec, VersionFile}};
use hoard_test_utils::{Dirs, FileServer, dirs, manifest, write_build};
use rstest::rstest;

use crate::common::{
    COMMON, GUI, config, gui_and_common, init, remote_dir, test_crypto, tick_until,
    unreachable_url,
};

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn encrypted_remote_package_round_trip(dirs: Dirs) {
    let crypto = test_crypto();
    let (gui, common) = gui_and_common(Some(&crypto));
    assert_ne!(gui.stored, GUI);
    let remote = remote_dir(&dirs);
    gui.write_to(&remote);
    common.write_to(&remote);
    write_build(
        &dirs.local,
        &ManifestCodec::encrypted(crypto.clone()),
        1,
        1000,
        &[manifest("main", &[&gui, &common])],
    );
    let server = FileServer::new(&remote).spawn().await;

    let settings = Settings::default().with_encrypted(true);
    let hoard = Hoard::new(
        config(&dirs, server.base_url().clone())
            .with_settings(settings)
            .with_crypto(crypto),
    )
    .unwrap();
    assert_eq!(init(&hoard).await, 1);
    assert_eq!(
        hoard.manifests().version_file_name(),
        Some(VersionFile::Current.file_name(true))
    );

    let icon = hoard.request_asset("ui/icon.png");
    let font = hoard.request_asset("fonts/main.ttf");
    tick_until(&hoard, || icon.is_done() && font.is_done()).await;

    assert!(icon.snapshot().is_successful(), "{:?}", icon.error());
    assert_eq!(icon.bytes(), Some(Bytes::from_static(GUI)));
    assert_eq!(font.bytes(), Some(Bytes::from_static(COMMON)));
    // Stored as published.
    assert_eq!(
        std::fs::read(dirs.download.join(gui.file_name())).unwrap(),
        gui.stored
    );
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn encrypted_built_in_package_is_unpacked_once(dirs: Dirs) {
    let crypto = test_crypto();
    let (gui, common) = gui_and_common(Some(&crypto));
    gui.write_to(&dirs.local);
    common.write_to(&dirs.local);
    write_build(
        &dirs.local,
        &ManifestCodec::encrypted(crypto.clone()),
        1,
        1000,
        &[manifest("main", &[&gui, &common])],
    );

    let settings = Settings::default()
        .with_encrypted(true)
        .with_built_in([gui.info.name_with_hash(), common.info.name_with_hash()]);
    let hoard = Hoard::new(
        config(&dirs, unreachable_url())
            .with_settings(settings)
            .with_crypto(crypto),
    )
    .unwrap();
    init(&hoard).await;

    let icon = hoard.request_asset("ui/icon.png");
    tick_until(&hoard, || icon.is_done()).await;
    assert!(icon.snapshot().is_successful(), "{:?}", icon.error());
    assert_eq!(icon.bytes(), Some(Bytes::from_static(GUI)));

    let unpacked = dirs.download.join(gui.file_name());
    assert_eq!(std::fs::read(&unpacked).unwrap(), gui.stored);

    // Resident from now on: the built-in copy is no longer needed.
    drop(icon);
    tick_until(&hoard, || hoard.stats().loadables == 0).await;
    std::fs::remove_file(dirs.local.join(gui.file_name())).unwrap();
    let again = hoard.load_asset("ui/icon.png");
    assert_eq!(again.bytes(), Some(Bytes::from_static(GUI)));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test(flavor = "multi_thread")]
async fn wrong_key_fails_initialisation(dirs: Dirs) {
    let crypto = test_crypto();
    let (gui, common) = gui_and_common(Some(&crypto));
    write_build(
        &dirs.local,
        &ManifestCodec::encrypted(crypto),
        1,
        1000,
        &[manifest("main", &[&gui, &common])],
    );

    let other = hoard::crypto::CryptoContext::from_secret("another key", "another iv");
    let hoard = Hoard::new(
        config(&dirs, unreachable_url())
            .with_settings(Settings::default().with_encrypted(true))
            .with_crypto(other),
    )
    .unwrap();

    let op = hoard.init_manifests();
    tick_until(&hoard, || op.is_done()).await;
    assert!(op.error().is_some());
    assert!(!hoard.contains_asset("ui/icon.png"));
}
