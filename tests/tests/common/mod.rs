//! Builders shared by the runtime integration tests.

use std::{path::PathBuf, time::Duration};

use hoard::{
    AssetPaths, BoxFuture, Hoard, HoardConfig, SceneHost, SceneMode, SceneTransition, Settings,
    crypto::CryptoContext, manifest::ManifestCodec,
};
use hoard_test_utils::{Dirs, PackageFixture, manifest, package, write_build};
use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::watch};
use url::Url;

pub const GUI: &[u8] = b"gui package contents";
pub const COMMON: &[u8] = b"common package contents";

/// `gui.pack` (two UI assets) depending on `common.pack` (one font).
pub fn gui_and_common(crypto: Option<&CryptoContext>) -> (PackageFixture, PackageFixture) {
    let common = package("common.pack", COMMON, &["fonts/main.ttf"], crypto);
    let gui = package("gui.pack", GUI, &["ui/icon.png", "ui/button.png"], crypto)
        .with_dependencies(&[1]);
    (gui, common)
}

pub fn test_crypto() -> CryptoContext {
    CryptoContext::from_secret("hoard integration key", "hoard iv")
}

/// Directory served over HTTP, next to the runtime's own directories.
pub fn remote_dir(dirs: &Dirs) -> PathBuf {
    let dir = dirs.root.path().join("remote");
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Nothing listens on port 9; any request fails fast.
pub fn unreachable_url() -> Url {
    Url::parse("http://127.0.0.1:9/").unwrap()
}

/// Config for `dirs`, running I/O on the test's runtime.
pub fn config(dirs: &Dirs, base_url: Url) -> HoardConfig {
    HoardConfig::new(AssetPaths::new(
        &dirs.local,
        &dirs.download,
        &dirs.temp,
        base_url,
        "",
    ))
    .with_runtime(Handle::current())
}

pub async fn tick_until(hoard: &Hoard, done: impl Fn() -> bool) {
    while !done() {
        hoard.tick();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

pub async fn tick_times(hoard: &Hoard, ticks: usize) {
    for _ in 0..ticks {
        hoard.tick();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Run `init_manifests` to completion and return the registered version.
pub async fn init(hoard: &Hoard) -> u32 {
    let op = hoard.init_manifests();
    tick_until(hoard, || op.is_done()).await;
    assert!(op.snapshot().is_successful(), "init failed: {:?}", op.error());
    op.result().unwrap()
}

/// Runtime over a built-in build of `packages`; files listed in `missing`
/// are left out of the local dir.
pub async fn built_in(dirs: &Dirs, packages: &[&PackageFixture], missing: &[&str]) -> Hoard {
    built_in_with(dirs, packages, missing, |config| config).await
}

/// [`built_in`] with extra configuration applied before the runtime starts.
pub async fn built_in_with(
    dirs: &Dirs,
    packages: &[&PackageFixture],
    missing: &[&str],
    configure: impl FnOnce(HoardConfig) -> HoardConfig,
) -> Hoard {
    for fixture in packages {
        if !missing.contains(&fixture.info.name.as_str()) {
            fixture.write_to(&dirs.local);
        }
    }
    write_build(
        &dirs.local,
        &ManifestCodec::plain(),
        1,
        1000,
        &[manifest("main", packages)],
    );
    let settings =
        Settings::default().with_built_in(packages.iter().map(|p| p.info.name_with_hash()));
    let config = configure(config(dirs, unreachable_url()).with_settings(settings));
    let hoard = Hoard::new(config).unwrap();
    assert_eq!(init(&hoard).await, 1);
    hoard
}

/// Scene host whose activations finish when the test says so.
pub struct ManualScenes {
    finished: watch::Sender<bool>,
    unloaded: Mutex<Vec<String>>,
}

impl Default for ManualScenes {
    fn default() -> Self {
        Self {
            finished: watch::Sender::new(false),
            unloaded: Mutex::default(),
        }
    }
}

impl ManualScenes {
    pub fn finish(&self) {
        self.finished.send_replace(true);
    }

    pub fn unloaded(&self) -> Vec<String> {
        self.unloaded.lock().clone()
    }
}

struct ManualTransition(watch::Receiver<bool>);

impl SceneTransition for ManualTransition {
    fn progress(&self) -> f32 {
        if self.is_done() { 1.0 } else { 0.5 }
    }

    fn is_done(&self) -> bool {
        *self.0.borrow()
    }

    fn activated(&self) -> BoxFuture<'static, ()> {
        let mut finished = self.0.clone();
        Box::pin(async move {
            let _ = finished.wait_for(|done| *done).await;
        })
    }
}

impl SceneHost for ManualScenes {
    fn begin(&self, _address: &str, _mode: SceneMode) -> Result<Box<dyn SceneTransition>, String> {
        Ok(Box::new(ManualTransition(self.finished.subscribe())))
    }

    fn load(&self, _address: &str, _mode: SceneMode) -> Result<(), String> {
        Ok(())
    }

    fn unload(&self, address: &str) {
        self.unloaded.lock().push(address.to_string());
    }
}
