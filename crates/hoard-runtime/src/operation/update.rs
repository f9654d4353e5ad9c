use std::path::Path;

use hoard_core::Budget;
use hoard_download::{Download, DownloadInfo};
use hoard_manifest::{
    Reconciliation, VersionFile, VersionRecord, is_manifest_file_current, reconcile,
};
use tracing::{debug, info};

use super::{Operation, Progress};
use crate::context::Context;

/// What a manifest update found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestUpdate {
    pub version: u32,
    /// Manifest files to fetch before the new build can be registered.
    pub to_download: Vec<VersionRecord>,
    pub download_size: u64,
}

impl ManifestUpdate {
    #[must_use]
    pub fn needs_download(&self) -> bool {
        !self.to_download.is_empty()
    }
}

/// Fetches a remote version file and reconciles it with the built-in one.
pub(crate) struct UpdateManifests {
    request: VersionFile,
    download: Option<Download>,
}

impl UpdateManifests {
    pub(crate) fn new(request: VersionFile) -> Self {
        Self {
            request,
            download: None,
        }
    }
}

impl Operation for UpdateManifests {
    type Output = ManifestUpdate;

    const NAME: &'static str = "update_manifests";

    fn start(&mut self, ctx: &Context) -> Progress<ManifestUpdate> {
        if ctx.settings.skips_updates() {
            debug!("manifest updates disabled");
            return Progress::Done(Ok(ManifestUpdate::default()));
        }

        let encrypted = ctx.settings.encrypted;
        let remote = self.request.file_name(encrypted);
        let info = ctx.paths.download_url(&remote).and_then(|url| {
            let save = ctx
                .paths
                .download_path(&VersionFile::Current.file_name(encrypted))?;
            Ok(DownloadInfo::new(url, save, 0, "").with_resumable(false))
        });
        match info {
            Ok(info) => {
                debug!(url = %info.url, "fetching version file");
                self.download = Some(ctx.downloads.download(info));
                Progress::Pending(0.0)
            }
            Err(e) => Progress::Done(Err(e.to_string())),
        }
    }

    fn update(&mut self, ctx: &Context, _budget: &Budget) -> Progress<ManifestUpdate> {
        let Some(download) = &self.download else {
            return Progress::Done(Err("version file download never started".to_string()));
        };
        if !download.is_done() {
            return Progress::Pending(download.progress());
        }
        if let Err(e) = download.wait() {
            return Progress::Done(Err(format!("version file download failed: {e}")));
        }
        Progress::Done(apply(ctx, &download.info().dest))
    }
}

fn apply(ctx: &Context, downloaded_path: &Path) -> Result<ManifestUpdate, String> {
    let current = VersionFile::Current.file_name(ctx.settings.encrypted);
    let downloaded = ctx
        .codec
        .read_version(downloaded_path)
        .map_err(|e| format!("failed to load downloaded version file: {e}"))?;
    let baseline = ctx
        .paths
        .temp_path(&current)
        .map_err(|e| e.to_string())
        .and_then(|path| ctx.codec.read_version(&path).map_err(|e| e.to_string()))
        .map_err(|e| {
            format!("failed to load built-in version file, initialise manifests first: {e}")
        })?;

    match reconcile(
        &baseline,
        &downloaded,
        |r| ctx.registry.is_effective(r),
        |r| is_manifest_file_current(&ctx.paths.download_dir, r),
    ) {
        Reconciliation::UseLocal {
            version,
            to_register,
        } => {
            for record in &to_register {
                register(ctx, record)?;
            }
            ctx.registry.set_version_file_name(current);
            info!(version, registered = to_register.len(), "built-in manifests are current");
            Ok(ManifestUpdate {
                version,
                ..ManifestUpdate::default()
            })
        }
        Reconciliation::Update {
            version,
            to_download,
            download_size,
        } => {
            info!(
                version,
                files = to_download.len(),
                bytes = download_size,
                "newer manifests available"
            );
            Ok(ManifestUpdate {
                version,
                to_download,
                download_size,
            })
        }
    }
}

/// Register a record from the download dir, falling back to the built-in copy.
fn register(ctx: &Context, record: &VersionRecord) -> Result<(), String> {
    let failed = |e: String| format!("manifest {} failed to load: {e}", record.name);
    let downloaded = ctx.paths.download_path(&record.file_name).map_err(|e| failed(e.to_string()))?;
    let path = if downloaded.exists() {
        downloaded
    } else {
        ctx.paths.local_path(&record.file_name).map_err(|e| failed(e.to_string()))?
    };
    let manifest = ctx
        .codec
        .read_manifest(&path, record)
        .map_err(|e| failed(e.to_string()))?;
    ctx.registry.register(manifest);
    Ok(())
}
