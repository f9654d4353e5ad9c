use std::path::Path;

use hoard_core::Budget;
use hoard_manifest::{ManifestError, VersionContainer, VersionFile, is_manifest_file_current};
use tracing::{info, warn};

use super::{Operation, Progress};
use crate::{
    HoardResult,
    context::{Context, copy_file},
};

/// Registers the manifests of the newest usable build.
///
/// The built-in version file is copied to the temp dir as the baseline for
/// later updates. A previously downloaded build wins when it is newer and
/// every manifest it lists is present and intact.
pub(crate) struct InitManifests;

impl Operation for InitManifests {
    type Output = u32;

    const NAME: &'static str = "init_manifests";

    fn update(&mut self, ctx: &Context, _budget: &Budget) -> Progress<u32> {
        Progress::Done(init(ctx).map_err(|e| e.to_string()))
    }
}

fn init(ctx: &Context) -> HoardResult<u32> {
    let file_name = VersionFile::Current.file_name(ctx.settings.encrypted);
    let built_in_path = ctx.paths.local_path(&file_name)?;
    let built_in = read_optional(ctx, &built_in_path)?;
    if built_in.is_some() {
        copy_file(&built_in_path, &ctx.paths.temp_path(&file_name)?)?;
    }

    let downloaded = match read_optional(ctx, &ctx.paths.download_path(&file_name)?) {
        Ok(container) => container,
        Err(e) => {
            warn!(error = %e, "ignoring downloaded version file");
            None
        }
    };
    let downloaded = downloaded.filter(|d| {
        built_in.as_ref().is_none_or(|b| d.timestamp > b.timestamp)
            && d.records
                .iter()
                .all(|r| is_manifest_file_current(&ctx.paths.download_dir, r))
    });

    let (container, from_download) = match (downloaded, built_in) {
        (Some(container), _) => (container, true),
        (None, Some(container)) => (container, false),
        (None, None) => return Err(ManifestError::NotFound(built_in_path).into()),
    };

    for record in &container.records {
        let path = if from_download {
            ctx.paths.download_path(&record.file_name)?
        } else {
            ctx.paths.local_path(&record.file_name)?
        };
        let manifest = ctx.codec.read_manifest(&path, record)?;
        ctx.registry.register(manifest);
    }
    ctx.registry.set_version_file_name(file_name);

    info!(
        version = container.version,
        manifests = container.records.len(),
        source = if from_download { "download" } else { "built-in" },
        "manifests initialised"
    );
    Ok(container.version)
}

fn read_optional(ctx: &Context, path: &Path) -> HoardResult<Option<VersionContainer>> {
    match ctx.codec.read_version(path) {
        Ok(container) => Ok(Some(container)),
        Err(ManifestError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
