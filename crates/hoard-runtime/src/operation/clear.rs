use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use hoard_core::Budget;
use hoard_manifest::VersionFile;
use tracing::{debug, info};

use super::{Operation, Progress};
use crate::{HoardResult, context::Context};

/// Deletes files in the download dir that no registered manifest refers to.
pub(crate) struct ClearHistory {
    stale: Vec<PathBuf>,
    cursor: usize,
    deleted: usize,
}

impl ClearHistory {
    pub(crate) fn new() -> Self {
        Self {
            stale: Vec::new(),
            cursor: 0,
            deleted: 0,
        }
    }
}

impl Operation for ClearHistory {
    type Output = usize;

    const NAME: &'static str = "clear_history";

    fn start(&mut self, ctx: &Context) -> Progress<usize> {
        match stale_files(ctx) {
            Ok(stale) => {
                debug!(files = stale.len(), "history files to delete");
                self.stale = stale;
                Progress::Pending(0.0)
            }
            Err(e) => Progress::Done(Err(e.to_string())),
        }
    }

    fn update(&mut self, _ctx: &Context, budget: &Budget) -> Progress<usize> {
        while let Some(path) = self.stale.get(self.cursor) {
            if budget.is_busy() {
                let progress = self.cursor as f32 / self.stale.len() as f32;
                return Progress::Pending(progress);
            }
            match fs::remove_file(path) {
                Ok(()) => self.deleted += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Progress::Done(Err(format!("delete {}: {e}", path.display())));
                }
            }
            self.cursor += 1;
        }
        info!(deleted = self.deleted, "download history cleared");
        Progress::Done(Ok(self.deleted))
    }
}

fn stale_files(ctx: &Context) -> HoardResult<Vec<PathBuf>> {
    let mut keep = HashSet::new();
    let version = ctx
        .registry
        .version_file_name()
        .unwrap_or_else(|| VersionFile::Current.file_name(ctx.settings.encrypted));
    keep.insert(ctx.paths.download_path(&version)?);
    for file_name in ctx.registry.manifest_file_names() {
        keep.insert(ctx.paths.download_path(&file_name)?);
    }
    for package in ctx.registry.packages() {
        keep.insert(ctx.paths.download_path(&package.save_file_name())?);
    }

    let mut stale = Vec::new();
    collect_files(&ctx.paths.download_dir, &mut stale)?;
    stale.retain(|path| !keep.contains(path));
    Ok(stale)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
