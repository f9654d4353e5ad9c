use std::{collections::HashSet, fs, io, path::PathBuf};

use hoard_core::Budget;
use hoard_download::DownloadInfo;
use hoard_manifest::PackageInfo;
use tracing::{debug, trace};

use super::{Operation, Progress};
use crate::{HoardResult, context::Context};

/// Files still missing locally and the bytes left to fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadSize {
    pub infos: Vec<DownloadInfo>,
    pub total_size: u64,
}

/// Works out which packages still need downloading, a budget-slice at a time.
pub(crate) struct GetDownloadSize {
    packages: Vec<PackageInfo>,
    cursor: usize,
    seen: HashSet<PathBuf>,
    found: DownloadSize,
}

impl GetDownloadSize {
    pub(crate) fn new(packages: Vec<PackageInfo>) -> Self {
        Self {
            packages,
            cursor: 0,
            seen: HashSet::new(),
            found: DownloadSize::default(),
        }
    }

    fn inspect(&mut self, ctx: &Context, info: &PackageInfo) -> HoardResult<()> {
        if ctx.settings.is_built_in(&info.name_with_hash()) || ctx.is_resident(info) {
            return Ok(());
        }
        let download = ctx.download_info(info)?;
        if !self.seen.insert(download.dest.clone()) {
            return Ok(());
        }

        let existing = match fs::metadata(&download.dest) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let remaining = if info.raw_file && existing > 0 {
            // Raw files never resume.
            fs::remove_file(&download.dest)?;
            info.size
        } else if existing < info.size {
            info.size - existing
        } else {
            info.size
        };

        trace!(package = %info.name, existing, remaining, "needs download");
        self.found.total_size += remaining;
        self.found.infos.push(download);
        Ok(())
    }
}

impl Operation for GetDownloadSize {
    type Output = DownloadSize;

    const NAME: &'static str = "get_download_size";

    fn start(&mut self, ctx: &Context) -> Progress<DownloadSize> {
        if ctx.settings.skips_updates() {
            return Progress::Done(Ok(DownloadSize::default()));
        }
        Progress::Pending(0.0)
    }

    fn update(&mut self, ctx: &Context, budget: &Budget) -> Progress<DownloadSize> {
        while self.cursor < self.packages.len() {
            if budget.is_busy() {
                let progress = self.cursor as f32 / self.packages.len() as f32;
                return Progress::Pending(progress);
            }
            let info = self.packages[self.cursor].clone();
            self.cursor += 1;
            if let Err(e) = self.inspect(ctx, &info) {
                return Progress::Done(Err(format!("package {}: {e}", info.name)));
            }
        }
        debug!(
            files = self.found.infos.len(),
            bytes = self.found.total_size,
            "download size computed"
        );
        Progress::Done(Ok(std::mem::take(&mut self.found)))
    }
}
