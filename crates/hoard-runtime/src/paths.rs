use std::{fmt, path::PathBuf, sync::Arc};

use hoard_core::join_rel;
use url::Url;

use crate::{HoardError, HoardResult};

/// Overrides the download URL of a file name.
pub type UrlResolver = Arc<dyn Fn(&str) -> Option<Url> + Send + Sync>;

/// Directories and base URL the runtime works with.
///
/// * `local_dir` holds built-in files shipped with the host (read only).
/// * `download_dir` holds downloaded packages and manifests.
/// * `temp_dir` keeps the built-in version file as the update baseline.
#[derive(Clone)]
pub struct AssetPaths {
    pub local_dir: PathBuf,
    pub download_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub base_url: Url,
    pub platform: String,
    pub url_resolver: Option<UrlResolver>,
}

impl fmt::Debug for AssetPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetPaths")
            .field("local_dir", &self.local_dir)
            .field("download_dir", &self.download_dir)
            .field("temp_dir", &self.temp_dir)
            .field("base_url", &self.base_url.as_str())
            .field("platform", &self.platform)
            .field("url_resolver", &self.url_resolver.is_some())
            .finish()
    }
}

impl AssetPaths {
    #[must_use]
    pub fn new(
        local_dir: impl Into<PathBuf>,
        download_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        base_url: Url,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            local_dir: local_dir.into(),
            download_dir: download_dir.into(),
            temp_dir: temp_dir.into(),
            base_url,
            platform: platform.into(),
            url_resolver: None,
        }
    }

    #[must_use]
    pub fn with_url_resolver(mut self, resolver: UrlResolver) -> Self {
        self.url_resolver = Some(resolver);
        self
    }

    /// `{base_url}/{platform}/{file}` unless the resolver overrides it.
    ///
    /// # Errors
    ///
    /// [`HoardError::Config`] when the joined URL does not parse.
    pub fn download_url(&self, file: &str) -> HoardResult<Url> {
        if let Some(url) = self.url_resolver.as_ref().and_then(|r| r(file)) {
            return Ok(url);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = if self.platform.is_empty() {
            format!("{base}/{file}")
        } else {
            format!("{base}/{}/{file}", self.platform)
        };
        Url::parse(&joined).map_err(|e| HoardError::Config(format!("{joined}: {e}")))
    }

    /// # Errors
    ///
    /// Fails for names escaping the directory.
    pub fn local_path(&self, file: &str) -> HoardResult<PathBuf> {
        Ok(join_rel(&self.local_dir, file)?)
    }

    /// # Errors
    ///
    /// Fails for names escaping the directory.
    pub fn download_path(&self, file: &str) -> HoardResult<PathBuf> {
        Ok(join_rel(&self.download_dir, file)?)
    }

    /// # Errors
    ///
    /// Fails for names escaping the directory.
    pub fn temp_path(&self, file: &str) -> HoardResult<PathBuf> {
        Ok(join_rel(&self.temp_dir, file)?)
    }
}
