use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ManifestError, ManifestResult, PackageInfo};

/// On-disk shape of a manifest file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestFile {
    #[serde(rename = "p", default)]
    packages: Vec<PackageInfo>,
}

/// Named collection of packages with eager lookup indexes.
///
/// `name` and `file_name` come from the version record the manifest was
/// loaded for, not from the file itself.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    name: String,
    file_name: String,
    packages: Vec<PackageInfo>,
    by_name: HashMap<String, usize>,
    by_asset: HashMap<String, usize>,
}

impl Manifest {
    /// Build a manifest and its indexes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Corrupt`] when a dependency index points
    /// outside the package table.
    pub fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        packages: Vec<PackageInfo>,
    ) -> ManifestResult<Self> {
        let mut manifest = Self {
            name: name.into(),
            file_name: file_name.into(),
            packages,
            by_name: HashMap::new(),
            by_asset: HashMap::new(),
        };
        manifest.reload()?;
        Ok(manifest)
    }

    /// Parse manifest JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Corrupt`] on malformed JSON or invalid
    /// dependency indices.
    pub fn from_json(
        name: impl Into<String>,
        file_name: impl Into<String>,
        text: &str,
    ) -> ManifestResult<Self> {
        let file_name = file_name.into();
        let parsed: ManifestFile =
            serde_json::from_str(text).map_err(|e| ManifestError::Corrupt {
                file: file_name.clone(),
                reason: e.to_string(),
            })?;
        Self::new(name, file_name, parsed.packages)
    }

    /// Serialise the package table.
    ///
    /// # Errors
    ///
    /// Only fails if serde cannot serialise the table.
    pub fn to_json(&self) -> ManifestResult<String> {
        serde_json::to_string(&ManifestFile {
            packages: self.packages.clone(),
        })
        .map_err(|e| ManifestError::Corrupt {
            file: self.file_name.clone(),
            reason: e.to_string(),
        })
    }

    /// Rebuild the name and asset-path indexes.
    fn reload(&mut self) -> ManifestResult<()> {
        self.by_name.clear();
        self.by_asset.clear();

        let count = self.packages.len();
        for (index, package) in self.packages.iter().enumerate() {
            if let Some(bad) = package.dependencies.iter().find(|&&d| d >= count) {
                return Err(ManifestError::Corrupt {
                    file: self.file_name.clone(),
                    reason: format!(
                        "package {} depends on index {bad}, table has {count} entries",
                        package.name
                    ),
                });
            }
            self.by_name.insert(package.name.clone(), index);
            for path in &package.assets {
                self.by_asset.insert(path.clone(), index);
            }
        }
        Ok(())
    }

    /// Replace contents, keeping the logical name.
    pub fn override_with(&mut self, other: Manifest) {
        self.file_name = other.file_name;
        self.packages = other.packages;
        self.by_name = other.by_name;
        self.by_asset = other.by_asset;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn packages(&self) -> &[PackageInfo] {
        &self.packages
    }

    #[must_use]
    pub fn contains_asset(&self, path: &str) -> bool {
        self.by_asset.contains_key(path)
    }

    #[must_use]
    pub fn package(&self, name: &str) -> Option<&PackageInfo> {
        self.by_name.get(name).map(|&i| &self.packages[i])
    }

    #[must_use]
    pub fn package_for_asset(&self, path: &str) -> Option<&PackageInfo> {
        self.by_asset.get(path).map(|&i| &self.packages[i])
    }

    /// Direct dependencies of `package`, in declaration order.
    #[must_use]
    pub fn dependencies(&self, package: &PackageInfo) -> Vec<&PackageInfo> {
        package
            .dependencies
            .iter()
            .filter_map(|&i| self.packages.get(i))
            .collect()
    }

    pub fn asset_paths(&self) -> impl Iterator<Item = &str> {
        self.by_asset.keys().map(String::as_str)
    }
}
