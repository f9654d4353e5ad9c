use serde::{Deserialize, Serialize};

/// One distributable package as described by a manifest.
///
/// Serialised with the short keys used by the package producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Group tag assigned at build time.
    #[serde(rename = "g", default)]
    pub group: String,
    #[serde(rename = "n")]
    pub name: String,
    /// Content hash of the package file.
    #[serde(rename = "h")]
    pub hash: String,
    /// Package file size in bytes.
    #[serde(rename = "s")]
    pub size: u64,
    /// Raw files are shipped as-is and saved under their plain name.
    #[serde(rename = "r", default)]
    pub raw_file: bool,
    #[serde(rename = "a", default)]
    pub assets: Vec<String>,
    /// Indices into the owning manifest's package table.
    #[serde(rename = "d", default)]
    pub dependencies: Vec<usize>,
}

impl PackageInfo {
    /// Content-qualified file name: `{stem}_{hash}{.ext}`.
    ///
    /// Remote file name of the package and its save name for non-raw files.
    #[must_use]
    pub fn name_with_hash(&self) -> String {
        let file_start = self.name.rfind('/').map_or(0, |i| i + 1);
        match self.name[file_start..].rfind('.') {
            Some(dot) if dot > 0 => {
                let (stem, ext) = self.name.split_at(file_start + dot);
                format!("{stem}_{}{ext}", self.hash)
            }
            _ => format!("{}_{}", self.name, self.hash),
        }
    }

    /// File name the package is stored under in the download area.
    #[must_use]
    pub fn save_file_name(&self) -> String {
        if self.raw_file {
            self.name.clone()
        } else {
            self.name_with_hash()
        }
    }
}
