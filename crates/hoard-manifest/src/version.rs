use serde::{Deserialize, Serialize};

/// Identity of one manifest file inside a published build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Logical manifest name.
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "f")]
    pub file_name: String,
    #[serde(rename = "s")]
    pub size: u64,
    #[serde(rename = "h")]
    pub hash: String,
}

/// All manifest records of one build, with its version and build time.
///
/// The timestamp decides recency during reconciliation; the version number
/// only names files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionContainer {
    #[serde(rename = "v", default)]
    pub version: u32,
    #[serde(rename = "t", default)]
    pub timestamp: i64,
    #[serde(rename = "a", default)]
    pub records: Vec<VersionRecord>,
}

const ENCRYPTED_VERSION_ALIAS: &str = "d4a27b33a023fdabc304433a38a64e11";
const ENCRYPTED_LATEST_ALIAS: &str = "33a38a6422e11d4a27b33a023fdabc28";
const ENCRYPTED_EXT: &str = ".hoard";

/// Which version file to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionFile {
    /// The version file of the current build.
    Current,
    /// The version file published for a specific version number.
    Numbered(u32),
    /// The pointer to the latest published build.
    Latest,
}

impl VersionFile {
    /// File name for this version file; obfuscated when `encrypted`.
    #[must_use]
    pub fn file_name(self, encrypted: bool) -> String {
        match (self, encrypted) {
            (Self::Current, false) => "version.json".to_string(),
            (Self::Numbered(n), false) => format!("version_v{n}.json"),
            (Self::Latest, false) => "latest_version.json".to_string(),
            (Self::Current, true) => format!("{ENCRYPTED_VERSION_ALIAS}{ENCRYPTED_EXT}"),
            (Self::Numbered(n), true) => format!(
                "{}{ENCRYPTED_EXT}",
                hoard_crypto::alias_file_name(&format!("{ENCRYPTED_VERSION_ALIAS}_v{n}"))
            ),
            (Self::Latest, true) => format!("{ENCRYPTED_LATEST_ALIAS}{ENCRYPTED_EXT}"),
        }
    }

    /// Remote file to fetch for an update request.
    #[must_use]
    pub fn for_request(version: u32, latest: bool) -> Self {
        if latest {
            Self::Latest
        } else if version > 0 {
            Self::Numbered(version)
        } else {
            Self::Current
        }
    }
}
