use std::path::PathBuf;

/// Events emitted by the manifest registry and codec.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestEvent {
    /// A manifest was registered for the first time.
    Registered { name: String, file_name: String },
    /// A registered manifest's contents were replaced in place.
    Overridden { name: String, file_name: String },
    /// A manifest or version file failed to parse and was deleted.
    Corrupt { path: PathBuf, error: String },
}
