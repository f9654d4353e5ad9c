//! Reading and writing manifest and version files, optionally encrypted.

use std::{fs, io, path::Path};

use hoard_core::write_atomic;
use hoard_crypto::CryptoContext;
use hoard_events::{EventBus, ManifestEvent};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{Manifest, ManifestError, ManifestResult, VersionContainer, VersionRecord};

/// Text codec for manifest and version files.
///
/// In encrypted mode files hold base64 of the AES-encrypted JSON. A file
/// that cannot be read back is deleted so the next reconciliation fetches a
/// fresh copy.
#[derive(Clone, Debug, Default)]
pub struct ManifestCodec {
    crypto: Option<CryptoContext>,
    events: Option<EventBus>,
}

impl ManifestCodec {
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn encrypted(crypto: CryptoContext) -> Self {
        Self {
            crypto: Some(crypto),
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.crypto.is_some()
    }

    /// Serialise `value` to file text.
    ///
    /// # Errors
    ///
    /// Fails on serialisation or encryption errors.
    pub fn encode<T: Serialize>(&self, value: &T) -> ManifestResult<String> {
        let json = serde_json::to_string(value).map_err(|e| ManifestError::Corrupt {
            file: String::new(),
            reason: e.to_string(),
        })?;
        match &self.crypto {
            Some(ctx) => Ok(ctx.encrypt_text(&json)?),
            None => Ok(json),
        }
    }

    /// Write a version container atomically.
    ///
    /// # Errors
    ///
    /// Fails on encoding or I/O errors.
    pub fn write_version(&self, path: &Path, container: &VersionContainer) -> ManifestResult<()> {
        let text = self.encode(container)?;
        write_atomic(path, text.as_bytes())?;
        Ok(())
    }

    /// Write a manifest atomically and return the record describing it.
    ///
    /// # Errors
    ///
    /// Fails on encoding or I/O errors.
    pub fn write_manifest(&self, path: &Path, manifest: &Manifest) -> ManifestResult<VersionRecord> {
        let json = manifest.to_json()?;
        let text = match &self.crypto {
            Some(ctx) => ctx.encrypt_text(&json)?,
            None => json,
        };
        write_atomic(path, text.as_bytes())?;
        Ok(VersionRecord {
            name: manifest.name().to_string(),
            file_name: manifest.file_name().to_string(),
            size: text.len() as u64,
            hash: hoard_core::hash_bytes(text.as_bytes()),
        })
    }

    /// Read a version container. Corrupt files are deleted.
    ///
    /// # Errors
    ///
    /// [`ManifestError::NotFound`] for a missing file, [`ManifestError::Corrupt`]
    /// when it cannot be decoded.
    pub fn read_version(&self, path: &Path) -> ManifestResult<VersionContainer> {
        let plain = self.read_plain(path)?;
        serde_json::from_str(&plain).map_err(|e| self.discard(path, e.to_string()))
    }

    /// Read the manifest described by `record` from `path`. Corrupt files are
    /// deleted.
    ///
    /// # Errors
    ///
    /// [`ManifestError::NotFound`] for a missing file, [`ManifestError::Corrupt`]
    /// when it cannot be decoded or validated.
    pub fn read_manifest(&self, path: &Path, record: &VersionRecord) -> ManifestResult<Manifest> {
        let plain = self.read_plain(path)?;
        Manifest::from_json(&record.name, &record.file_name, &plain).map_err(|e| {
            let reason = match e {
                ManifestError::Corrupt { reason, .. } => reason,
                other => other.to_string(),
            };
            self.discard(path, reason)
        })
    }

    fn read_plain(&self, path: &Path) -> ManifestResult<String> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        String::from_utf8(bytes)
            .map_err(|_| "file is not valid UTF-8".to_string())
            .and_then(|text| self.decode_text(&text))
            .map_err(|reason| self.discard(path, reason))
    }

    fn decode_text(&self, text: &str) -> Result<String, String> {
        match &self.crypto {
            Some(ctx) => ctx.decrypt_text(text.trim()).map_err(|e| e.to_string()),
            None => Ok(text.to_string()),
        }
    }

    fn discard(&self, path: &Path, reason: String) -> ManifestError {
        warn!(path = %path.display(), %reason, "corrupt manifest file, deleting");
        if let Err(e) = fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "corrupt file already gone");
        }
        if let Some(events) = &self.events {
            events.publish(ManifestEvent::Corrupt {
                path: path.to_path_buf(),
                error: reason.clone(),
            });
        }
        ManifestError::Corrupt {
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            reason,
        }
    }
}
