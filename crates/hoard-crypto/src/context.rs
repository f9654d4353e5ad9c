//! Key material and wholesale transforms.

use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD};
use cbc::{
    Decryptor, Encryptor,
    cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
};

use crate::error::{CryptoError, CryptoResult};

const DEFAULT_KEY: &str = "hoard.runtime.manifest-key.v1.00";
const DEFAULT_IV: &str = "hoard-iv-00000v1";

/// AES-256-CBC key and IV shared by the packaging side and the runtime.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct CryptoContext {
    /// AES-256 key (32 bytes).
    pub key: [u8; 32],
    /// Initialization vector (16 bytes).
    pub iv: [u8; 16],
}

impl CryptoContext {
    #[must_use]
    pub fn new(key: [u8; 32], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// Build a context from text secrets.
    ///
    /// The key is right-padded with spaces (or truncated) to 32 bytes and the
    /// IV to 16 bytes, so packaging tools can share plain strings.
    #[must_use]
    pub fn from_secret(key: &str, iv: &str) -> Self {
        Self {
            key: pad::<32>(key),
            iv: pad::<16>(iv),
        }
    }

    /// Encrypt `data` with PKCS7 padding.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Empty`] for empty input.
    pub fn encrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        if data.is_empty() {
            return Err(CryptoError::Empty);
        }
        let encryptor = Encryptor::<Aes256>::new((&self.key).into(), (&self.iv).into());
        Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(data))
    }

    /// Decrypt a whole PKCS7-padded ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Empty`] for empty input and
    /// [`CryptoError::Padding`] when the key is wrong or data is corrupt.
    pub fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        if data.is_empty() {
            return Err(CryptoError::Empty);
        }
        let decryptor = Decryptor::<Aes256>::new((&self.key).into(), (&self.iv).into());
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|_| CryptoError::Padding)
    }

    /// Encrypt UTF-8 text and encode the ciphertext as base64.
    pub fn encrypt_text(&self, text: &str) -> CryptoResult<String> {
        let encrypted = self.encrypt(text.as_bytes())?;
        Ok(STANDARD.encode(encrypted))
    }

    /// Decode base64 and decrypt back to UTF-8 text.
    pub fn decrypt_text(&self, text: &str) -> CryptoResult<String> {
        let encrypted = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::Base64(e.to_string()))?;
        let plain = self.decrypt(&encrypted)?;
        String::from_utf8(plain).map_err(|_| CryptoError::Utf8)
    }
}

impl Default for CryptoContext {
    fn default() -> Self {
        Self::from_secret(DEFAULT_KEY, DEFAULT_IV)
    }
}

impl std::fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext").finish_non_exhaustive()
    }
}

fn pad<const N: usize>(secret: &str) -> [u8; N] {
    let mut out = [b' '; N];
    let bytes = secret.as_bytes();
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Obfuscated file name: the content hash of `name`.
#[must_use]
pub fn alias_file_name(name: &str) -> String {
    hoard_core::hash_str(name)
}
