use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("nothing to transform: input is empty")]
    Empty,

    #[error("input length {len} is not aligned to AES block size {block}")]
    Unaligned { len: usize, block: usize },

    #[error("PKCS7 unpad failed")]
    Padding,

    #[error("base64 decode failed: {0}")]
    Base64(String),

    #[error("decrypted text is not valid UTF-8")]
    Utf8,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
