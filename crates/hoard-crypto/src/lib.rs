#![forbid(unsafe_code)]

//! Symmetric transforms applied to manifest files and package streams when
//! encrypted storage is enabled.

mod context;
mod decrypt;
mod error;

pub use crate::{
    context::{CryptoContext, alias_file_name},
    decrypt::{AES_BLOCK_SIZE, ChunkState, DecryptReader, decrypt_chunk},
    error::{CryptoError, CryptoResult},
};
