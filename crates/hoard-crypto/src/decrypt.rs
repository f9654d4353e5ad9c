//! Streaming AES-256-CBC decryption for package payloads.

use std::io::{self, Read};

use aes::Aes256;
use cbc::{
    Decryptor,
    cipher::{
        BlockDecryptMut, KeyIvInit,
        block_padding::{NoPadding, Pkcs7},
    },
};
use tracing::trace;

use crate::{
    CryptoContext,
    error::{CryptoError, CryptoResult},
};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Ciphertext bytes decrypted per step by [`DecryptReader`].
const READ_CHUNK: usize = 32 * 1024;

/// Running CBC state across chunks.
#[derive(Clone, Debug)]
pub struct ChunkState {
    key: [u8; 32],
    iv: [u8; 16],
}

impl ChunkState {
    #[must_use]
    pub fn new(ctx: &CryptoContext) -> Self {
        Self {
            key: ctx.key,
            iv: ctx.iv,
        }
    }
}

/// Decrypt one chunk of a CBC stream.
///
/// `input` must be aligned to the AES block size. For the last chunk
/// (`is_last = true`) PKCS7 padding is removed; intermediate chunks decrypt
/// block by block and advance the IV to the chunk's last ciphertext block.
///
/// Returns the number of plaintext bytes written to `output`, which must be at
/// least `input.len()` long.
pub fn decrypt_chunk(
    input: &[u8],
    output: &mut [u8],
    state: &mut ChunkState,
    is_last: bool,
) -> CryptoResult<usize> {
    if input.is_empty() {
        return Ok(0);
    }

    if !input.len().is_multiple_of(AES_BLOCK_SIZE) {
        return Err(CryptoError::Unaligned {
            len: input.len(),
            block: AES_BLOCK_SIZE,
        });
    }

    // The next chunk's IV is this chunk's last ciphertext block.
    let mut next_iv = [0u8; AES_BLOCK_SIZE];
    next_iv.copy_from_slice(&input[input.len() - AES_BLOCK_SIZE..]);

    let buf = &mut output[..input.len()];
    buf.copy_from_slice(input);

    let decryptor = Decryptor::<Aes256>::new((&state.key).into(), (&state.iv).into());
    let written = if is_last {
        decryptor
            .decrypt_padded_mut::<Pkcs7>(buf)
            .map_err(|_| CryptoError::Padding)?
            .len()
    } else {
        let written = decryptor
            .decrypt_padded_mut::<NoPadding>(buf)
            .map_err(|_| CryptoError::Padding)?
            .len();
        state.iv = next_iv;
        written
    };

    trace!(
        encrypted = input.len(),
        decrypted = written,
        is_last,
        "aes256_cbc: chunk decrypted"
    );
    Ok(written)
}

/// [`Read`] adapter that decrypts a CBC ciphertext stream on the fly.
///
/// One AES block is always held back until the inner reader reports EOF, so
/// padding is only stripped from the real final block.
pub struct DecryptReader<R> {
    inner: R,
    state: ChunkState,
    pending: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> DecryptReader<R> {
    pub fn new(inner: R, ctx: &CryptoContext) -> Self {
        Self {
            inner,
            state: ChunkState::new(ctx),
            pending: Vec::with_capacity(READ_CHUNK + AES_BLOCK_SIZE),
            out: Vec::new(),
            out_pos: 0,
            eof: false,
            finished: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; 8 * 1024];
        while !self.eof && self.pending.len() < READ_CHUNK + AES_BLOCK_SIZE {
            let n = self.inner.read(&mut scratch)?;
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&scratch[..n]);
            }
        }

        let (take, is_last) = if self.eof {
            (self.pending.len(), true)
        } else {
            let aligned = (self.pending.len() - AES_BLOCK_SIZE) / AES_BLOCK_SIZE * AES_BLOCK_SIZE;
            (aligned, false)
        };

        self.out.resize(take, 0);
        let written = decrypt_chunk(
            &self.pending[..take],
            &mut self.out,
            &mut self.state,
            is_last,
        )
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.out.truncate(written);
        self.out_pos = 0;
        self.pending.drain(..take);
        self.finished = is_last;
        Ok(())
    }
}

impl<R: Read> Read for DecryptReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.out_pos < self.out.len() {
                let n = buf.len().min(self.out.len() - self.out_pos);
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}
