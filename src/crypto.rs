//! Streaming AES-256-CBC decryption with a deferred HMAC check
//!
//! Encrypted stream layout:
//!
//! | Type     | Name       | Description |
//! | -------: | ---------- | ----------- |
//! | [u8; 16] | iv         | CBC initialization vector |
//! | [u8; N]  | ciphertext | AES-256-CBC with PKCS7 padding, N is a multiple of 16 |
//! | [u8; 32] | hmac       | HMAC-SHA256 of <code>iv \|\| ciphertext</code> |
//!
//! The trailer can only be told apart from ciphertext by its position, so the
//! last 32 bytes seen are never decrypted until the stream is finalized.
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, KeyInit};
use aes::{Aes256Dec, Block};
use log::{debug, trace, warn};
use thiserror::Error;

use crate::hash::{Authenticator, MAC_LEN};
use crate::key::{ArchiveKey, ENC_KEY_LEN};
use crate::transform::{Transform, TransformError};

pub const IV_LEN: usize = 16;
pub const BLOCK_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecryptError {
    #[error("stream too short for the iv and hmac trailer, {0} bytes buffered")]
    InvalidFooter(usize),
    #[error("hmac verification failed")]
    InvalidHmac,
    #[error("ciphertext is not block aligned or carries bad padding")]
    InvalidPadding,
}

fn xor_blocks(a: &[u8], b: &[u8], out: &mut [u8; BLOCK_LEN]) {
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
}

// CBC chaining by hand, the last plaintext block is held back since it is the
// only one that can carry padding.
struct CbcDecrypter {
    cipher: Aes256Dec,
    prev: [u8; BLOCK_LEN],
    partial: Vec<u8>,
    held: Option<[u8; BLOCK_LEN]>,
}

impl CbcDecrypter {
    fn new(key: &[u8; ENC_KEY_LEN], iv: &[u8]) -> Self {
        let mut prev = [0u8; BLOCK_LEN];
        prev.copy_from_slice(&iv[..BLOCK_LEN]);

        CbcDecrypter {
            cipher: Aes256Dec::new(GenericArray::from_slice(key)),
            prev,
            partial: Vec::with_capacity(BLOCK_LEN),
            held: None,
        }
    }

    fn update(&mut self, data: &[u8], out: &mut Vec<u8>) {
        self.partial.extend_from_slice(data);
        let full = self.partial.len() - (self.partial.len() % BLOCK_LEN);

        for chunk in self.partial[..full].chunks_exact(BLOCK_LEN) {
            let mut block = Block::clone_from_slice(chunk);
            self.cipher.decrypt_block(&mut block);

            let mut plain = [0u8; BLOCK_LEN];
            xor_blocks(&block, &self.prev, &mut plain);
            self.prev.copy_from_slice(chunk);

            if let Some(held) = self.held.replace(plain) {
                out.extend_from_slice(&held);
            }
        }
        self.partial.drain(..full);
    }

    fn finalize(self) -> Result<Vec<u8>, DecryptError> {
        if !self.partial.is_empty() {
            return Err(DecryptError::InvalidPadding);
        }
        let last = self.held.ok_or(DecryptError::InvalidPadding)?;

        // PKCS7
        let pad = last[BLOCK_LEN - 1] as usize;
        if pad == 0 || pad > BLOCK_LEN {
            return Err(DecryptError::InvalidPadding);
        }
        if last[BLOCK_LEN - pad..].iter().any(|&b| b as usize != pad) {
            return Err(DecryptError::InvalidPadding);
        }

        Ok(last[..BLOCK_LEN - pad].to_vec())
    }
}

pub struct StreamDecryptor {
    enc_key: [u8; ENC_KEY_LEN],
    hmac: Option<Authenticator>,
    cbc: Option<CbcDecrypter>,
    buf: Vec<u8>,
    finalized: bool,
}

impl StreamDecryptor {
    pub fn new(key: &ArchiveKey) -> Self {
        StreamDecryptor {
            enc_key: *key.enc_key(),
            hmac: Some(Authenticator::new(key)),
            cbc: None,
            buf: Vec::new(),
            finalized: false,
        }
    }

    // Hash then decrypt the first `len` buffered bytes
    fn release(&mut self, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len + BLOCK_LEN);

        if let (Some(hmac), Some(cbc)) = (self.hmac.as_mut(), self.cbc.as_mut()) {
            let data = &self.buf[..len];
            hmac.update(data);
            cbc.update(data, &mut out);
            self.buf.drain(..len);
        }
        out
    }
}

impl Transform for StreamDecryptor {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        if self.finalized {
            warn!("decryptor fed {} bytes after finalization", input.len());
            return Ok(Vec::new());
        }
        self.buf.extend_from_slice(input);

        if self.cbc.is_none() {
            if self.buf.len() < IV_LEN {
                return Ok(Vec::new());
            }

            let iv: Vec<u8> = self.buf.drain(..IV_LEN).collect();
            if let Some(hmac) = self.hmac.as_mut() {
                hmac.update(&iv);
            }
            self.cbc = Some(CbcDecrypter::new(&self.enc_key, &iv));
            debug!("decryptor initialized from iv");
        }

        let len = self.buf.len().saturating_sub(MAC_LEN);
        let out = self.release(len);

        trace!("decrypted {} bytes, {} withheld", out.len(), self.buf.len());
        Ok(out)
    }

    fn finalize(&mut self) -> Result<Vec<u8>, TransformError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;

        if self.cbc.is_none() || self.buf.len() < MAC_LEN {
            return Err(DecryptError::InvalidFooter(self.buf.len()).into());
        }

        let len = self.buf.len() - MAC_LEN;
        let mut out = self.release(len);

        // Authenticate before looking at the padding
        let verified = match self.hmac.take() {
            Some(hmac) => hmac.verify(&self.buf),
            None => false,
        };
        if !verified {
            warn!("archive hmac mismatch");
            return Err(DecryptError::InvalidHmac.into());
        }

        if let Some(cbc) = self.cbc.take() {
            out.extend_from_slice(&cbc.finalize()?);
        }
        self.buf.clear();

        debug!("decryptor finalized, hmac verified");
        Ok(out)
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }
}
