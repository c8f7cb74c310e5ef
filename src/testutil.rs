// Archive writers, only ever used to build test fixtures
use std::io::Write;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes256Enc, Block};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::crypto::BLOCK_LEN;
use crate::hash::Authenticator;
use crate::key::ArchiveKey;
use crate::nonce::MAGIC_SIGNATURE;
use crate::varint;

pub fn test_key() -> ArchiveKey {
    ArchiveKey::new([0x11; 32], [0x22; 32])
}

pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn gzip_with(builder: GzBuilder, data: &[u8]) -> Vec<u8> {
    let mut enc = builder.write(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn gzip_with_filename(data: &[u8]) -> Vec<u8> {
    gzip_with(GzBuilder::new().filename("backup.bin"), data)
}

pub fn gzip_with_comment(data: &[u8]) -> Vec<u8> {
    gzip_with(GzBuilder::new().comment("nightly"), data)
}

pub fn gzip_with_extra(data: &[u8]) -> Vec<u8> {
    gzip_with(GzBuilder::new().extra(vec![1, 2, 3, 4]), data)
}

/// Append the HMAC of everything in `data`
pub fn sign(key: &ArchiveKey, mut data: Vec<u8>) -> Vec<u8> {
    let mut hmac = Authenticator::new(key);
    hmac.update(&data);
    data.extend_from_slice(&hmac.finalize());
    data
}

/// `iv || cbc(data) || hmac` without adding any padding
pub fn encrypt_unpadded(key: &ArchiveKey, iv: &[u8; BLOCK_LEN], data: &[u8]) -> Vec<u8> {
    assert_eq!(data.len() % BLOCK_LEN, 0);

    let cipher = Aes256Enc::new(GenericArray::from_slice(key.enc_key()));
    let mut prev = *iv;
    let mut out = iv.to_vec();

    for chunk in data.chunks_exact(BLOCK_LEN) {
        let mut block = Block::clone_from_slice(chunk);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(&mut block);
        prev.copy_from_slice(&block);
        out.extend_from_slice(&block);
    }

    sign(key, out)
}

/// `iv || cbc(pkcs7(plaintext)) || hmac`
pub fn encrypt(key: &ArchiveKey, iv: &[u8; BLOCK_LEN], plaintext: &[u8]) -> Vec<u8> {
    let pad = BLOCK_LEN - (plaintext.len() % BLOCK_LEN);
    let mut padded = plaintext.to_vec();
    padded.extend(std::iter::repeat(pad as u8).take(pad));

    encrypt_unpadded(key, iv, &padded)
}

/// Split `data` into varint length prefixed frames of at most `size` bytes
pub fn frame(data: &[u8], size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(size) {
        varint::encode(chunk.len() as u64, &mut out);
        out.extend_from_slice(chunk);
    }
    out
}

pub fn nonce_header(metadata: &[u8]) -> Vec<u8> {
    let mut out = MAGIC_SIGNATURE.to_vec();
    varint::encode(metadata.len() as u64, &mut out);
    out.extend_from_slice(metadata);
    out
}

/// Full archive as served by the backup service
pub fn archive(key: &ArchiveKey, plaintext: &[u8], header: bool, framed: bool) -> Vec<u8> {
    let mut body = encrypt(key, &[0x5a; BLOCK_LEN], &gzip(plaintext));
    if framed {
        body = frame(&body, 4096);
    }

    let mut out = Vec::new();
    if header {
        out.extend_from_slice(&nonce_header(&random_bytes(99, 48)));
    }
    out.extend_from_slice(&body);
    out
}

/// Plaintext export: optional header and framing around the raw records
pub fn plaintext_archive(plaintext: &[u8], header: bool, framed: bool) -> Vec<u8> {
    let mut out = Vec::new();
    if header {
        out.extend_from_slice(&nonce_header(&random_bytes(99, 48)));
    }
    if framed {
        out.extend_from_slice(&frame(plaintext, 4096));
    } else {
        out.extend_from_slice(plaintext);
    }
    out
}
