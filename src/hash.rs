use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::key::ArchiveKey;

pub const MAC_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Running CRC32 plus byte count (modulo 2^32) as stored in a gzip trailer
pub struct Checksum {
    crc: crc32fast::Hasher,
    size: u32,
}

impl Checksum {
    pub fn new() -> Checksum {
        Checksum {
            crc: crc32fast::Hasher::new(),
            size: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.size = self.size.wrapping_add(data.len() as u32);
    }

    /// `(crc32, size mod 2^32)`
    pub fn finalize(self) -> (u32, u32) {
        (self.crc.finalize(), self.size)
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Checksum::new()
    }
}

/// Keyed HMAC-SHA256 over the ciphertext stream
pub struct Authenticator(HmacSha256);

impl Authenticator {
    pub fn new(key: &ArchiveKey) -> Authenticator {
        Authenticator::from_slice(key.hmac_key())
    }

    pub fn from_slice(hmac_key: &[u8]) -> Authenticator {
        // HMAC takes keys of any length
        let mac = <HmacSha256 as Mac>::new_from_slice(hmac_key)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        Authenticator(mac)
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Constant time comparison against the trailer
    pub fn verify(self, tag: &[u8]) -> bool {
        self.0.verify_slice(tag).is_ok()
    }

    #[cfg(test)]
    pub fn finalize(self) -> [u8; MAC_LEN] {
        let mut tag = [0u8; MAC_LEN];
        tag.copy_from_slice(&self.0.finalize().into_bytes());
        tag
    }
}

#[cfg(test)]
mod test_checksum {
    use super::*;

    #[test]
    fn empty() {
        assert_eq!(Checksum::new().finalize(), (0, 0));
    }

    #[test]
    fn known_crc() {
        let mut hash = Checksum::new();
        hash.update(b"123456789");

        assert_eq!(hash.finalize(), (0xcbf43926, 9));
    }

    #[test]
    fn split_updates() {
        let mut one = Checksum::new();
        one.update(b"hello world");

        let mut two = Checksum::new();
        two.update(b"hello");
        two.update(b"");
        two.update(b" world");

        assert_eq!(one.finalize(), two.finalize());
    }
}
