use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

pub const ENC_KEY_LEN: usize = 32;
pub const HMAC_KEY_LEN: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyError {
    #[error("key material must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("key is not valid base64: {0}")]
    Base64(String),
}

// Key material as handed over by the backup service:
//  enc-key (AES-256) || hmac-key (HMAC-SHA256)
//
// Deriving either of those from a passphrase or an account secret happens
// upstream of this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct ArchiveKey {
    enc: [u8; ENC_KEY_LEN],
    hmac: [u8; HMAC_KEY_LEN],
}

impl ArchiveKey {
    pub fn new(enc: [u8; ENC_KEY_LEN], hmac: [u8; HMAC_KEY_LEN]) -> Self {
        ArchiveKey { enc, hmac }
    }

    /// Split the concatenated `enc || hmac` form
    pub fn from_slice(material: &[u8]) -> Result<Self, KeyError> {
        if material.len() != ENC_KEY_LEN + HMAC_KEY_LEN {
            return Err(KeyError::Length {
                expected: ENC_KEY_LEN + HMAC_KEY_LEN,
                actual: material.len(),
            });
        }

        let mut enc = [0u8; ENC_KEY_LEN];
        let mut hmac = [0u8; HMAC_KEY_LEN];
        enc.copy_from_slice(&material[..ENC_KEY_LEN]);
        hmac.copy_from_slice(&material[ENC_KEY_LEN..]);

        Ok(ArchiveKey { enc, hmac })
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let material = STANDARD
            .decode(encoded.trim())
            .map_err(|e| KeyError::Base64(e.to_string()))?;
        ArchiveKey::from_slice(&material)
    }

    pub fn enc_key(&self) -> &[u8; ENC_KEY_LEN] {
        &self.enc
    }

    pub fn hmac_key(&self) -> &[u8; HMAC_KEY_LEN] {
        &self.hmac
    }
}

// Never print key material
impl fmt::Debug for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveKey")
            .field("enc", &"<redacted>")
            .field("hmac", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod test_archive_key {
    use super::*;

    #[test]
    fn split_material() {
        let mut material = vec![1u8; ENC_KEY_LEN];
        material.extend_from_slice(&[2u8; HMAC_KEY_LEN]);
        let key = ArchiveKey::from_slice(&material).unwrap();

        assert_eq!(key.enc_key(), &[1u8; ENC_KEY_LEN]);
        assert_eq!(key.hmac_key(), &[2u8; HMAC_KEY_LEN]);
    }

    #[test]
    fn wrong_length() {
        assert_eq!(
            ArchiveKey::from_slice(&[0; 32]),
            Err(KeyError::Length {
                expected: 64,
                actual: 32
            })
        );
    }

    #[test]
    fn base64_roundtrip() {
        let key = ArchiveKey::new([3; ENC_KEY_LEN], [4; HMAC_KEY_LEN]);
        let mut material = key.enc_key().to_vec();
        material.extend_from_slice(key.hmac_key());
        let encoded = STANDARD.encode(&material);

        assert_eq!(ArchiveKey::from_base64(&format!("{}\n", encoded)).unwrap(), key);
    }

    #[test]
    fn bad_base64() {
        assert!(matches!(
            ArchiveKey::from_base64("not base64!"),
            Err(KeyError::Base64(_))
        ));
    }

    #[test]
    fn debug_hides_material() {
        let key = ArchiveKey::new([0xaa; ENC_KEY_LEN], [0xbb; HMAC_KEY_LEN]);

        assert!(!format!("{:?}", key).contains("170"));
    }
}
