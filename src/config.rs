use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use crate::buf::COMPACT_THRESHOLD;
use crate::gzip::INFLATE_BUFFER;
use crate::nonce::{HeaderMode, MAGIC_SIGNATURE};

// 8Kb source reads
pub const READ_SIZE: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// How an archive is laid out and how hard to buffer while decoding it.
///
/// ```toml
/// header = "expected"
/// signature = "534241434b555001"
/// framed = true
/// encrypted = true
/// read_size = 8192
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeConfig {
    pub header: HeaderMode,

    /// Hex encoded magic signature of the archive header
    #[serde(deserialize_with = "from_hex")]
    pub signature: Vec<u8>,

    /// Whether the encrypted payload is carried in varint length frames
    pub framed: bool,

    /// False for plaintext exports, which are neither encrypted nor compressed
    pub encrypted: bool,

    pub read_size: usize,
    pub compact_threshold: usize,
    pub inflate_buffer: usize,
}

fn from_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    hex::decode(encoded.trim()).map_err(de::Error::custom)
}

impl Default for DecodeConfig {
    fn default() -> Self {
        DecodeConfig {
            header: HeaderMode::Expected,
            signature: MAGIC_SIGNATURE.to_vec(),
            framed: true,
            encrypted: true,
            read_size: READ_SIZE,
            compact_threshold: COMPACT_THRESHOLD,
            inflate_buffer: INFLATE_BUFFER,
        }
    }
}

impl DecodeConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DecodeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        DecodeConfig::from_toml(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_size == 0 {
            return Err(ConfigError::Invalid("read_size must be non-zero"));
        }
        if self.inflate_buffer == 0 {
            return Err(ConfigError::Invalid("inflate_buffer must be non-zero"));
        }
        if self.header == HeaderMode::Expected && self.signature.is_empty() {
            return Err(ConfigError::Invalid("signature must not be empty"));
        }
        Ok(())
    }
}
