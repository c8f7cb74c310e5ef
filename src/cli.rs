use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser)]
#[command(name = "unarc")]
#[command(about = "Decode an encrypted, compressed backup archive")]
#[command(author, version, long_about = None)]
#[command(group(ArgGroup::new("key_source").args(["key", "key_file"])))]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base64 encoded `enc-key || hmac-key`
    #[arg(short, long, value_name = "BASE64")]
    pub key: Option<String>,

    /// File holding the base64 encoded key
    #[arg(long, value_name = "FILE")]
    pub key_file: Option<PathBuf>,

    /// Write the plaintext here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// The archive carries no nonce header
    #[arg(long)]
    pub no_header: bool,

    /// The encrypted payload is not length framed
    #[arg(long)]
    pub unframed: bool,

    /// Plaintext export, no decryption or decompression (no key needed)
    #[arg(long, conflicts_with = "key_source")]
    pub plaintext: bool,

    /// Archive to decode
    pub input: PathBuf,
}
