use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error, info};

use unarc::{ArchiveKey, DecodeConfig, HeaderMode, ReaderSource, TransformPipeline};

mod cli;
use crate::cli::Cli;

fn main() -> ExitCode {
    env_logger::init();

    // Parse the cli
    let cli = Cli::parse();

    match run(&cli) {
        Ok(len) => {
            info!("wrote {} bytes", len);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<u64, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => DecodeConfig::load(path)?,
        None => DecodeConfig::default(),
    };
    if cli.no_header {
        config.header = HeaderMode::Absent;
    }
    if cli.unframed {
        config.framed = false;
    }
    if cli.plaintext {
        config.encrypted = false;
    }
    config.validate()?;
    debug!("CONFIG: {:?}", config);

    let file = File::open(&cli.input)?;
    let total = file.metadata()?.len();
    let source = ReaderSource::new(file);

    let mut pipeline = if config.encrypted {
        let key = match (&cli.key, &cli.key_file) {
            (Some(encoded), _) => ArchiveKey::from_base64(encoded)?,
            (None, Some(path)) => ArchiveKey::from_base64(&fs::read_to_string(path)?)?,
            (None, None) => return Err("no key given, use --key, --key-file or --plaintext".into()),
        };
        TransformPipeline::for_archive(source, &key, &config)
    } else {
        TransformPipeline::for_plaintext(source, &config)
    };

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut percent = 0;
    while pipeline.has_more_output() {
        let chunk = pipeline.read_chunk(config.read_size)?;
        out.write_all(&chunk)?;

        if total > 0 {
            let now = pipeline.bytes_read() * 100 / total;
            if now > percent {
                percent = now;
                debug!("progress: {}%", percent);
            }
        }
    }
    out.flush()?;

    Ok(pipeline.bytes_written())
}
