use std::io::{self, Read};

use log::{debug, info, trace, warn};

use crate::buf::flush_buf;
use crate::config::DecodeConfig;
use crate::crypto::StreamDecryptor;
use crate::gzip::GzipInflater;
use crate::key::ArchiveKey;
use crate::nonce::NonceHeaderSkipper;
use crate::source::ByteSource;
use crate::transform::{Transform, TransformError};
use crate::varint::VarintFramer;

pub type Stage = Box<dyn Transform + Send>;

/// Pull driven chain of [`Transform`] stages over a [`ByteSource`].
///
/// Each call drives the chain until some output is available:
///
/// 1. A stage with pending bytes is drained first, its output is then fed
///    through every later stage.
/// 2. Otherwise fresh bytes are pulled from the source and fed through the
///    whole chain.
/// 3. Once the source is exhausted the stages are finalized in order, each
///    finalized output being fed through the later stages before the next
///    stage is finalized.
///
/// Any error closes the source and poisons the pipeline.
pub struct TransformPipeline<S: ByteSource> {
    source: S,
    stages: Vec<Stage>,

    read_size: usize,
    out_buf: Vec<u8>,

    total_in: u64,
    total_out: u64,
    closed: bool,
    poisoned: bool,
}

// Layers shared by every archive kind
fn envelope_stages(config: &DecodeConfig) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::with_capacity(4);
    stages.push(Box::new(NonceHeaderSkipper::with_signature(
        config.header,
        &config.signature,
    )));
    if config.framed {
        stages.push(Box::new(VarintFramer::with_threshold(
            config.compact_threshold,
        )));
    }
    stages
}

impl<S: ByteSource> TransformPipeline<S> {
    pub fn new(source: S, stages: Vec<Stage>) -> Self {
        TransformPipeline {
            source,
            stages,
            read_size: crate::config::READ_SIZE,
            out_buf: Vec::new(),
            total_in: 0,
            total_out: 0,
            closed: false,
            poisoned: false,
        }
    }

    /// Standard archive chain: header skip, framing, decrypt, inflate.
    ///
    /// With `encrypted = false` in the config the key is unused and the chain
    /// stops after the framer, see [`TransformPipeline::for_plaintext`].
    pub fn for_archive(source: S, key: &ArchiveKey, config: &DecodeConfig) -> Self {
        if !config.encrypted {
            return TransformPipeline::for_plaintext(source, config);
        }

        let mut stages = envelope_stages(config);
        stages.push(Box::new(StreamDecryptor::new(key)));
        stages.push(Box::new(GzipInflater::with_buffer(config.inflate_buffer)));

        debug!("archive pipeline with {} stages", stages.len());
        TransformPipeline::new(source, stages).with_read_size(config.read_size)
    }

    /// Unencrypted, uncompressed export: only the header and framing layers.
    pub fn for_plaintext(source: S, config: &DecodeConfig) -> Self {
        let stages = envelope_stages(config);

        debug!("plaintext pipeline with {} stages", stages.len());
        TransformPipeline::new(source, stages).with_read_size(config.read_size)
    }

    fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size;
        self
    }

    /// Bytes pulled from the source so far, for progress reporting.
    pub fn bytes_read(&self) -> u64 {
        self.total_in
    }

    /// Decoded bytes handed out so far.
    pub fn bytes_written(&self) -> u64 {
        self.total_out
    }

    pub fn has_more_output(&self) -> bool {
        if self.poisoned {
            return false;
        }
        self.source.has_bytes_available()
            || self
                .stages
                .iter()
                .any(|s| s.has_pending_bytes() || !s.is_finalized())
    }

    /// Next chunk of decoded output.
    ///
    /// `max_len` bounds how much is pulled from the source per step, not the
    /// size of the result. An empty result means the pipeline is done.
    pub fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, TransformError> {
        if self.poisoned {
            return Err(TransformError::Poisoned);
        }

        match self.step(max_len.max(1)) {
            Ok(out) => {
                self.total_out += out.len() as u64;
                Ok(out)
            }
            Err(e) => {
                warn!("aborting pipeline: {}", e);
                self.poisoned = true;
                if let Err(ce) = self.close_source() {
                    warn!("failed to close source: {}", ce);
                }
                Err(e)
            }
        }
    }

    fn step(&mut self, max_len: usize) -> Result<Vec<u8>, TransformError> {
        let mut out = Vec::new();

        while out.is_empty() && self.has_more_output() {
            out = if let Some(idx) = self.stages.iter().position(|s| s.has_pending_bytes()) {
                trace!("draining stage {}", idx);
                let data = self.stages[idx].read_buffered()?;
                self.fold(idx + 1, data)?
            } else if self.source.has_bytes_available() {
                let data = self.source.read(max_len)?;
                self.total_in += data.len() as u64;
                self.fold(0, data)?
            } else if let Some(idx) = self.stages.iter().position(|s| !s.is_finalized()) {
                debug!("finalizing stage {}", idx);
                let data = self.stages[idx].finalize()?;
                self.fold(idx + 1, data)?
            } else {
                break;
            };
        }

        if !self.closed && !self.has_more_output() {
            info!(
                "archive decoded: {} bytes in, {} bytes out",
                self.total_in,
                self.total_out + out.len() as u64
            );
            // Decoding is complete, a close failure is only logged
            if let Err(e) = self.close_source() {
                warn!("failed to close source: {}", e);
            }
        }
        Ok(out)
    }

    /// Feed `data` through the stages starting at `from`.
    fn fold(&mut self, from: usize, mut data: Vec<u8>) -> Result<Vec<u8>, TransformError> {
        for stage in self.stages[from..].iter_mut() {
            if data.is_empty() {
                break;
            }
            data = stage.transform(&data)?;
        }
        Ok(data)
    }

    fn close_source(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.source.close()
    }

    /// Release the source early, further reads fail with `Poisoned`.
    pub fn close(&mut self) -> io::Result<()> {
        self.poisoned = true;
        self.out_buf.clear();
        self.close_source()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

impl<S: ByteSource> Read for TransformPipeline<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.out_buf.is_empty() {
            if !self.poisoned && !self.has_more_output() {
                return Ok(0);
            }
            match self.read_chunk(self.read_size) {
                Ok(data) if data.is_empty() => return Ok(0),
                Ok(data) => self.out_buf = data,
                Err(TransformError::IO(e)) => return Err(e),
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
        }
        Ok(flush_buf(&mut self.out_buf, buf))
    }
}
