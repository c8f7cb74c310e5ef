use std::io::Read;

use log::trace;

use crate::buf::fill_buf;

/// Pull based provider of raw archive bytes (a file, a download, ...)
pub trait ByteSource {
    /// False once the source is known to be exhausted or closed.
    fn has_bytes_available(&self) -> bool;

    /// Read up to `max` bytes, may return fewer (or none) before the end.
    fn read(&mut self, max: usize) -> std::io::Result<Vec<u8>>;

    fn close(&mut self) -> std::io::Result<()>;
}

/// Adapts any [`Read`] into a [`ByteSource`].
pub struct ReaderSource<R: Read> {
    inner: Option<R>,
    eof: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        ReaderSource {
            inner: Some(reader),
            eof: false,
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn has_bytes_available(&self) -> bool {
        !self.eof
    }

    fn read(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        let reader = match self.inner.as_mut() {
            Some(reader) if !self.eof => reader,
            _ => return Ok(Vec::new()),
        };

        let mut buf = vec![0u8; max];
        let (eof, len) = fill_buf(reader, &mut buf)?;
        buf.truncate(len);

        if eof {
            trace!("source exhausted");
            self.eof = true;
        }
        Ok(buf)
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.eof = true;
        self.inner = None;
        Ok(())
    }
}
