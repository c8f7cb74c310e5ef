use std::cmp;
use std::io::Read;

// Compact once 64Kb of consumed bytes sit in front of the cursor
pub const COMPACT_THRESHOLD: usize = 64 * 1024;

/// Fill `buf` from `data` until it is full or the reader hits EoF.
///
/// Returns `(eof, bytes_read)`.
pub fn fill_buf<R: Read>(data: &mut R, buf: &mut [u8]) -> std::io::Result<(bool, usize)> {
    let mut buf_read = 0;

    while buf_read < buf.len() {
        match data.read(&mut buf[buf_read..]) {
            Ok(0) => return Ok((true, buf_read)),
            Ok(x) => buf_read += x,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
    }
    Ok((false, buf_read))
}

pub fn flush_buf(in_buf: &mut Vec<u8>, buf: &mut [u8]) -> usize {
    // 1. Grab slice [0...min(buf.len(), in_buf.len()))
    let split_at = cmp::min(in_buf.len(), buf.len());
    // 2. Copy into buf
    buf[..split_at].clone_from_slice(&in_buf[..split_at]);
    // 3. Drop range from &mut in_buf
    in_buf.drain(..split_at);

    split_at
}

/// Append-only byte buffer with a consumed cursor.
///
/// Bytes in front of the cursor are logically gone but stay in memory until
/// [`AccretingBuffer::compact`] copies the unconsumed tail into a fresh buffer.
pub struct AccretingBuffer {
    data: Vec<u8>,
    cursor: usize,
    threshold: usize,
}

impl AccretingBuffer {
    pub fn new() -> Self {
        AccretingBuffer::with_threshold(COMPACT_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        AccretingBuffer {
            data: Vec::new(),
            cursor: 0,
            threshold,
        }
    }

    pub fn append(&mut self, input: &[u8]) {
        if !input.is_empty() {
            self.data.extend_from_slice(input);
        }
    }

    /// Everything from the cursor onward
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn consume(&mut self, len: usize) {
        self.cursor = cmp::min(self.cursor + len, self.data.len());
    }

    /// Drops everything buffered and hands back the unconsumed tail.
    pub fn take(&mut self) -> Vec<u8> {
        let tail = self.data.split_off(self.cursor);
        self.data.clear();
        self.cursor = 0;
        tail
    }

    /// Returns true if a compaction happened.
    pub fn compact(&mut self) -> bool {
        if self.cursor <= self.threshold {
            return false;
        }

        self.data = self.data[self.cursor..].to_vec();
        self.cursor = 0;
        true
    }
}

impl Default for AccretingBuffer {
    fn default() -> Self {
        AccretingBuffer::new()
    }
}



#[cfg(test)]
mod test_accreting_buffer {
    use super::*;

    #[test]
    fn consume_moves_cursor() {
        let mut buf = AccretingBuffer::new();
        buf.append(&[1, 2, 3, 4]);
        buf.consume(3);

        assert_eq!(buf.unconsumed(), &[4]);
        assert_eq!(buf.cursor(), 3);
    }

    #[test]
    fn consume_never_passes_end() {
        let mut buf = AccretingBuffer::new();
        buf.append(&[1, 2]);
        buf.consume(10);

        assert!(buf.is_empty());
        assert_eq!(buf.cursor(), 2);
    }

    #[test]
    fn compact_below_threshold_is_noop() {
        let mut buf = AccretingBuffer::with_threshold(4);
        buf.append(&[1, 2, 3, 4, 5]);
        buf.consume(4);

        assert!(!buf.compact());
        assert_eq!(buf.cursor(), 4);
        assert_eq!(buf.unconsumed(), &[5]);
    }

    #[test]
    fn compact_keeps_tail() {
        let mut buf = AccretingBuffer::with_threshold(2);
        buf.append(&[1, 2, 3, 4, 5]);
        buf.consume(3);

        assert!(buf.compact());
        assert_eq!(buf.cursor(), 0);
        assert_eq!(buf.unconsumed(), &[4, 5]);
    }

    #[test]
    fn take_empties_buffer() {
        let mut buf = AccretingBuffer::new();
        buf.append(&[1, 2, 3]);
        buf.consume(1);

        assert_eq!(buf.take(), vec![2, 3]);
        assert!(buf.is_empty());
        assert_eq!(buf.cursor(), 0);
    }
}
