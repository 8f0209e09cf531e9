//! A reader decorator that tracks its position and can cap its length.

use std::io;
use std::io::prelude::*;

/// Wraps a reader with position tracking and an optional byte limit.
///
/// The archive codecs use the position to locate records and the limit to
/// fence an entry's payload off from whatever follows it.
pub struct CountingReader<R> {
    inner: R,
    position: u64,
    limit: Option<u64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            limit: None,
        }
    }

    /// Caps the reader at `limit` bytes from its current position.
    pub fn with_limit(inner: R, limit: u64) -> Self {
        Self {
            inner,
            position: 0,
            limit: Some(limit),
        }
    }

    /// Bytes read through this wrapper so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Discards the next `n` bytes, returning how many were actually
    /// skipped (fewer only at end of input).
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut remaining = n;
        let mut scratch = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                break;
            }
            remaining -= got as u64;
        }
        Ok(n - remaining)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = match self.limit {
            Some(limit) => {
                let left = limit.saturating_sub(self.position);
                buf.len().min(left as usize)
            }
            None => buf.len(),
        };
        if want == 0 {
            return Ok(0);
        }
        let got = self.inner.read(&mut buf[..want])?;
        self.position += got as u64;
        Ok(got)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_and_limits() {
        let data = b"0123456789";
        let mut reader = CountingReader::with_limit(&data[..], 4);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123");
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn skip_advances_position() {
        let data = b"0123456789";
        let mut reader = CountingReader::new(&data[..]);
        assert_eq!(reader.skip(6).unwrap(), 6);
        assert_eq!(reader.position(), 6);
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"6789");
        assert_eq!(reader.skip(5).unwrap(), 0);
    }
}
