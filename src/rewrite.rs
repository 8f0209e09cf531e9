//! In-place file rewriting: a sequential reader and a random-access
//! writer over the same file, safely interleaved.
//!
//! The writer may only sit at or behind the reader, so every byte it
//! lands on disk has already been consumed. Written bytes that would
//! overtake the reader wait in a ring buffer and flush opportunistically
//! as the reader advances.

use std::fs::{File, OpenOptions};
use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;

use camino::Utf8Path;

use crate::result::*;
use crate::ring::RingBytes;

/// What to do with the unread tail when the rewrite ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Flush buffered bytes and cut the file off at the write position;
    /// whatever the reader never consumed is discarded.
    Truncate,
    /// Drain the rest of the reader into the buffer first, so the
    /// unconsumed tail survives, shifted down to follow the written bytes.
    Transfer,
}

/// A file opened for simultaneous sequential reading and in-place
/// rewriting.
pub struct RewritableFile {
    reader: File,
    writer: File,
    reader_pos: u64,
    write_pos: Option<u64>,
    buffer: RingBytes,
    max_unit: u64,
    closed: bool,
}

impl RewritableFile {
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        Self::open_with_unit(path, 1)
    }

    /// `max_unit` is the largest encoded size of one element written
    /// through this file: 1 for raw bytes, 4 for UTF-8 text.
    pub(crate) fn open_with_unit<P: AsRef<Utf8Path>>(path: P, max_unit: u64) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InvalidPath(path.to_string()));
        }
        let reader = File::open(path)?;
        let writer = OpenOptions::new().write(true).open(path)?;
        Ok(Self {
            reader,
            writer,
            reader_pos: 0,
            write_pos: None,
            buffer: RingBytes::new(),
            max_unit,
            closed: false,
        })
    }

    /// Bytes handed out by the sequential reader so far.
    pub fn reader_position(&self) -> u64 {
        self.reader_pos
    }

    /// Disk position the next flushed byte lands at, if a writer is open.
    pub fn writer_position(&self) -> Option<u64> {
        self.write_pos
    }

    /// Bytes written but not yet flushed to disk.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(out)?;
        self.reader_pos += n as u64;
        self.flush_behind_reader()?;
        Ok(n)
    }

    /// Starts rewriting at byte `position`, which must not be past the
    /// reader.
    pub fn open_writer(&mut self, position: u64) -> Result<()> {
        if self.write_pos.is_some() {
            return Err(Error::Unsupported("writer already open"));
        }
        if position > self.reader_pos {
            return Err(Error::Bounds(format!(
                "write position {position} past reader at {}",
                self.reader_pos
            )));
        }
        self.writer.seek(SeekFrom::Start(position))?;
        self.write_pos = Some(position);
        Ok(())
    }

    /// Queues bytes for the rewrite; they reach disk once the reader has
    /// moved safely past them (or at close).
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.write_pos.is_none() {
            return Err(Error::Unsupported("writer not open"));
        }
        self.buffer.append(data);
        self.flush_behind_reader()?;
        Ok(())
    }

    /// Flushes as much of the buffer as fits strictly behind the reader.
    /// Only runs once the gap exceeds one encoding unit.
    fn flush_behind_reader(&mut self) -> io::Result<()> {
        let Some(pos) = self.write_pos else {
            return Ok(());
        };
        if self.reader_pos - pos <= self.max_unit {
            return Ok(());
        }
        let n = (self.buffer.len() as u64).min(self.reader_pos - pos) as usize;
        self.flush_exactly(n)
    }

    fn flush_exactly(&mut self, n: usize) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        let pos = self.write_pos.expect("flush without writer");
        self.buffer
            .write_to(&mut self.writer, 0, n)
            .map_err(|e| match e {
                Error::Io(io) => io,
                other => io::Error::new(io::ErrorKind::Other, other.to_string()),
            })?;
        self.buffer.delete(0, n, false).expect("flush length");
        self.write_pos = Some(pos + n as u64);
        Ok(())
    }

    /// Ends the rewrite. See [`CloseMode`].
    pub fn close(&mut self, mode: CloseMode) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.write_pos.is_none() {
            return Ok(());
        }
        if mode == CloseMode::Transfer {
            // Pull the unread tail behind the written bytes.
            let mut scratch = [0u8; 8192];
            loop {
                let n = self.reader.read(&mut scratch)?;
                if n == 0 {
                    break;
                }
                self.reader_pos += n as u64;
                self.buffer.append(&scratch[..n]);
            }
        }
        let n = self.buffer.len();
        self.flush_exactly(n)?;
        let end = self.write_pos.expect("writer was open");
        self.writer.set_len(end)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for RewritableFile {
    fn drop(&mut self) {
        let _ = self.close(CloseMode::Truncate);
    }
}

const UTF8_MAX_BYTES_PER_CHAR: usize = 4;
const UTF8_AVG_BYTES_PER_CHAR: usize = 1;

/// The number of characters in the longest prefix of `s` whose UTF-8
/// encoding fits in `budget` bytes, with the byte length of that prefix.
///
/// Binary search bracketed by `budget / max_bytes_per_char` below and
/// `budget / avg_bytes_per_char` above, one encode probe per step.
pub fn encoded_prefix(s: &str, budget: usize) -> (usize, usize) {
    let total = s.chars().count();
    let byte_len = |chars: usize| -> usize { s.chars().take(chars).map(char::len_utf8).sum() };
    let mut lo = (budget / UTF8_MAX_BYTES_PER_CHAR).min(total);
    let mut hi = (budget.div_ceil(UTF8_AVG_BYTES_PER_CHAR)).min(total);
    if byte_len(hi) <= budget {
        return (hi, byte_len(hi));
    }
    // Invariant: byte_len(lo) <= budget < byte_len(hi).
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if byte_len(mid) <= budget {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo, byte_len(lo))
}

/// UTF-8 text over a [`RewritableFile`].
///
/// Reads decode incrementally (multi-byte sequences may straddle read
/// boundaries); writes encode through the byte machinery, split so flush
/// boundaries land between characters.
pub struct RewritableTextFile {
    inner: RewritableFile,
    carry: Vec<u8>,
}

impl RewritableTextFile {
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        Ok(Self {
            inner: RewritableFile::open_with_unit(path, UTF8_MAX_BYTES_PER_CHAR as u64)?,
            carry: Vec::new(),
        })
    }

    pub fn reader_position(&self) -> u64 {
        self.inner.reader_position()
    }

    pub fn writer_position(&self) -> Option<u64> {
        self.inner.writer_position()
    }

    pub fn open_writer(&mut self, position: u64) -> Result<()> {
        self.inner.open_writer(position)
    }

    /// Decodes up to `out.len()` characters from the reader.
    /// Returns 0 at end of input.
    pub fn read_chars(&mut self, out: &mut [char]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            // Serve whole characters already carried before reading more.
            let valid_up_to = match std::str::from_utf8(&self.carry) {
                Ok(_) => self.carry.len(),
                Err(e) => {
                    if e.error_len().is_some() {
                        return Err(Error::Format("invalid UTF-8 in text file".into()));
                    }
                    e.valid_up_to()
                }
            };
            if valid_up_to > 0 {
                let valid = std::str::from_utf8(&self.carry[..valid_up_to]).unwrap();
                let mut produced = 0;
                let mut consumed_bytes = 0;
                for c in valid.chars() {
                    if produced == out.len() {
                        break;
                    }
                    out[produced] = c;
                    produced += 1;
                    consumed_bytes += c.len_utf8();
                }
                self.carry.drain(..consumed_bytes);
                return Ok(produced);
            }
            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                if !self.carry.is_empty() {
                    return Err(Error::Format("truncated UTF-8 sequence at end".into()));
                }
                return Ok(0);
            }
            self.carry.extend_from_slice(&chunk[..n]);
        }
    }

    /// Queues text for the rewrite, chunked on character boundaries so
    /// each flush window holds whole characters.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        let mut rest = text;
        while !rest.is_empty() {
            let gap = match self.inner.writer_position() {
                Some(pos) => (self.inner.reader_position() - pos) as usize,
                None => return Err(Error::Unsupported("writer not open")),
            };
            let (chars, bytes) = encoded_prefix(rest, gap.max(UTF8_MAX_BYTES_PER_CHAR));
            if chars == 0 || bytes == 0 {
                // Nothing fits the window; buffer the remainder whole.
                self.inner.write(rest.as_bytes())?;
                break;
            }
            self.inner.write(&rest.as_bytes()[..bytes])?;
            rest = &rest[bytes..];
        }
        Ok(())
    }

    pub fn close(&mut self, mode: CloseMode) -> Result<()> {
        if mode == CloseMode::Transfer
            && !self.carry.is_empty()
            && self.inner.writer_position().is_some()
        {
            // Bytes decoded ahead of the caller logically precede the
            // unread tail; hand them back before the drain.
            let carried = std::mem::take(&mut self.carry);
            self.inner.write(&carried)?;
        }
        self.inner.close(mode)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefix_search_respects_budget() {
        let s = "aé漢x"; // 1 + 2 + 3 + 1 bytes
        assert_eq!(encoded_prefix(s, 0), (0, 0));
        assert_eq!(encoded_prefix(s, 1), (1, 1));
        assert_eq!(encoded_prefix(s, 2), (1, 1));
        assert_eq!(encoded_prefix(s, 3), (2, 3));
        assert_eq!(encoded_prefix(s, 5), (2, 3));
        assert_eq!(encoded_prefix(s, 6), (3, 6));
        assert_eq!(encoded_prefix(s, 7), (4, 7));
        assert_eq!(encoded_prefix(s, 100), (4, 7));
    }

    #[test]
    fn prefix_search_on_ascii() {
        let s = "abcdefgh";
        for budget in 0..10 {
            let (chars, bytes) = encoded_prefix(s, budget);
            assert_eq!(chars, budget.min(8));
            assert_eq!(bytes, budget.min(8));
        }
    }
}
