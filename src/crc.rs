//! A reader that checks a CRC32 as content flows through it.

use std::io;
use std::io::prelude::*;

use crc32fast::Hasher;

/// Validates the running CRC32 against an expected value once the inner
/// reader is exhausted. An expectation of 0 means "unknown" and disables
/// the check (ZIP entries written with deferred sizes carry no usable
/// CRC in their local header).
pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    expected: u32,
}

impl<R> Crc32Reader<R> {
    pub fn new(inner: R, expected: u32) -> Crc32Reader<R> {
        Crc32Reader {
            inner,
            hasher: Hasher::new(),
            expected,
        }
    }

    fn matches(&self) -> bool {
        self.expected == 0 || self.expected == self.hasher.clone().finalize()
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() && !self.matches() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "checksum mismatch",
                ))
            }
            Ok(n) => n,
            Err(e) => return Err(e),
        };
        self.hasher.update(&buf[0..count]);
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_matching_content() {
        let data: &[u8] = b"1234";
        let mut reader = Crc32Reader::new(data, 0x9be3e0a3);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"1234");
    }

    #[test]
    fn rejects_corrupt_content_at_the_end() {
        let data: &[u8] = b"1235";
        let mut reader = Crc32Reader::new(data, 0x9be3e0a3);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn zero_expectation_disables_the_check() {
        let data: &[u8] = b"whatever";
        let mut reader = Crc32Reader::new(data, 0);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"whatever");
    }
}
