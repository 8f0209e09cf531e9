//! Growable FIFO ring buffers for bytes and characters.
//!
//! `RingBytes` and `RingChars` are the same structure over different
//! element types: a contiguous array used circularly, with in-place
//! insert/delete anywhere in the logical content and bulk transfers to
//! and from streams. The archive readers, the blocking pipe, and the
//! rewritable file are all built on these.
//!
//! Storage wraps around the end of the array. Interior moves shift only
//! the necessary region; a move whose source or destination crosses the
//! wrap boundary decomposes into at most three contiguous copies.

use std::fmt;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::io;
use std::io::prelude::*;

use crate::result::*;

const MIN_CAPACITY: usize = 32;

/// The shared ring machinery. `T` is `u8` or `char`.
#[derive(Clone)]
struct RawRing<T> {
    buf: Vec<T>,
    offset: usize,
    len: usize,
}

impl<T: Copy + Default + PartialEq> RawRing<T> {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            offset: 0,
            len: 0,
        }
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![T::default(); capacity],
            offset: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Physical index of logical position `i`.
    fn phys(&self, i: usize) -> usize {
        (self.offset + i) % self.buf.len()
    }

    fn get(&self, i: usize) -> Result<T> {
        if i >= self.len {
            return Err(Error::Bounds(format!("index {i} of {}", self.len)));
        }
        Ok(self.buf[self.phys(i)])
    }

    /// Makes room for `extra` more elements.
    /// Growth doubles the capacity and compacts the content to offset 0.
    fn ensure(&mut self, extra: usize) {
        let needed = self.len + extra;
        if needed <= self.capacity() {
            return;
        }
        let new_cap = needed.max(self.capacity() * 2).max(MIN_CAPACITY);
        let mut new_buf = vec![T::default(); new_cap];
        for i in 0..self.len {
            new_buf[i] = self.buf[self.phys(i)];
        }
        self.buf = new_buf;
        self.offset = 0;
    }

    /// The physical spans covering logical `[start, start + n)`,
    /// as `(start, len)` pairs. The second span is empty unless the
    /// region crosses the wrap boundary.
    fn spans(&self, start: usize, n: usize) -> ((usize, usize), (usize, usize)) {
        if n == 0 {
            return ((0, 0), (0, 0));
        }
        let cap = self.capacity();
        let p = self.phys(start);
        let first = n.min(cap - p);
        ((p, first), (0, n - first))
    }

    /// Moves the `n`-element region at logical `src` to logical `dest`.
    ///
    /// Decomposes the move into chunks that are contiguous in both the
    /// source and the destination: with `src_len1 = min(n, cap - sp)` and
    /// `dest_len1 = min(n, cap - dp)`, the smaller of the two splits
    /// first, yielding at most three copies. Chunks are applied tail
    /// first when moving right so overlapping regions stay intact.
    fn move_region(&mut self, src: usize, dest: usize, n: usize) {
        if n == 0 || src == dest {
            return;
        }
        let cap = self.capacity();
        let sp = self.phys(src);
        let dp = self.phys(dest);
        let src_len1 = n.min(cap - sp);
        let dest_len1 = n.min(cap - dp);
        // (source physical, destination physical, length),
        // in ascending logical order of the region.
        let chunks: [(usize, usize, usize); 3] = if src_len1 < dest_len1 {
            [
                (sp, dp, src_len1),
                (0, dp + src_len1, dest_len1 - src_len1),
                (dest_len1 - src_len1, 0, n - dest_len1),
            ]
        } else {
            [
                (sp, dp, dest_len1),
                (sp + dest_len1, 0, src_len1 - dest_len1),
                (0, src_len1 - dest_len1, n - src_len1),
            ]
        };
        if dest > src {
            for &(s, d, l) in chunks.iter().rev() {
                if l > 0 {
                    self.buf.copy_within(s..s + l, d);
                }
            }
        } else {
            for &(s, d, l) in chunks.iter() {
                if l > 0 {
                    self.buf.copy_within(s..s + l, d);
                }
            }
        }
    }

    /// Writes `source[from..to]` at logical position `at`,
    /// which must already be within capacity.
    fn fill(&mut self, at: usize, source: &[T]) {
        let ((p1, n1), (p2, n2)) = self.spans(at, source.len());
        self.buf[p1..p1 + n1].copy_from_slice(&source[..n1]);
        self.buf[p2..p2 + n2].copy_from_slice(&source[n1..n1 + n2]);
    }

    fn zero(&mut self, at: usize, n: usize) {
        let ((p1, n1), (p2, n2)) = self.spans(at, n);
        self.buf[p1..p1 + n1].fill(T::default());
        self.buf[p2..p2 + n2].fill(T::default());
    }

    fn append(&mut self, source: &[T]) {
        self.ensure(source.len());
        self.fill(self.len, source);
        self.len += source.len();
    }

    fn insert(&mut self, at: usize, source: &[T], from: usize, to: usize) -> Result<()> {
        if at > self.len {
            return Err(Error::Bounds(format!("insert at {at} of {}", self.len)));
        }
        if from > to || to > source.len() {
            return Err(Error::Bounds(format!(
                "source range {from}..{to} of {}",
                source.len()
            )));
        }
        let count = to - from;
        if count == 0 {
            return Ok(());
        }
        self.ensure(count);
        self.move_region(at, at + count, self.len - at);
        self.fill(at, &source[from..to]);
        self.len += count;
        Ok(())
    }

    fn delete(&mut self, from: usize, to: usize, hard: bool) -> Result<()> {
        if from > to || to > self.len {
            return Err(Error::Bounds(format!(
                "delete range {from}..{to} of {}",
                self.len
            )));
        }
        let count = to - from;
        if count == 0 {
            return Ok(());
        }
        if from == 0 {
            // Cheap path: just advance the offset past the head.
            if hard {
                self.zero(0, count);
            }
            self.offset = self.phys(count);
        } else {
            self.move_region(to, from, self.len - to);
            if hard {
                self.zero(self.len - count, count);
            }
        }
        self.len -= count;
        Ok(())
    }

    fn copy_to(&self, from: usize, out: &mut [T], out_at: usize, n: usize) -> Result<()> {
        if from + n > self.len {
            return Err(Error::Bounds(format!(
                "copy range {from}..{} of {}",
                from + n,
                self.len
            )));
        }
        if out_at + n > out.len() {
            return Err(Error::Bounds(format!(
                "output range {out_at}..{} of {}",
                out_at + n,
                out.len()
            )));
        }
        let ((p1, n1), (p2, n2)) = self.spans(from, n);
        out[out_at..out_at + n1].copy_from_slice(&self.buf[p1..p1 + n1]);
        out[out_at + n1..out_at + n1 + n2].copy_from_slice(&self.buf[p2..p2 + n2]);
        Ok(())
    }

    fn clear(&mut self, hard: bool) {
        if hard {
            self.buf.fill(T::default());
        }
        self.offset = 0;
        self.len = 0;
    }

    fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(|i| self.buf[self.phys(i)])
    }
}

/// A growable circular byte buffer.
#[derive(Clone)]
pub struct RingBytes {
    inner: RawRing<u8>,
}

impl RingBytes {
    pub fn new() -> Self {
        Self {
            inner: RawRing::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RawRing::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn get(&self, index: usize) -> Result<u8> {
        self.inner.get(index)
    }

    pub fn push(&mut self, value: u8) {
        self.inner.append(&[value]);
    }

    pub fn append(&mut self, source: &[u8]) {
        self.inner.append(source);
    }

    pub fn append_range(&mut self, source: &[u8], from: usize, to: usize) -> Result<()> {
        let len = self.len();
        self.inner.insert(len, source, from, to)
    }

    pub fn append_ring(&mut self, other: &RingBytes) {
        self.inner.ensure(other.len());
        let ((p1, n1), (p2, n2)) = other.inner.spans(0, other.len());
        let at = self.inner.len;
        self.inner.fill(at, &other.inner.buf[p1..p1 + n1]);
        self.inner.fill(at + n1, &other.inner.buf[p2..p2 + n2]);
        self.inner.len += other.len();
    }

    pub fn insert(&mut self, at: usize, source: &[u8], from: usize, to: usize) -> Result<()> {
        self.inner.insert(at, source, from, to)
    }

    /// Removes `[from, to)`. `hard` also zeroes the vacated storage,
    /// for content that shouldn't linger in memory.
    pub fn delete(&mut self, from: usize, to: usize, hard: bool) -> Result<()> {
        self.inner.delete(from, to, hard)
    }

    /// Pulls up to `max` bytes from `reader` onto the tail.
    ///
    /// Issues at most two reads (the free space may wrap) and stops early
    /// on a short read. Returns `None` if the reader reports end of input
    /// on the very first read, `Some(count)` otherwise.
    pub fn append_from<R: Read>(&mut self, reader: &mut R, max: usize) -> io::Result<Option<usize>> {
        if max == 0 {
            return Ok(Some(0));
        }
        self.inner.ensure(max);
        let cap = self.inner.capacity();
        let tail = self.inner.phys(self.inner.len);
        let first = max.min(cap - tail);
        let n1 = reader.read(&mut self.inner.buf[tail..tail + first])?;
        if n1 == 0 {
            return Ok(None);
        }
        self.inner.len += n1;
        if n1 < first || first == max {
            return Ok(Some(n1));
        }
        let n2 = reader.read(&mut self.inner.buf[..max - first])?;
        self.inner.len += n2;
        Ok(Some(n1 + n2))
    }

    /// Writes `[offset, offset + len)` to `writer` as at most two slices.
    pub fn write_to<W: Write>(&self, writer: &mut W, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.len() {
            return Err(Error::Bounds(format!(
                "write range {offset}..{} of {}",
                offset + len,
                self.len()
            )));
        }
        let ((p1, n1), (p2, n2)) = self.inner.spans(offset, len);
        writer.write_all(&self.inner.buf[p1..p1 + n1])?;
        writer.write_all(&self.inner.buf[p2..p2 + n2])?;
        Ok(())
    }

    pub fn copy_to(&self, from: usize, out: &mut [u8], out_at: usize, len: usize) -> Result<()> {
        self.inner.copy_to(from, out, out_at, len)
    }

    pub fn clear(&mut self, hard: bool) {
        self.inner.clear(hard);
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.iter().collect()
    }
}

impl Default for RingBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RingBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingBytes[len {} cap {}]", self.len(), self.capacity())
    }
}

impl PartialEq for RingBytes {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.inner.iter().eq(other.inner.iter())
    }
}

impl Eq for RingBytes {}

impl Hash for RingBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.inner.iter() {
            b.hash(state);
        }
    }
}

/// A source of characters, the char-side analogue of [`io::Read`].
pub trait CharSource {
    /// Reads into `out`, returning the count; 0 means end of input.
    fn read_chars(&mut self, out: &mut [char]) -> io::Result<usize>;
}

impl CharSource for std::str::Chars<'_> {
    fn read_chars(&mut self, out: &mut [char]) -> io::Result<usize> {
        let mut n = 0;
        while n < out.len() {
            match self.next() {
                Some(c) => {
                    out[n] = c;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

/// A growable circular character buffer.
#[derive(Clone)]
pub struct RingChars {
    inner: RawRing<char>,
}

impl RingChars {
    pub fn new() -> Self {
        Self {
            inner: RawRing::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RawRing::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn get(&self, index: usize) -> Result<char> {
        self.inner.get(index)
    }

    pub fn push(&mut self, value: char) {
        self.inner.append(&[value]);
    }

    pub fn append(&mut self, source: &[char]) {
        self.inner.append(source);
    }

    pub fn append_str(&mut self, source: &str) {
        for c in source.chars() {
            self.inner.append(&[c]);
        }
    }

    pub fn append_range(&mut self, source: &[char], from: usize, to: usize) -> Result<()> {
        let len = self.len();
        self.inner.insert(len, source, from, to)
    }

    pub fn append_ring(&mut self, other: &RingChars) {
        self.inner.ensure(other.len());
        let ((p1, n1), (p2, n2)) = other.inner.spans(0, other.len());
        let at = self.inner.len;
        self.inner.fill(at, &other.inner.buf[p1..p1 + n1]);
        self.inner.fill(at + n1, &other.inner.buf[p2..p2 + n2]);
        self.inner.len += other.len();
    }

    pub fn insert(&mut self, at: usize, source: &[char], from: usize, to: usize) -> Result<()> {
        self.inner.insert(at, source, from, to)
    }

    pub fn delete(&mut self, from: usize, to: usize, hard: bool) -> Result<()> {
        self.inner.delete(from, to, hard)
    }

    /// Pulls up to `max` characters from `source` onto the tail;
    /// the contract matches [`RingBytes::append_from`].
    pub fn append_from<S: CharSource>(
        &mut self,
        source: &mut S,
        max: usize,
    ) -> io::Result<Option<usize>> {
        if max == 0 {
            return Ok(Some(0));
        }
        self.inner.ensure(max);
        let cap = self.inner.capacity();
        let tail = self.inner.phys(self.inner.len);
        let first = max.min(cap - tail);
        let n1 = source.read_chars(&mut self.inner.buf[tail..tail + first])?;
        if n1 == 0 {
            return Ok(None);
        }
        self.inner.len += n1;
        if n1 < first || first == max {
            return Ok(Some(n1));
        }
        let n2 = source.read_chars(&mut self.inner.buf[..max - first])?;
        self.inner.len += n2;
        Ok(Some(n1 + n2))
    }

    /// Writes `[offset, offset + len)` to `out` as at most two slices.
    pub fn write_to<W: fmt::Write>(&self, out: &mut W, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.len() {
            return Err(Error::Bounds(format!(
                "write range {offset}..{} of {}",
                offset + len,
                self.len()
            )));
        }
        let ((p1, n1), (p2, n2)) = self.inner.spans(offset, len);
        for &c in &self.inner.buf[p1..p1 + n1] {
            out.write_char(c).map_err(|_| {
                Error::Io(io::Error::new(io::ErrorKind::Other, "formatter error"))
            })?;
        }
        for &c in &self.inner.buf[p2..p2 + n2] {
            out.write_char(c).map_err(|_| {
                Error::Io(io::Error::new(io::ErrorKind::Other, "formatter error"))
            })?;
        }
        Ok(())
    }

    pub fn copy_to(&self, from: usize, out: &mut [char], out_at: usize, len: usize) -> Result<()> {
        self.inner.copy_to(from, out, out_at, len)
    }

    pub fn clear(&mut self, hard: bool) {
        self.inner.clear(hard);
    }
}

impl Default for RingChars {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RingChars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingChars[len {} cap {}]", self.len(), self.capacity())
    }
}

impl fmt::Display for RingChars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.inner.iter() {
            f.write_char(c)?;
        }
        Ok(())
    }
}

impl PartialEq for RingChars {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.inner.iter().eq(other.inner.iter())
    }
}

impl Eq for RingChars {}

impl Hash for RingChars {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.inner.iter() {
            c.hash(state);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// A ring of the exact capacity `cap`, rotated so its content starts
    /// at physical index `offset`.
    fn rotated(cap: usize, offset: usize, content: &[u8]) -> RingBytes {
        assert!(content.len() <= cap);
        let mut ring = RingBytes::with_capacity(cap);
        ring.append(&vec![0u8; offset]);
        ring.delete(0, offset, false).unwrap();
        ring.append(content);
        assert_eq!(ring.capacity(), cap, "setup must not grow");
        ring
    }

    #[test]
    fn append_and_copy_out_round_trips() {
        let data: Vec<u8> = (0..100).collect();
        let mut ring = RingBytes::new();
        ring.append(&data);
        let mut out = vec![0u8; data.len()];
        ring.copy_to(0, &mut out, 0, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn get_out_of_range_fails() {
        let mut ring = RingBytes::new();
        ring.append(b"abc");
        assert_eq!(ring.get(2).unwrap(), b'c');
        assert!(ring.get(3).is_err());
    }

    #[test]
    fn every_wrap_combination_matches_a_linear_model() {
        // Exhaustively exercise inserts and deletes at every rotation of a
        // small fixed-capacity ring, so moves cross the wrap boundary in
        // every combination of (source wraps, destination wraps).
        let cap = 8;
        for offset in 0..cap {
            for len in 0..=cap - 2 {
                let content: Vec<u8> = (10..10 + len as u8).collect();
                for at in 0..=len {
                    let mut ring = rotated(cap, offset, &content);
                    let mut model = content.clone();
                    ring.insert(at, b"xy", 0, 2).unwrap();
                    model.splice(at..at, *b"xy");
                    assert_eq!(ring.to_vec(), model, "insert at {at}, offset {offset}");
                }
                for from in 0..=len {
                    for to in from..=len {
                        let mut ring = rotated(cap, offset, &content);
                        let mut model = content.clone();
                        ring.delete(from, to, false).unwrap();
                        model.drain(from..to);
                        assert_eq!(
                            ring.to_vec(),
                            model,
                            "delete {from}..{to}, offset {offset}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn random_op_sequence_matches_a_vec() {
        // A fixed pseudo-random walk of inserts and deletes,
        // compared element for element against a contiguous buffer.
        let mut ring = RingBytes::new();
        let mut model: Vec<u8> = Vec::new();
        let mut seed = 0x2545f491u32;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        for step in 0..500 {
            let r = next();
            if r % 3 != 0 || model.is_empty() {
                let at = (r as usize / 4) % (model.len() + 1);
                let chunk = [step as u8, r as u8, (r >> 8) as u8];
                let count = (r as usize / 7) % 4;
                ring.insert(at, &chunk, 0, count).unwrap();
                model.splice(at..at, chunk[..count].iter().copied());
            } else {
                let from = (r as usize / 4) % model.len();
                let to = from + (r as usize / 9) % (model.len() - from + 1);
                ring.delete(from, to, r % 2 == 0).unwrap();
                model.drain(from..to);
            }
            assert_eq!(ring.to_vec(), model, "step {step}");
        }
    }

    #[test]
    fn append_from_contract() {
        let data = [7u8; 10];
        let mut reader: &[u8] = &data;
        let mut ring = RingBytes::with_capacity(4);
        // Partial pulls succeed with a count no larger than max.
        assert_eq!(ring.append_from(&mut reader, 6).unwrap(), Some(6));
        assert_eq!(ring.append_from(&mut reader, 6).unwrap(), Some(4));
        // The first read that finds nothing reports end of input.
        assert_eq!(ring.append_from(&mut reader, 6).unwrap(), None);
        assert_eq!(ring.len(), 10);
    }

    #[test]
    fn append_from_wraps_with_two_reads() {
        let mut ring = rotated(8, 4, b"ab");
        let mut reader: &[u8] = b"1234";
        // The tail hits the end of the array after two bytes,
        // so the fill is split into two reads.
        assert_eq!(ring.append_from(&mut reader, 4).unwrap(), Some(4));
        assert_eq!(ring.to_vec(), b"ab1234");
        assert_eq!(ring.capacity(), 8);
    }

    #[test]
    fn hard_delete_zeroes_storage() {
        let mut ring = RingBytes::with_capacity(8);
        ring.append(b"secret!!");
        ring.delete(0, 8, true).unwrap();
        assert_eq!(ring.len(), 0);
        assert!(ring.inner.buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn growth_compacts_to_offset_zero() {
        let mut ring = rotated(8, 5, b"abcdef");
        ring.append(b"ghijk");
        assert_eq!(ring.inner.offset, 0);
        assert_eq!(ring.to_vec(), b"abcdefghijk");
        assert!(ring.capacity() >= 16);
    }

    #[test]
    fn equality_ignores_rotation() {
        let a = rotated(8, 0, b"hello");
        let b = rotated(8, 5, b"hello");
        assert_eq!(a, b);
        let c = rotated(8, 2, b"hellp");
        assert_ne!(a, c);
    }

    #[test]
    fn chars_round_trip_and_display() {
        let mut ring = RingChars::new();
        ring.append_str("héllo wörld");
        assert_eq!(ring.to_string(), "héllo wörld");
        ring.delete(0, 6, false).unwrap();
        assert_eq!(ring.to_string(), "wörld");
        let mut chars = "!?".chars();
        assert_eq!(ring.append_from(&mut chars, 8).unwrap(), Some(2));
        assert_eq!(ring.to_string(), "wörld!?");
        assert_eq!(ring.append_from(&mut chars, 8).unwrap(), None);
    }

    #[test]
    fn write_to_emits_both_slices() {
        let ring = rotated(8, 6, b"abcdef");
        let mut out = Vec::new();
        ring.write_to(&mut out, 1, 4).unwrap();
        assert_eq!(out, b"bcde");
    }
}
