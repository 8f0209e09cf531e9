//! The ZIP codec.
//!
//! Most comments quote the ZIP spec, [`APPNOTE.TXT`].
//!
//! A ZIP archive's table of contents (the central directory) sits at the
//! back of the file, located by the End of central directory record
//! behind it. When the archive's length is known we scan a window at the
//! tail for that record and decode the whole directory without touching
//! entry data. When it isn't (streaming URLs), we walk the local file
//! headers from the front instead, and if even that is impossible —
//! entries written with deferred sizes — we inflate everything once to
//! find the record boundaries.
//!
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT

use std::convert::TryInto;
use std::io;
use std::io::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDate;
use flate2::bufread;
use flate2::read::DeflateDecoder;
use log::*;
use memchr::memmem;

use crate::arch::usize;
use crate::backing::{is_canceled, FileBacking, LENGTH_UNKNOWN};
use crate::counting::CountingReader;
use crate::crc::Crc32Reader;
use crate::entry::ArchiveEntry;
use crate::format::{latin1, rewrite_archive_url, ArchiveFormat};
use crate::result::*;

// Magic numbers denoting the sections of a ZIP archive

/// End of central directory magic number
const EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 5, 6];
/// Central directory magic number
const CENTRAL_DIRECTORY_MAGIC: [u8; 4] = [b'P', b'K', 1, 2];
/// Local file header magic number
const LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];
/// Data descriptor magic number (optional on the wire)
const DATA_DESCRIPTOR_MAGIC: [u8; 4] = [b'P', b'K', 7, 8];

/// Size of the tail window scanned for the EOCDR.
const TAIL_WINDOW: usize = 64 * 1024;
/// A central directory record is at least this long.
const CENTRAL_RECORD_MIN: u64 = 46;

/// Bit 11: Language encoding flag (EFS). If this bit is set, the
/// filename and comment fields for this file MUST be encoded using UTF-8.
const FLAG_UTF8: u16 = 1 << 11;
/// Bit 3: sizes and CRC were not known when the header was written;
/// a data descriptor follows the compressed data.
const FLAG_DESCRIPTOR: u16 = 1 << 3;

// Straight from the Rust docs:

/// Reads a little-endian u32 from the front of the provided slice, shrinking it.
fn read_u32(input: &mut &[u8]) -> u32 {
    let (int_bytes, rest) = input.split_at(std::mem::size_of::<u32>());
    *input = rest;
    u32::from_le_bytes(int_bytes.try_into().expect("less than four bytes for u32"))
}

/// Reads a little-endian u16 from the front of the provided slice, shrinking it.
fn read_u16(input: &mut &[u8]) -> u16 {
    let (int_bytes, rest) = input.split_at(std::mem::size_of::<u16>());
    *input = rest;
    u16::from_le_bytes(int_bytes.try_into().expect("less than two bytes for u16"))
}

/// Expands an MS-DOS date/time pair to milliseconds since the epoch.
///
/// Bits 0-4 are seconds/2, 5-10 minutes, 11-15 hours;
/// date bits 0-4 are the day, 5-8 the month, 9-15 years since 1980.
/// The extended 64-bit form carries 0-999 extra milliseconds in its high
/// half; the wire format has none, so decoders pass 0.
fn dos_datetime_millis(time: u16, date: u16, extra_millis: u64) -> u64 {
    let seconds = (time & 0x1F) as u32 * 2;
    let minutes = ((time >> 5) & 0x3F) as u32;
    let hours = ((time >> 11) & 0x1F) as u32;
    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let base = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hours, minutes, seconds))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0);
    if base <= 0 {
        return 0;
    }
    base as u64 + extra_millis.min(999)
}

/// Data from the End of central directory record
#[derive(Debug)]
struct EndOfCentralDirectory {
    disk_number: u16,
    disk_with_central_directory: u16,
    entries: u16,
    central_directory_size: u32,
    central_directory_offset: u32,
}

impl EndOfCentralDirectory {
    fn parse(mut eocdr: &[u8]) -> Result<Self> {
        // 4.3.16  End of central directory record:
        //
        // end of central dir signature    4 bytes  (0x06054b50)
        // number of this disk             2 bytes
        // number of the disk with the
        // start of the central directory  2 bytes
        // total number of entries in
        // the central dir on this disk    2 bytes
        // total number of entries in
        // the central dir                 2 bytes
        // size of the central directory   4 bytes
        // offset of start of central
        // directory with respect to
        // the starting disk number        4 bytes
        // zipfile comment length          2 bytes
        if eocdr.len() < 22 {
            return Err(Error::Format(
                "truncated End Of Central Directory Record".into(),
            ));
        }
        // The search found the magic; anything else is a logic error.
        assert_eq!(eocdr[..4], EOCDR_MAGIC);
        eocdr = &eocdr[4..];
        let disk_number = read_u16(&mut eocdr);
        let disk_with_central_directory = read_u16(&mut eocdr);
        let _entries_on_this_disk = read_u16(&mut eocdr);
        let entries = read_u16(&mut eocdr);
        let central_directory_size = read_u32(&mut eocdr);
        let central_directory_offset = read_u32(&mut eocdr);

        Ok(Self {
            disk_number,
            disk_with_central_directory,
            entries,
            central_directory_size,
            central_directory_offset,
        })
    }
}

/// Data from a central directory record: one file or folder in the
/// archive.
#[derive(Debug)]
struct CentralRecord<'a> {
    flags: u16,
    last_modified_time: u16,
    last_modified_date: u16,
    uncompressed_size: u32,
    disk_number: u16,
    header_offset: u32,
    name: &'a [u8],
}

impl<'a> CentralRecord<'a> {
    fn parse_and_consume(record: &mut &'a [u8], index: usize) -> Result<Self> {
        // 4.3.12  Central directory structure:
        //
        //   central file header signature   4 bytes  (0x02014b50)
        //   version made by                 2 bytes
        //   version needed to extract       2 bytes
        //   general purpose bit flag        2 bytes
        //   compression method              2 bytes
        //   last mod file time              2 bytes
        //   last mod file date              2 bytes
        //   crc-32                          4 bytes
        //   compressed size                 4 bytes
        //   uncompressed size               4 bytes
        //   file name length                2 bytes
        //   extra field length              2 bytes
        //   file comment length             2 bytes
        //   disk number start               2 bytes
        //   internal file attributes        2 bytes
        //   external file attributes        4 bytes
        //   relative offset of local header 4 bytes
        //
        //   file name / extra field / file comment (variable size)
        if record.len() < CENTRAL_RECORD_MIN as usize {
            return Err(Error::Format(format!(
                "central directory truncated at entry {index}"
            )));
        }
        if record[..4] != CENTRAL_DIRECTORY_MAGIC {
            return Err(Error::Format(format!(
                "bad central directory signature at entry {index}"
            )));
        }
        *record = &record[4..];
        let _source_version = read_u16(record);
        let _minimum_extract_version = read_u16(record);
        let flags = read_u16(record);
        let _compression_method = read_u16(record);
        let last_modified_time = read_u16(record);
        let last_modified_date = read_u16(record);
        let _crc32 = read_u32(record);
        let _compressed_size = read_u32(record);
        let uncompressed_size = read_u32(record);
        let name_length = usize(read_u16(record))?;
        let extra_length = usize(read_u16(record))?;
        let comment_length = usize(read_u16(record))?;
        let disk_number = read_u16(record);
        let _internal_attributes = read_u16(record);
        let _external_attributes = read_u32(record);
        let header_offset = read_u32(record);
        if record.len() < name_length + extra_length + comment_length {
            return Err(Error::Format(format!(
                "central directory truncated at entry {index}"
            )));
        }
        let (name, remaining) = record.split_at(name_length);
        let remaining = &remaining[extra_length + comment_length..];
        *record = remaining;

        Ok(Self {
            flags,
            last_modified_time,
            last_modified_date,
            uncompressed_size,
            disk_number,
            header_offset,
            name,
        })
    }
}

/// The fixed fields of a local file header, minus the signature.
#[derive(Debug)]
struct LocalHeader {
    flags: u16,
    compression_method: u16,
    last_modified_time: u16,
    last_modified_date: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    name_length: usize,
    extra_length: usize,
}

impl LocalHeader {
    /// Parses the 26 bytes that follow the signature.
    //
    // 4.3.7  Local file header:
    //
    // local file header signature     4 bytes  (0x04034b50)
    // version needed to extract       2 bytes
    // general purpose bit flag        2 bytes
    // compression method              2 bytes
    // last mod file time              2 bytes
    // last mod file date              2 bytes
    // crc-32                          4 bytes
    // compressed size                 4 bytes
    // uncompressed size               4 bytes
    // file name length                2 bytes
    // extra field length              2 bytes
    fn parse(mut fixed: &[u8]) -> Result<Self> {
        debug_assert_eq!(fixed.len(), 26);
        let _minimum_extract_version = read_u16(&mut fixed);
        let flags = read_u16(&mut fixed);
        let compression_method = read_u16(&mut fixed);
        let last_modified_time = read_u16(&mut fixed);
        let last_modified_date = read_u16(&mut fixed);
        let crc32 = read_u32(&mut fixed);
        let compressed_size = read_u32(&mut fixed);
        let uncompressed_size = read_u32(&mut fixed);
        let name_length = usize(read_u16(&mut fixed))?;
        let extra_length = usize(read_u16(&mut fixed))?;
        Ok(Self {
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name_length,
            extra_length,
        })
    }
}

/// Decodes an entry name: UTF-8 when the EFS flag says so, latin-1
/// byte-by-byte otherwise.
fn decode_name(flags: u16, bytes: &[u8]) -> Result<String> {
    if flags & FLAG_UTF8 != 0 {
        Ok(std::str::from_utf8(bytes)?.to_owned())
    } else {
        Ok(latin1(bytes))
    }
}

/// Reads `buf.len()` bytes starting at `start`. `Ok(None)` iff canceled.
fn read_fully_at(
    backing: &dyn FileBacking,
    start: u64,
    buf: &mut [u8],
    canceled: &AtomicBool,
) -> Result<Option<()>> {
    let Some(mut reader) = backing.open(start, canceled)? else {
        return Ok(None);
    };
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Format("archive ends inside a record".into())
        } else {
            Error::Io(e)
        }
    })?;
    Ok(Some(()))
}

/// Discards `n` decoded bytes, checking the cancel flag between chunks.
pub(crate) fn skip_decoded(
    reader: &mut dyn Read,
    mut n: u64,
    canceled: &AtomicBool,
) -> Result<Option<()>> {
    let mut scratch = [0u8; 8192];
    while n > 0 {
        if is_canceled(canceled) {
            return Ok(None);
        }
        let want = n.min(scratch.len() as u64) as usize;
        let got = reader.read(&mut scratch[..want])?;
        if got == 0 {
            return Err(Error::Format("start offset past end of entry".into()));
        }
        n -= got as u64;
    }
    Ok(Some(()))
}

pub struct ZipFormat;

impl ZipFormat {
    /// Tail-first parse for archives whose length is known.
    fn parse_seekable(
        &self,
        backing: &dyn FileBacking,
        length: u64,
        mut for_each: Option<&mut dyn FnMut(&ArchiveEntry)>,
        canceled: &AtomicBool,
    ) -> Result<Option<ArchiveEntry>> {
        let mut window = vec![0u8; TAIL_WINDOW.min(usize(length)?)];
        let mut window_end = length;
        let (eocdr_offset, window_start) = loop {
            let start = window_end.saturating_sub(TAIL_WINDOW as u64);
            let size = usize(window_end - start)?;
            if read_fully_at(backing, start, &mut window[..size], canceled)?.is_none() {
                return Ok(None);
            }
            if let Some(at) = memmem::rfind(&window[..size], &EOCDR_MAGIC) {
                break (start + at as u64, start);
            }
            // Back the window up, overlapping enough that a magic number
            // straddling the boundary is still seen. Once less than one
            // central record could remain in front, this isn't a ZIP.
            window_end = start + EOCDR_MAGIC.len() as u64 - 1;
            if start == 0 || window_end < CENTRAL_RECORD_MIN {
                return Err(Error::Format(
                    "no End Of Central Directory Record".into(),
                ));
            }
        };
        let in_window = usize(eocdr_offset - window_start)?;
        let window_len = usize(window_end - window_start)?;
        let eocdr = EndOfCentralDirectory::parse(&window[in_window..window_len])?;
        trace!("{eocdr:?}");
        if eocdr.disk_number != eocdr.disk_with_central_directory {
            debug!(
                "central directory on another disk ({} != {})",
                eocdr.disk_number, eocdr.disk_with_central_directory
            );
        }

        let cd_offset = eocdr.central_directory_offset as u64;
        let cd_size = usize(eocdr.central_directory_size)?;
        // Use the tail window when it already holds the whole directory.
        let directory: Vec<u8> = if cd_offset >= window_start
            && cd_offset + cd_size as u64 <= window_end
        {
            let from = usize(cd_offset - window_start)?;
            window[from..from + cd_size].to_vec()
        } else {
            let mut buf = vec![0u8; cd_size];
            if read_fully_at(backing, cd_offset, &mut buf, canceled)?.is_none() {
                return Ok(None);
            }
            buf
        };

        let mut root = ArchiveEntry::root();
        let mut slice = &directory[..];
        for index in 0..eocdr.entries as usize {
            if is_canceled(canceled) {
                return Ok(None);
            }
            let record = CentralRecord::parse_and_consume(&mut slice, index)?;
            trace!("{record:?}");
            if record.disk_number != eocdr.disk_number {
                continue;
            }
            let name = decode_name(record.flags, record.name)?;
            let mtime = dos_datetime_millis(
                record.last_modified_time,
                record.last_modified_date,
                0,
            );
            let inserted = root.insert_path(
                &name,
                Some(record.header_offset as u64),
                record.uncompressed_size as u64,
                mtime,
            );
            if let Some(ref mut f) = for_each {
                f(inserted);
            }
        }
        Ok(Some(root))
    }

    /// Front-to-back scan of the local headers for archives whose length
    /// is unknown. Aborts to [`Self::parse_inflating`] on the first entry
    /// with deferred sizes.
    fn parse_streaming(
        &self,
        backing: &dyn FileBacking,
        mut for_each: Option<&mut dyn FnMut(&ArchiveEntry)>,
        canceled: &AtomicBool,
    ) -> Result<Option<ArchiveEntry>> {
        let Some(reader) = backing.open(0, canceled)? else {
            return Ok(None);
        };
        let mut reader = CountingReader::new(reader);
        let mut root = ArchiveEntry::root();
        let mut index = 0usize;
        loop {
            if is_canceled(canceled) {
                return Ok(None);
            }
            let header_offset = reader.position();
            let mut sig = [0u8; 4];
            match reader.read_exact(&mut sig) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if sig == CENTRAL_DIRECTORY_MAGIC || sig == EOCDR_MAGIC {
                break;
            }
            if sig != LOCAL_FILE_HEADER_MAGIC {
                return Err(Error::Format(format!(
                    "bad local header signature at entry {index}"
                )));
            }
            let mut fixed = [0u8; 26];
            reader.read_exact(&mut fixed)?;
            let header = LocalHeader::parse(&fixed)?;
            if header.flags & FLAG_DESCRIPTOR != 0 {
                // Sizes were recorded after the data; the skip scan can't
                // continue. Start over, inflating everything.
                debug!("entry {index} defers its sizes; falling back to a full decompression scan");
                return self.parse_inflating(backing, for_each, canceled);
            }
            let mut name = vec![0u8; header.name_length];
            reader.read_exact(&mut name)?;
            reader.skip(header.extra_length as u64)?;
            let name = decode_name(header.flags, &name)?;
            let inserted = root.insert_path(
                &name,
                Some(header_offset),
                header.uncompressed_size as u64,
                dos_datetime_millis(header.last_modified_time, header.last_modified_date, 0),
            );
            if let Some(ref mut f) = for_each {
                f(inserted);
            }
            reader.skip(header.compressed_size as u64)?;
            index += 1;
        }
        Ok(Some(root))
    }

    /// The last resort: decompress every entry to find where the next
    /// record starts. Only reached for streams whose entries defer their
    /// sizes to data descriptors.
    fn parse_inflating(
        &self,
        backing: &dyn FileBacking,
        mut for_each: Option<&mut dyn FnMut(&ArchiveEntry)>,
        canceled: &AtomicBool,
    ) -> Result<Option<ArchiveEntry>> {
        let Some(reader) = backing.open(0, canceled)? else {
            return Ok(None);
        };
        let mut reader = io::BufReader::new(reader);
        let mut root = ArchiveEntry::root();
        let mut position = 0u64;
        let mut index = 0usize;
        loop {
            if is_canceled(canceled) {
                return Ok(None);
            }
            let mut sig = [0u8; 4];
            match reader.read_exact(&mut sig) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if sig == CENTRAL_DIRECTORY_MAGIC || sig == EOCDR_MAGIC {
                break;
            }
            if sig != LOCAL_FILE_HEADER_MAGIC {
                return Err(Error::Format(format!(
                    "bad local header signature at entry {index}"
                )));
            }
            let mut fixed = [0u8; 26];
            reader.read_exact(&mut fixed)?;
            let header = LocalHeader::parse(&fixed)?;
            let mut name = vec![0u8; header.name_length];
            reader.read_exact(&mut name)?;
            io::copy(
                &mut (&mut reader).take(header.extra_length as u64),
                &mut io::sink(),
            )?;
            let name = decode_name(header.flags, &name)?;
            let payload_start =
                position + 30 + header.name_length as u64 + header.extra_length as u64;

            let (uncompressed, consumed) = if header.compression_method == 8 {
                let mut decoder = bufread::DeflateDecoder::new(&mut reader);
                let mut total = 0u64;
                let mut scratch = [0u8; 8192];
                loop {
                    if is_canceled(canceled) {
                        return Ok(None);
                    }
                    let n = decoder.read(&mut scratch)?;
                    if n == 0 {
                        break;
                    }
                    total += n as u64;
                }
                (total, decoder.total_in())
            } else {
                io::copy(
                    &mut (&mut reader).take(header.compressed_size as u64),
                    &mut io::sink(),
                )?;
                (header.compressed_size as u64, header.compressed_size as u64)
            };
            let mut after_payload = payload_start + consumed;

            if header.flags & FLAG_DESCRIPTOR != 0 {
                // 4.3.9  Data descriptor -- crc-32, compressed size,
                // uncompressed size, each 4 bytes, with an optional
                // leading signature.
                let mut first = [0u8; 4];
                reader.read_exact(&mut first)?;
                if first == DATA_DESCRIPTOR_MAGIC {
                    io::copy(&mut (&mut reader).take(12), &mut io::sink())?;
                    after_payload += 16;
                } else {
                    io::copy(&mut (&mut reader).take(8), &mut io::sink())?;
                    after_payload += 12;
                }
            }

            let inserted = root.insert_path(
                &name,
                Some(position),
                uncompressed,
                dos_datetime_millis(header.last_modified_time, header.last_modified_date, 0),
            );
            if let Some(ref mut f) = for_each {
                f(inserted);
            }
            position = after_payload;
            index += 1;
        }
        Ok(Some(root))
    }
}

impl ArchiveFormat for ZipFormat {
    fn label(&self) -> &'static str {
        "zip"
    }

    fn may_be_archive(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        lower.ends_with(".zip") || lower.ends_with(".jar")
    }

    fn is_archive(
        &self,
        backing: &dyn FileBacking,
        canceled: &AtomicBool,
    ) -> Result<Option<bool>> {
        let Some(mut reader) = backing.open(0, canceled)? else {
            return Ok(None);
        };
        let mut head = [0u8; 4];
        match reader.read_exact(&mut head) {
            // An archive with no entries at all starts with the EOCDR.
            Ok(()) => Ok(Some(head == LOCAL_FILE_HEADER_MAGIC || head == EOCDR_MAGIC)),
            Err(_) => Ok(Some(false)),
        }
    }

    fn parse_structure(
        &self,
        backing: &dyn FileBacking,
        existing: Option<Arc<ArchiveEntry>>,
        on_child: Option<&mut dyn FnMut(&ArchiveEntry)>,
        for_each: Option<&mut dyn FnMut(&ArchiveEntry)>,
        canceled: &AtomicBool,
    ) -> Result<Option<Arc<ArchiveEntry>>> {
        let length = backing.stat().length;
        let parsed = if length != LENGTH_UNKNOWN && length > 0 {
            self.parse_seekable(backing, length, for_each, canceled)?
        } else {
            self.parse_streaming(backing, for_each, canceled)?
        };
        let Some(root) = parsed else {
            return Ok(None);
        };
        Ok(Some(crate::format::finish_parse(root, existing, on_child)))
    }

    fn open_entry(
        &self,
        backing: &dyn FileBacking,
        entry: &ArchiveEntry,
        start: u64,
        canceled: &AtomicBool,
    ) -> Result<Option<Box<dyn Read + Send>>> {
        let Some(position) = entry.position() else {
            return Err(Error::Format(format!(
                "no recorded position for entry {}",
                entry.name()
            )));
        };
        let Some(mut raw) = backing.open(position, canceled)? else {
            return Ok(None);
        };
        let mut fixed = [0u8; 30];
        raw.read_exact(&mut fixed)?;
        if fixed[..4] != LOCAL_FILE_HEADER_MAGIC {
            return Err(Error::Format(format!(
                "bad local header signature for entry {}",
                entry.name()
            )));
        }
        let header = LocalHeader::parse(&fixed[4..])?;
        let mut counting = CountingReader::new(raw);
        counting.skip((header.name_length + header.extra_length) as u64)?;

        let mut decoded: Box<dyn Read + Send> = match header.compression_method {
            0 => Box::new(CountingReader::with_limit(counting, entry.length())),
            8 => Box::new(DeflateDecoder::new(counting)),
            other => {
                return Err(Error::Format(format!(
                    "unsupported compression method {other} for entry {}",
                    entry.name()
                )))
            }
        };
        // Entries with deferred sizes have no usable CRC here; 0 skips
        // the check.
        decoded = Box::new(Crc32Reader::new(decoded, header.crc32));
        if start > 0 && skip_decoded(&mut *decoded, start, canceled)?.is_none() {
            return Ok(None);
        }
        Ok(Some(decoded))
    }

    fn rewrite_url(&self, url: &mut String) -> Result<()> {
        rewrite_archive_url(url, &["zip", "jar"])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dos_datetime_expands() {
        // 2021-06-15 12:34:56 -> date 0b0101001_1100_0_1111, careful:
        // year 41, month 6, day 15; time 12h 34m 28*2s
        let date: u16 = (41 << 9) | (6 << 5) | 15;
        let time: u16 = (12 << 11) | (34 << 5) | 28;
        let ms = dos_datetime_millis(time, date, 0);
        let expected = NaiveDate::from_ymd_opt(2021, 6, 15)
            .unwrap()
            .and_hms_opt(12, 34, 56)
            .unwrap()
            .and_utc()
            .timestamp_millis() as u64;
        assert_eq!(ms, expected);
        assert_eq!(dos_datetime_millis(time, date, 500), expected + 500);
    }

    #[test]
    fn bad_dates_collapse_to_unknown() {
        assert_eq!(dos_datetime_millis(0, 0, 0), 0);
    }

    #[test]
    fn eocdr_too_short_is_rejected() {
        let mut bytes = EOCDR_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 10]);
        assert!(EndOfCentralDirectory::parse(&bytes).is_err());
    }
}
