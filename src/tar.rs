//! The TAR codec.
//!
//! USTAR-compatible POSIX tar: a sequence of 512-byte headers, each
//! followed by its entry's data rounded up to the next block. There is
//! no table of contents, so parsing is one forward walk. The GNU `'L'`
//! extension (a pseudo-entry whose data is the real, over-long name of
//! the entry after it) is honored.

use std::io;
use std::io::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::*;

use crate::backing::{is_canceled, FileBacking};
use crate::counting::CountingReader;
use crate::entry::ArchiveEntry;
use crate::format::{latin1, rewrite_archive_url, ArchiveFormat};
use crate::result::*;

const BLOCK: u64 = 512;

// Header field offsets.
const NAME_OFFSET: usize = 0;
const NAME_LEN: usize = 100;
const SIZE_OFFSET: usize = 124;
const SIZE_LEN: usize = 12;
const MTIME_OFFSET: usize = 136;
const MTIME_LEN: usize = 12;
const CHECKSUM_OFFSET: usize = 148;
const CHECKSUM_LEN: usize = 8;
const TYPE_OFFSET: usize = 156;

const TYPE_FILE: u8 = b'0';
const TYPE_DIRECTORY: u8 = b'5';
const TYPE_GNU_LONG_NAME: u8 = b'L';

/// Parses a NUL-or-space-padded octal field.
fn octal(field: &[u8]) -> Result<u64> {
    let mut value = 0u64;
    let mut seen = false;
    for &b in field {
        match b {
            b'0'..=b'7' => {
                value = value
                    .checked_mul(8)
                    .and_then(|v| v.checked_add((b - b'0') as u64))
                    .ok_or_else(|| Error::Format("octal field overflow".into()))?;
                seen = true;
            }
            b' ' | 0 => {
                if seen {
                    break;
                }
            }
            other => {
                return Err(Error::Format(format!(
                    "non-octal byte {other:#04x} in header field"
                )))
            }
        }
    }
    Ok(value)
}

/// True when the checksum field holds no digits at all, which (like an
/// all-zero block) marks the end of the archive.
fn checksum_absent(header: &[u8]) -> bool {
    header[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_LEN]
        .iter()
        .all(|&b| b == 0 || b == b' ')
}

/// Verifies the recorded checksum: the sum of every header byte with the
/// checksum field itself read as ASCII spaces.
fn verify_checksum(header: &[u8], index: usize) -> Result<()> {
    let recorded = octal(&header[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_LEN])?;
    let mut sum = 0u64;
    for (at, &b) in header.iter().enumerate() {
        if (CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_LEN).contains(&at) {
            sum += b' ' as u64;
        } else {
            sum += b as u64;
        }
    }
    if sum != recorded {
        return Err(Error::Format(format!(
            "checksum mismatch at entry {index}: recorded {recorded}, computed {sum}"
        )));
    }
    Ok(())
}

/// NUL-trimmed name bytes decoded as latin-1.
fn header_name(header: &[u8]) -> String {
    let field = &header[NAME_OFFSET..NAME_OFFSET + NAME_LEN];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    latin1(&field[..end])
}

pub struct TarFormat;

impl ArchiveFormat for TarFormat {
    fn label(&self) -> &'static str {
        "tar"
    }

    fn may_be_archive(&self, file_name: &str) -> bool {
        file_name.to_ascii_lowercase().ends_with(".tar")
    }

    fn is_archive(
        &self,
        backing: &dyn FileBacking,
        canceled: &AtomicBool,
    ) -> Result<Option<bool>> {
        // No magic at offset 0; validate the first block's checksum
        // instead, which also accepts pre-USTAR archives.
        let Some(mut reader) = backing.open(0, canceled)? else {
            return Ok(None);
        };
        let mut header = [0u8; BLOCK as usize];
        if reader.read_exact(&mut header).is_err() {
            return Ok(Some(false));
        }
        if checksum_absent(&header) {
            return Ok(Some(false));
        }
        Ok(Some(verify_checksum(&header, 0).is_ok()))
    }

    fn parse_structure(
        &self,
        backing: &dyn FileBacking,
        existing: Option<Arc<ArchiveEntry>>,
        on_child: Option<&mut dyn FnMut(&ArchiveEntry)>,
        mut for_each: Option<&mut dyn FnMut(&ArchiveEntry)>,
        canceled: &AtomicBool,
    ) -> Result<Option<Arc<ArchiveEntry>>> {
        let Some(reader) = backing.open(0, canceled)? else {
            return Ok(None);
        };
        let mut reader = CountingReader::new(reader);
        let mut root = ArchiveEntry::root();
        let mut pending_long_name: Option<String> = None;
        let mut index = 0usize;
        loop {
            if is_canceled(canceled) {
                return Ok(None);
            }
            let header_offset = reader.position();
            let mut header = [0u8; BLOCK as usize];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if checksum_absent(&header) {
                break;
            }
            verify_checksum(&header, index)?;

            let size = octal(&header[SIZE_OFFSET..SIZE_OFFSET + SIZE_LEN])?;
            let mtime = octal(&header[MTIME_OFFSET..MTIME_OFFSET + MTIME_LEN])?;
            let type_byte = header[TYPE_OFFSET];
            let padded = size.div_ceil(BLOCK) * BLOCK;

            match type_byte {
                TYPE_GNU_LONG_NAME => {
                    // The data of this pseudo-entry is the real name of
                    // the next one.
                    let mut bytes = vec![0u8; size as usize];
                    reader.read_exact(&mut bytes)?;
                    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                    pending_long_name = Some(latin1(&bytes[..end]));
                    reader.skip(padded - size)?;
                }
                _ => {
                    let name = match pending_long_name.take() {
                        Some(long) => long,
                        None => header_name(&header),
                    };
                    let directory = type_byte == TYPE_DIRECTORY || name.ends_with('/');
                    let regular = type_byte == TYPE_FILE || type_byte == 0;
                    if directory {
                        let with_slash = if name.ends_with('/') {
                            name
                        } else {
                            format!("{name}/")
                        };
                        let inserted =
                            root.insert_path(&with_slash, Some(header_offset), 0, mtime * 1000);
                        if let Some(ref mut f) = for_each {
                            f(inserted);
                        }
                    } else if regular {
                        let inserted =
                            root.insert_path(&name, Some(header_offset), size, mtime * 1000);
                        if let Some(ref mut f) = for_each {
                            f(inserted);
                        }
                    } else {
                        // Links, devices, and vendor types carry no
                        // content we can present.
                        debug!("skipping type {:?} entry {name}", type_byte as char);
                    }
                    reader.skip(padded)?;
                }
            }
            index += 1;
        }
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
        // Content sits one block past the header, fenced to the
        // recorded size.
        let Some(raw) = backing.open(position + BLOCK, canceled)? else {
            return Ok(None);
        };
        let mut limited = CountingReader::with_limit(raw, entry.length());
        if start > 0 {
            let skipped = limited.skip(start)?;
            if skipped < start {
                return Err(Error::Format("start offset past end of entry".into()));
            }
        }
        Ok(Some(Box::new(limited)))
    }

    fn rewrite_url(&self, url: &mut String) -> Result<()> {
        rewrite_archive_url(url, &["tar"])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header_for(name: &str, size: u64, type_byte: u8) -> [u8; 512] {
        let mut header = [0u8; 512];
        header[..name.len()].copy_from_slice(name.as_bytes());
        let size_field = format!("{size:011o} ");
        header[SIZE_OFFSET..SIZE_OFFSET + 12].copy_from_slice(size_field.as_bytes());
        let mtime_field = format!("{:011o} ", 1_600_000_000u64);
        header[MTIME_OFFSET..MTIME_OFFSET + 12].copy_from_slice(mtime_field.as_bytes());
        header[TYPE_OFFSET] = type_byte;
        // Checksum computed with the field spaced out.
        header[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].fill(b' ');
        let sum: u64 = header.iter().map(|&b| b as u64).sum();
        let checksum_field = format!("{sum:06o}\0 ");
        header[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].copy_from_slice(checksum_field.as_bytes());
        header
    }

    #[test]
    fn octal_fields() {
        assert_eq!(octal(b"0000644\0").unwrap(), 0o644);
        assert_eq!(octal(b"   777 \0").unwrap(), 0o777);
        assert_eq!(octal(b"\0\0\0\0").unwrap(), 0);
        assert!(octal(b"12x").is_err());
    }

    #[test]
    fn checksum_round_trips() {
        let header = header_for("hello.txt", 5, TYPE_FILE);
        assert!(!checksum_absent(&header));
        verify_checksum(&header, 0).unwrap();

        let mut corrupt = header;
        corrupt[0] ^= 1;
        assert!(verify_checksum(&corrupt, 0).is_err());
    }

    #[test]
    fn zero_block_ends_the_archive() {
        assert!(checksum_absent(&[0u8; 512]));
    }

    #[test]
    fn name_is_nul_trimmed() {
        let header = header_for("dir/file.bin", 0, TYPE_FILE);
        assert_eq!(header_name(&header), "dir/file.bin");
    }
}
