//! The GZIP codec.
//!
//! A GZIP file (RFC 1952) holds exactly one deflated member, so the
//! archive presents as a root directory with a single file in it, named
//! by the header's FNAME field when present and by the archive's own
//! name minus its `.gz` suffix otherwise.
//!
//! Only the subset this crate writes against is accepted: method 8,
//! reserved flag bits clear, no header CRC, no comment.

use std::io;
use std::io::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use log::*;

use crate::backing::{FileBacking, LENGTH_UNKNOWN};
use crate::entry::ArchiveEntry;
use crate::format::{latin1, probe_magic, rewrite_archive_url, ArchiveFormat};
use crate::path::strip_extension;
use crate::result::*;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const METHOD_DEFLATE: u8 = 8;

// 2.3.1. Member header flag bits
const FLAG_FHCRC: u8 = 1 << 1;
const FLAG_FEXTRA: u8 = 1 << 2;
const FLAG_FNAME: u8 = 1 << 3;
const FLAG_FCOMMENT: u8 = 1 << 4;
const FLAG_RESERVED: u8 = 0xE0;

/// The decoded fixed header plus its optional name.
#[derive(Debug)]
struct GzipHeader {
    /// Seconds since the epoch, 0 when the compressor didn't say.
    mtime: u32,
    name: Option<String>,
}

/// Reads and validates the member header, leaving `reader` at the start
/// of the deflate stream.
fn read_header(reader: &mut dyn Read) -> Result<GzipHeader> {
    // 2.3. Member format: magic (2), CM (1), FLG (1), MTIME (4),
    // XFL (1), OS (1), then the optional fields the flags call out.
    let mut fixed = [0u8; 10];
    reader
        .read_exact(&mut fixed)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Format("truncated GZIP header".into()),
            _ => Error::Io(e),
        })?;
    if fixed[..2] != GZIP_MAGIC {
        return Err(Error::Format("bad GZIP signature".into()));
    }
    if fixed[2] != METHOD_DEFLATE {
        return Err(Error::Format(format!(
            "unsupported GZIP compression method {}",
            fixed[2]
        )));
    }
    let flags = fixed[3];
    if flags & FLAG_RESERVED != 0 {
        return Err(Error::Format("reserved GZIP flag bits set".into()));
    }
    if flags & (FLAG_FHCRC | FLAG_FCOMMENT) != 0 {
        return Err(Error::Format(
            "GZIP header CRC and comments are not supported".into(),
        ));
    }
    let mtime = u32::from_le_bytes(fixed[4..8].try_into().unwrap());

    if flags & FLAG_FEXTRA != 0 {
        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        let len = u16::from_le_bytes(len) as u64;
        io::copy(&mut (&mut *reader).take(len), &mut io::sink())?;
    }
    let name = if flags & FLAG_FNAME != 0 {
        // NUL-terminated, latin-1.
        let mut bytes = Vec::new();
        let mut one = [0u8; 1];
        loop {
            reader.read_exact(&mut one)?;
            if one[0] == 0 {
                break;
            }
            bytes.push(one[0]);
        }
        Some(latin1(&bytes))
    } else {
        None
    };
    Ok(GzipHeader { mtime, name })
}

/// The name the single interior file takes when the header has no FNAME:
/// the archive's own name with its `.gz` shed (`.tgz` becomes `.tar`).
fn fallback_name(archive_name: &str) -> String {
    let lower = archive_name.to_ascii_lowercase();
    if lower.ends_with(".gz") {
        archive_name[..archive_name.len() - 3].to_owned()
    } else if lower.ends_with(".tgz") {
        format!("{}.tar", strip_extension(archive_name))
    } else {
        archive_name.to_owned()
    }
}

pub struct GzipFormat;

impl ArchiveFormat for GzipFormat {
    fn label(&self) -> &'static str {
        "gzip"
    }

    fn may_be_archive(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        lower.ends_with(".gz") || lower.ends_with(".tgz")
    }

    fn is_archive(
        &self,
        backing: &dyn FileBacking,
        canceled: &AtomicBool,
    ) -> Result<Option<bool>> {
        probe_magic(backing, &[GZIP_MAGIC[0], GZIP_MAGIC[1], METHOD_DEFLATE], canceled)
    }

    fn parse_structure(
        &self,
        backing: &dyn FileBacking,
        existing: Option<Arc<ArchiveEntry>>,
        on_child: Option<&mut dyn FnMut(&ArchiveEntry)>,
        mut for_each: Option<&mut dyn FnMut(&ArchiveEntry)>,
        canceled: &AtomicBool,
    ) -> Result<Option<Arc<ArchiveEntry>>> {
        let Some(mut reader) = backing.open(0, canceled)? else {
            return Ok(None);
        };
        let header = read_header(&mut reader)?;
        trace!("{header:?}");
        let name = match header.name {
            Some(name) => name,
            None => fallback_name(backing.name()),
        };
        let mut root = ArchiveEntry::root();
        // The deflate stream doesn't record its inflated size up front.
        let inserted = root.insert_path(
            &name,
            None,
            LENGTH_UNKNOWN,
            header.mtime as u64 * 1000,
        );
        if let Some(ref mut f) = for_each {
            f(inserted);
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
        // One member, always decoded from the top.
        let Some(mut raw) = backing.open(0, canceled)? else {
            return Ok(None);
        };
        read_header(&mut raw)?;
        debug!("inflating {} from the archive start", entry.name());
        let mut decoded: Box<dyn Read + Send> = Box::new(DeflateDecoder::new(raw));
        if start > 0 && crate::zip::skip_decoded(&mut *decoded, start, canceled)?.is_none() {
            return Ok(None);
        }
        Ok(Some(decoded))
    }

    fn rewrite_url(&self, url: &mut String) -> Result<()> {
        rewrite_archive_url(url, &["gz", "tgz"])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn member(flags: u8, mtime: u32, tail: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x1F, 0x8B, 8, flags];
        bytes.extend_from_slice(&mtime.to_le_bytes());
        bytes.extend_from_slice(&[0, 255]);
        bytes.extend_from_slice(tail);
        bytes
    }

    #[test]
    fn header_with_name() {
        let bytes = member(FLAG_FNAME, 1234, b"notes.txt\0data");
        let mut reader = &bytes[..];
        let header = read_header(&mut reader).unwrap();
        assert_eq!(header.mtime, 1234);
        assert_eq!(header.name.as_deref(), Some("notes.txt"));
        assert_eq!(reader, b"data");
    }

    #[test]
    fn extra_field_is_skipped() {
        let mut tail = vec![3, 0, 9, 9, 9];
        tail.extend_from_slice(b"rest");
        let bytes = member(FLAG_FEXTRA, 0, &tail);
        let mut reader = &bytes[..];
        let header = read_header(&mut reader).unwrap();
        assert_eq!(header.name, None);
        assert_eq!(reader, b"rest");
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let bytes = member(0x80, 0, b"");
        assert!(read_header(&mut &bytes[..]).is_err());
    }

    #[test]
    fn wrong_method_is_rejected() {
        let bytes = [0x1F, 0x8B, 7, 0, 0, 0, 0, 0, 0, 255];
        assert!(read_header(&mut &bytes[..]).is_err());
    }

    #[test]
    fn fallback_names() {
        assert_eq!(fallback_name("report.txt.gz"), "report.txt");
        assert_eq!(fallback_name("bundle.tgz"), "bundle.tar");
        assert_eq!(fallback_name("odd"), "odd");
    }
}
