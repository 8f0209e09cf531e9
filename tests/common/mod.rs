#![allow(dead_code)]

//! Shared fixture builders: archives as byte vectors, plus
//! instrumented backings for the properties that count I/O.

use std::io::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arbor::backing::{DeleteResults, FileBacking, FileStat};
use arbor::result::Result;
use crc32fast::Hasher;
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// One file (or directory, when `name` ends in `/`) to put in a ZIP.
pub struct ZipEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub deflate: bool,
    pub utf8_flag: bool,
    /// Write sizes and CRC in a trailing data descriptor instead of the
    /// local header (general-purpose bit 3).
    pub descriptor: bool,
    pub dos_time: u16,
    pub dos_date: u16,
}

impl ZipEntry {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_owned(),
            data: data.to_vec(),
            deflate: false,
            utf8_flag: false,
            descriptor: false,
            // 2020-01-02 03:04:06
            dos_time: (3 << 11) | (4 << 5) | 3,
            dos_date: (40 << 9) | (1 << 5) | 2,
        }
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        Self {
            deflate: true,
            ..Self::stored(name, data)
        }
    }

    pub fn utf8(mut self) -> Self {
        self.utf8_flag = true;
        self
    }

    pub fn with_descriptor(mut self) -> Self {
        self.descriptor = true;
        self
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Serializes a complete ZIP archive.
pub fn build_zip(entries: &[ZipEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    let mut count: u16 = 0;

    for entry in entries {
        let offset = out.len() as u32;
        let mut flags: u16 = 0;
        if entry.utf8_flag {
            flags |= 1 << 11;
        }
        if entry.descriptor {
            flags |= 1 << 3;
        }
        let method: u16 = if entry.deflate { 8 } else { 0 };
        let payload = if entry.deflate {
            deflate(&entry.data)
        } else {
            entry.data.clone()
        };
        let crc = crc32(&entry.data);
        let (header_crc, header_csize, header_usize) = if entry.descriptor {
            (0u32, 0u32, 0u32)
        } else {
            (crc, payload.len() as u32, entry.data.len() as u32)
        };

        out.extend_from_slice(&[b'P', b'K', 3, 4]);
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&entry.dos_time.to_le_bytes());
        out.extend_from_slice(&entry.dos_date.to_le_bytes());
        out.extend_from_slice(&header_crc.to_le_bytes());
        out.extend_from_slice(&header_csize.to_le_bytes());
        out.extend_from_slice(&header_usize.to_le_bytes());
        out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&payload);
        if entry.descriptor {
            out.extend_from_slice(&[b'P', b'K', 7, 8]);
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        }

        central.extend_from_slice(&[b'P', b'K', 1, 2]);
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&flags.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&entry.dos_time.to_le_bytes());
        central.extend_from_slice(&entry.dos_date.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        central.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(entry.name.as_bytes());
        count += 1;
    }

    let cd_offset = out.len() as u32;
    out.extend_from_slice(&central);
    let cd_size = central.len() as u32;
    out.extend_from_slice(&[b'P', b'K', 5, 6]);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// One member of a TAR archive.
pub enum TarItem {
    File { name: String, data: Vec<u8>, mtime_secs: u64 },
    Dir { name: String },
    /// A GNU long-name record naming the entry that follows it.
    LongName { name: String },
}

fn tar_header(name: &str, size: u64, mtime_secs: u64, type_byte: u8) -> [u8; 512] {
    let mut header = [0u8; 512];
    assert!(name.len() <= 100, "use LongName for {name}");
    header[..name.len()].copy_from_slice(name.as_bytes());
    header[100..107].copy_from_slice(b"0000644");
    header[108..115].copy_from_slice(b"0000000");
    header[116..123].copy_from_slice(b"0000000");
    header[124..136].copy_from_slice(format!("{size:011o} ").as_bytes());
    header[136..148].copy_from_slice(format!("{mtime_secs:011o} ").as_bytes());
    header[156] = type_byte;
    header[257..262].copy_from_slice(b"ustar");
    header[148..156].fill(b' ');
    let sum: u64 = header.iter().map(|&b| b as u64).sum();
    header[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
    header
}

/// Serializes a TAR archive, terminated by two zero blocks.
pub fn build_tar(items: &[TarItem]) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        match item {
            TarItem::File {
                name,
                data,
                mtime_secs,
            } => {
                out.extend_from_slice(&tar_header(name, data.len() as u64, *mtime_secs, b'0'));
                out.extend_from_slice(data);
                let pad = (512 - data.len() % 512) % 512;
                out.extend_from_slice(&vec![0u8; pad]);
            }
            TarItem::Dir { name } => {
                let named = if name.ends_with('/') {
                    name.clone()
                } else {
                    format!("{name}/")
                };
                out.extend_from_slice(&tar_header(&named, 0, 0, b'5'));
            }
            TarItem::LongName { name } => {
                let mut data = name.clone().into_bytes();
                data.push(0);
                out.extend_from_slice(&tar_header(
                    "././@LongLink",
                    data.len() as u64,
                    0,
                    b'L',
                ));
                out.extend_from_slice(&data);
                let pad = (512 - data.len() % 512) % 512;
                out.extend_from_slice(&vec![0u8; pad]);
            }
        }
    }
    out.extend_from_slice(&[0u8; 1024]);
    out
}

/// Serializes a GZIP member. `fname` lands in the FNAME header field.
pub fn build_gzip(fname: Option<&str>, mtime_secs: u32, data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x1F, 0x8B, 8, if fname.is_some() { 1 << 3 } else { 0 }];
    out.extend_from_slice(&mtime_secs.to_le_bytes());
    out.extend_from_slice(&[0, 255]);
    if let Some(fname) = fname {
        out.extend_from_slice(fname.as_bytes());
        out.push(0);
    }
    out.extend_from_slice(&deflate(data));
    out.extend_from_slice(&crc32(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out
}

/// A delegating backing that counts how many times content is opened.
pub struct CountingBacking {
    inner: Arc<dyn FileBacking>,
    pub opens: Arc<AtomicUsize>,
}

impl CountingBacking {
    pub fn new(inner: Arc<dyn FileBacking>) -> (Arc<dyn FileBacking>, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                inner,
                opens: Arc::clone(&opens),
            }),
            opens,
        )
    }
}

impl FileBacking for CountingBacking {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn path(&self) -> String {
        self.inner.path()
    }

    fn stat(&self) -> FileStat {
        self.inner.stat()
    }

    fn check(&self) -> bool {
        self.inner.check()
    }

    fn list(
        &self,
        on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        canceled: &AtomicBool,
    ) -> Result<bool> {
        self.inner.list(on_child, canceled)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        self.inner.child_named(name)
    }

    fn open(
        &self,
        start: u64,
        canceled: &AtomicBool,
    ) -> Result<Option<Box<dyn Read + Send>>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        self.inner.open(start, canceled)
    }

    fn create(&self, directory: bool) -> Result<()> {
        self.inner.create(directory)
    }

    fn delete(&self, results: &mut DeleteResults) -> Result<()> {
        self.inner.delete(results)
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        self.inner.write()
    }

    fn set_last_modified(&self, millis: u64) -> bool {
        self.inner.set_last_modified(millis)
    }

    fn set_attribute(
        &self,
        attribute: arbor::backing::Attribute,
        value: bool,
        owner_only: bool,
    ) -> bool {
        self.inner.set_attribute(attribute, value, owner_only)
    }

    fn move_to(&self, new_path: &str) -> Result<()> {
        self.inner.move_to(new_path)
    }

    fn to_url(&self, out: &mut String) -> Result<()> {
        self.inner.to_url(out)
    }
}

/// Reads a backing's whole content as UTF-8.
pub fn read_all(backing: &dyn FileBacking) -> String {
    let mut reader = backing
        .open(0, &arbor::backing::NOT_CANCELED)
        .expect("open failed")
        .expect("not canceled");
    let mut out = String::new();
    reader.read_to_string(&mut out).expect("read failed");
    out
}

/// Names of a backing's children, in listing order.
pub fn child_names(backing: &dyn FileBacking) -> Vec<String> {
    let mut names = Vec::new();
    backing
        .list(
            &mut |child| names.push(child.name().to_owned()),
            &arbor::backing::NOT_CANCELED,
        )
        .expect("list failed");
    names
}
