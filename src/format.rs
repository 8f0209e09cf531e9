//! The archive codec capability: how a backing's bytes become a
//! directory tree, and how entries inside it are read back out.

use std::io::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::backing::FileBacking;
use crate::entry::ArchiveEntry;
use crate::result::*;

/// A decoder for one archive family.
///
/// Detection runs in two steps — a filename test that costs nothing,
/// then a magic-byte probe — so unlikely candidates never get opened.
/// `Ok(None)` from any operation means the caller's cancel flag fired.
pub trait ArchiveFormat: Send + Sync {
    /// A short name for logs ("zip", "tar", ...).
    fn label(&self) -> &'static str;

    /// Filename-only fast test: could this name be one of ours?
    fn may_be_archive(&self, file_name: &str) -> bool;

    /// Reads a small prefix to confirm the magic bytes.
    fn is_archive(
        &self,
        backing: &dyn FileBacking,
        canceled: &AtomicBool,
    ) -> Result<Option<bool>>;

    /// Decodes the archive's structure into an entry tree.
    ///
    /// When `existing` is the root of a previous parse and the structure
    /// is unchanged, the same handle comes back, so derived state keyed
    /// on it stays valid. `for_each` fires once per entry in archive
    /// order during the traversal; `on_child` fires once per direct
    /// child of the root once the tree is complete.
    fn parse_structure(
        &self,
        backing: &dyn FileBacking,
        existing: Option<Arc<ArchiveEntry>>,
        on_child: Option<&mut dyn FnMut(&ArchiveEntry)>,
        for_each: Option<&mut dyn FnMut(&ArchiveEntry)>,
        canceled: &AtomicBool,
    ) -> Result<Option<Arc<ArchiveEntry>>>;

    /// Opens an entry's decompressed content, positioned at `start`.
    fn open_entry(
        &self,
        backing: &dyn FileBacking,
        entry: &ArchiveEntry,
        start: u64,
        canceled: &AtomicBool,
    ) -> Result<Option<Box<dyn Read + Send>>>;

    /// Rewrites a URL addressing a path *through* the archive file into
    /// one addressing the entry within it
    /// (`…/pkg.zip/a/b` becomes `jar:…/pkg.zip!/a/b`).
    fn rewrite_url(&self, url: &mut String) -> Result<()>;
}

/// The registry an archive-enabled tree consults, in detection order.
pub type FormatRegistry = Arc<Vec<Arc<dyn ArchiveFormat>>>;

/// Every built-in format: ZIP, TAR, GZIP.
pub fn default_formats() -> FormatRegistry {
    Arc::new(vec![
        Arc::new(crate::zip::ZipFormat) as Arc<dyn ArchiveFormat>,
        Arc::new(crate::tar::TarFormat),
        Arc::new(crate::gzip::GzipFormat),
    ])
}

/// The common tail of every `parse_structure`: reuse the existing root
/// when nothing changed, then announce the root's direct children.
pub(crate) fn finish_parse(
    root: ArchiveEntry,
    existing: Option<Arc<ArchiveEntry>>,
    on_child: Option<&mut dyn FnMut(&ArchiveEntry)>,
) -> Arc<ArchiveEntry> {
    let root = match existing {
        Some(old) if *old == root => old,
        _ => Arc::new(root),
    };
    if let Some(f) = on_child {
        for child in root.children() {
            f(child);
        }
    }
    root
}

/// Decodes bytes as latin-1: each byte is its own code point.
pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Reads exactly `magic.len()` bytes from the backing's head and
/// compares. IO trouble during the probe reads as "not an archive".
pub(crate) fn probe_magic(
    backing: &dyn FileBacking,
    magic: &[u8],
    canceled: &AtomicBool,
) -> Result<Option<bool>> {
    let Some(mut reader) = backing.open(0, canceled)? else {
        return Ok(None);
    };
    let mut head = vec![0u8; magic.len()];
    match reader.read_exact(&mut head) {
        Ok(()) => Ok(Some(head == magic)),
        Err(_) => Ok(Some(false)),
    }
}

/// The shared `jar:`-style URL rewrite: finds the archive extension in
/// the URL, prefixes the scheme, and replaces the following separator
/// with `!/`.
pub(crate) fn rewrite_archive_url(url: &mut String, extensions: &[&str]) -> Result<()> {
    let lower = url.to_ascii_lowercase();
    for ext in extensions {
        let needle = format!(".{ext}/");
        if let Some(at) = lower.find(&needle) {
            let boundary = at + needle.len() - 1;
            url.replace_range(boundary..boundary + 1, "!/");
            url.insert_str(0, "jar:");
            return Ok(());
        }
        if lower.ends_with(&format!(".{ext}")) {
            url.push_str("!/");
            url.insert_str(0, "jar:");
            return Ok(());
        }
    }
    Err(Error::InvalidPath(format!(
        "no archive component in URL {url}"
    )))
}
