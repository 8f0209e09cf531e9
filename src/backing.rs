//! The file-backing capability: one interface over every kind of node in
//! a virtual file tree.
//!
//! A backing is a value-like handle for one file or directory. It may
//! refer to something that does not exist — `stat()` reports existence
//! rather than failing, and `child_named()` always returns a handle.
//!
//! Long-running operations take a cancel flag owned by the caller and
//! poll it between iterations. Cancellation is never an error: canceled
//! operations report `Ok(None)` or `Ok(false)`.

use std::io::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::path::{concat_path, split_path};
use crate::result::*;

/// Length reported when a backing's size cannot be known without reading
/// it to the end (GZIP interiors, for one).
pub const LENGTH_UNKNOWN: u64 = u64::MAX;

/// A cancel flag that never fires, for callers that don't need one.
pub static NOT_CANCELED: AtomicBool = AtomicBool::new(false);

pub(crate) fn is_canceled(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}

/// A point-in-time description of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub exists: bool,
    pub directory: bool,
    /// Milliseconds since the epoch; 0 when unknown.
    pub last_modified: u64,
    /// Bytes; 0 for directories, [`LENGTH_UNKNOWN`] when unknowable.
    pub length: u64,
    pub hidden: bool,
    pub readable: bool,
    pub writable: bool,
    pub symbolic: bool,
}

impl FileStat {
    pub fn missing() -> Self {
        Self {
            exists: false,
            directory: false,
            last_modified: 0,
            length: 0,
            hidden: false,
            readable: false,
            writable: false,
            symbolic: false,
        }
    }

    pub fn file(last_modified: u64, length: u64) -> Self {
        Self {
            exists: true,
            directory: false,
            last_modified,
            length,
            hidden: false,
            readable: true,
            writable: false,
            symbolic: false,
        }
    }

    pub fn dir(last_modified: u64) -> Self {
        Self {
            exists: true,
            directory: true,
            last_modified,
            length: 0,
            hidden: false,
            readable: true,
            writable: false,
            symbolic: false,
        }
    }
}

/// The boolean attributes a backing may allow changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Hidden,
    Readable,
    Writable,
}

/// Counters filled in by recursive [`FileBacking::delete`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResults {
    pub files_deleted: u64,
    pub directories_deleted: u64,
}

/// The capability every tree node provides.
pub trait FileBacking: Send + Sync {
    /// The last path segment.
    fn name(&self) -> &str;

    /// The root name concatenated with every ancestor's name by `/`.
    fn path(&self) -> String;

    /// Never fails; any underlying failure collapses to "does not exist".
    fn stat(&self) -> FileStat;

    /// True while cached state derived from this backing is still valid.
    fn check(&self) -> bool {
        true
    }

    /// Enumerates children in order, invoking `on_child` for each.
    /// Returns `Ok(false)` if canceled part way.
    fn list(
        &self,
        on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        canceled: &AtomicBool,
    ) -> Result<bool>;

    /// A handle for the named child, whether or not it exists.
    fn child_named(&self, name: &str) -> Arc<dyn FileBacking>;

    /// Opens the content for reading, positioned at `start`.
    /// `Ok(None)` iff canceled.
    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>>;

    /// Materializes this node if absent; fails if it exists as the other
    /// kind.
    fn create(&self, directory: bool) -> Result<()>;

    /// Recursively deletes, counting what went.
    fn delete(&self, results: &mut DeleteResults) -> Result<()>;

    /// Opens a truncating write stream.
    fn write(&self) -> Result<Box<dyn Write + Send>>;

    /// Returns true if the timestamp change took effect.
    fn set_last_modified(&self, millis: u64) -> bool;

    /// Returns true if the attribute change took effect.
    fn set_attribute(&self, attribute: Attribute, value: bool, owner_only: bool) -> bool;

    /// Renames within the same tree, atomically where the backing can.
    fn move_to(&self, new_path: &str) -> Result<()>;

    /// Appends a canonical URL for this node.
    fn to_url(&self, out: &mut String) -> Result<()>;
}

/// Walks `child_named` across the segments of a relative path.
/// An empty path resolves to the root itself.
pub fn resolve(root: &Arc<dyn FileBacking>, path: &str) -> Arc<dyn FileBacking> {
    let mut current = Arc::clone(root);
    for seg in split_path(path) {
        let next = current.child_named(seg);
        current = next;
    }
    current
}

/// Pre-order traversal of everything under `root` (excluding `root`
/// itself), handing each backing and its `/`-relative path to `for_each`.
/// Returns `Ok(false)` if canceled.
pub fn visit_all(
    root: &dyn FileBacking,
    for_each: &mut dyn FnMut(&dyn FileBacking, &str) -> Result<()>,
    canceled: &AtomicBool,
) -> Result<bool> {
    fn walk(
        node: &dyn FileBacking,
        prefix: &str,
        for_each: &mut dyn FnMut(&dyn FileBacking, &str) -> Result<()>,
        canceled: &AtomicBool,
    ) -> Result<bool> {
        let mut children: Vec<Arc<dyn FileBacking>> = Vec::new();
        if !node.list(&mut |child| children.push(child), canceled)? {
            return Ok(false);
        }
        for child in children {
            if is_canceled(canceled) {
                return Ok(false);
            }
            let relative = concat_path(prefix, child.name());
            for_each(&*child, &relative)?;
            if child.stat().directory && !walk(&*child, &relative, for_each, canceled)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
    walk(root, "", for_each, canceled)
}

/// Collects a listing into a vector, for callers that want it all.
pub fn list_children(
    backing: &dyn FileBacking,
    canceled: &AtomicBool,
) -> Result<Option<Vec<Arc<dyn FileBacking>>>> {
    let mut children = Vec::new();
    if backing.list(&mut |child| children.push(child), canceled)? {
        Ok(Some(children))
    } else {
        Ok(None)
    }
}

/// Streams a backing's content into a writer through the supplied buffer,
/// checking the cancel flag between refills. Returns bytes copied, or
/// `None` if canceled.
pub fn copy_content(
    source: &dyn FileBacking,
    writer: &mut dyn Write,
    buffer: &mut [u8],
    canceled: &AtomicBool,
) -> Result<Option<u64>> {
    let Some(mut reader) = source.open(0, canceled)? else {
        return Ok(None);
    };
    let mut total = 0u64;
    loop {
        if is_canceled(canceled) {
            return Ok(None);
        }
        let n = reader.read(buffer)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }
    Ok(Some(total))
}
