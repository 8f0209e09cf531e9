//! The archive-enabled decorator: any tree, with archive files
//! transparently presented as directories.
//!
//! Detection is lazy. A wrapped file sits in one of three states:
//! *unchecked* (nobody has looked inside yet), *archive* (a format
//! recognized it and parsed its tree), or *plain* (not an archive, or
//! past the nesting ceiling — never probed again). The unchecked
//! transition runs under the backing's mutex so concurrent traversers
//! parse once.
//!
//! A parsed tree and the delegate's modification time at parse form one
//! snapshot. Revalidation compares the delegate's current mtime at most
//! once per 10 ms; on a mismatch the snapshot is dropped wholesale and
//! every backing derived from it observes the archive as vanished, while
//! readers that already hold the old snapshot finish against it.

use std::io::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::*;

use crate::backing::*;
use crate::entry::ArchiveEntry;
use crate::format::{default_formats, ArchiveFormat, FormatRegistry};
use crate::path::concat_path;
use crate::result::*;

/// How often the delegate's mtime is compared against the snapshot's.
const REVALIDATE_MILLIS: u64 = 10;
/// How many archives a chain may nest before detection stops.
pub const DEFAULT_MAX_DEPTH: usize = 10;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Clone)]
struct Snapshot {
    root: Arc<ArchiveEntry>,
    format: Arc<dyn ArchiveFormat>,
    parse_mtime: u64,
}

enum ArchiveState {
    Unchecked,
    Plain,
    Archive(Snapshot),
}

enum Probe {
    Canceled,
    Plain,
    Archive(Snapshot),
}

struct ArchiveInner {
    delegate: Arc<dyn FileBacking>,
    formats: FormatRegistry,
    /// Archives already crossed on the way here.
    depth: usize,
    max_depth: usize,
    state: Mutex<ArchiveState>,
    last_check: AtomicU64,
}

impl ArchiveInner {
    /// Drops a stale snapshot. Returns true if one was dropped.
    /// Throttled: the delegate is consulted at most once per 10 ms.
    fn revalidate(&self) -> bool {
        let now = now_millis();
        let last = self.last_check.load(Ordering::Relaxed);
        if now.saturating_sub(last) < REVALIDATE_MILLIS {
            return false;
        }
        if self
            .last_check
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            // Someone else is revalidating right now.
            return false;
        }
        let mut state = self.state.lock().unwrap();
        if let ArchiveState::Archive(snapshot) = &*state {
            let current = self.delegate.stat().last_modified;
            if current != snapshot.parse_mtime {
                debug!(
                    "{} changed ({} -> {current}); discarding its parsed tree",
                    self.delegate.name(),
                    snapshot.parse_mtime
                );
                *state = ArchiveState::Unchecked;
                return true;
            }
        }
        false
    }

    /// Could the delegate still turn out to be an archive?
    fn plausible(&self) -> bool {
        if self.depth >= self.max_depth {
            return false;
        }
        let name = self.delegate.name();
        self.formats.iter().any(|f| f.may_be_archive(name))
    }

    /// Resolves the current state, running detection if still unchecked.
    fn probe(&self, canceled: &AtomicBool) -> Result<Probe> {
        self.revalidate();
        let mut state = self.state.lock().unwrap();
        match &*state {
            ArchiveState::Plain => return Ok(Probe::Plain),
            ArchiveState::Archive(snapshot) => return Ok(Probe::Archive(snapshot.clone())),
            ArchiveState::Unchecked => {}
        }
        if self.depth >= self.max_depth {
            debug!(
                "archive check skipped for {}: {} archives deep already",
                self.delegate.name(),
                self.depth
            );
            *state = ArchiveState::Plain;
            return Ok(Probe::Plain);
        }
        let stat = self.delegate.stat();
        if !stat.exists || stat.directory {
            // Not even a candidate; stay unchecked in case it appears.
            return Ok(Probe::Plain);
        }
        let name = self.delegate.name();
        for format in self.formats.iter() {
            if !format.may_be_archive(name) {
                continue;
            }
            match format.is_archive(&*self.delegate, canceled) {
                Ok(None) => return Ok(Probe::Canceled),
                Ok(Some(false)) => continue,
                Ok(Some(true)) => {}
                Err(e) => {
                    // An unreadable head is indistinguishable from "not
                    // an archive" for our purposes.
                    debug!("probing {name} as {}: {e}", format.label());
                    continue;
                }
            }
            let parse_mtime = stat.last_modified;
            match format.parse_structure(&*self.delegate, None, None, None, canceled) {
                Ok(None) => return Ok(Probe::Canceled),
                Ok(Some(root)) => {
                    trace!("parsed {name} as {}", format.label());
                    let snapshot = Snapshot {
                        root,
                        format: Arc::clone(format),
                        parse_mtime,
                    };
                    *state = ArchiveState::Archive(snapshot.clone());
                    return Ok(Probe::Archive(snapshot));
                }
                Err(e) => {
                    warn!("{name} looked like {} but failed to parse: {e}", format.label());
                    continue;
                }
            }
        }
        *state = ArchiveState::Plain;
        Ok(Probe::Plain)
    }
}

/// Wraps a backing so archive files under it read as directories.
pub struct ArchiveEnabledBacking {
    inner: Arc<ArchiveInner>,
}

impl ArchiveEnabledBacking {
    pub fn new(delegate: Arc<dyn FileBacking>, formats: FormatRegistry) -> Self {
        Self::at_depth(delegate, formats, 0, DEFAULT_MAX_DEPTH)
    }

    /// Wraps with the built-in format registry.
    pub fn with_default_formats(delegate: Arc<dyn FileBacking>) -> Self {
        Self::new(delegate, default_formats())
    }

    /// Caps how deep nested archives are still detected.
    pub fn with_max_depth(delegate: Arc<dyn FileBacking>, formats: FormatRegistry, max_depth: usize) -> Self {
        Self::at_depth(delegate, formats, 0, max_depth)
    }

    fn at_depth(
        delegate: Arc<dyn FileBacking>,
        formats: FormatRegistry,
        depth: usize,
        max_depth: usize,
    ) -> Self {
        Self {
            inner: Arc::new(ArchiveInner {
                delegate,
                formats,
                depth,
                max_depth,
                state: Mutex::new(ArchiveState::Unchecked),
                last_check: AtomicU64::new(0),
            }),
        }
    }

    /// A sibling wrapper for a delegate child: same depth, same formats.
    fn wrap_child(&self, child: Arc<dyn FileBacking>) -> Arc<dyn FileBacking> {
        Arc::new(Self::at_depth(
            child,
            Arc::clone(&self.inner.formats),
            self.inner.depth,
            self.inner.max_depth,
        ))
    }

    /// A wrapper for an entry inside this archive: one level deeper.
    fn wrap_entry(&self, segments: Vec<String>) -> Arc<dyn FileBacking> {
        let entry = EntryBacking {
            archive: Arc::clone(&self.inner),
            segments,
        };
        Arc::new(Self::at_depth(
            Arc::new(entry),
            Arc::clone(&self.inner.formats),
            self.inner.depth + 1,
            self.inner.max_depth,
        ))
    }
}

impl FileBacking for ArchiveEnabledBacking {
    fn name(&self) -> &str {
        self.inner.delegate.name()
    }

    fn path(&self) -> String {
        self.inner.delegate.path()
    }

    fn stat(&self) -> FileStat {
        let stat = self.inner.delegate.stat();
        if !stat.exists || stat.directory {
            return stat;
        }
        self.inner.revalidate();
        let plausible = {
            let state = self.inner.state.lock().unwrap();
            match &*state {
                ArchiveState::Archive(_) => true,
                ArchiveState::Unchecked => self.inner.plausible(),
                ArchiveState::Plain => false,
            }
        };
        if plausible {
            // Even before parsing, a plausible archive reports as a
            // directory so lazy callers know to descend.
            FileStat {
                directory: true,
                length: 0,
                writable: false,
                ..stat
            }
        } else {
            stat
        }
    }

    fn check(&self) -> bool {
        let invalidated = self.inner.revalidate();
        self.inner.delegate.check() && !invalidated
    }

    fn list(
        &self,
        on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        canceled: &AtomicBool,
    ) -> Result<bool> {
        let stat = self.inner.delegate.stat();
        if stat.directory {
            let mut children = Vec::new();
            if !self
                .inner
                .delegate
                .list(&mut |child| children.push(child), canceled)?
            {
                return Ok(false);
            }
            for child in children {
                on_child(self.wrap_child(child));
            }
            return Ok(true);
        }
        if !stat.exists {
            return Ok(true);
        }
        match self.inner.probe(canceled)? {
            Probe::Canceled => Ok(false),
            Probe::Plain => Ok(true),
            Probe::Archive(snapshot) => {
                for child in snapshot.root.children() {
                    if is_canceled(canceled) {
                        return Ok(false);
                    }
                    on_child(self.wrap_entry(vec![child.name().to_owned()]));
                }
                Ok(true)
            }
        }
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        let stat = self.inner.delegate.stat();
        if !stat.exists || stat.directory {
            return self.wrap_child(self.inner.delegate.child_named(name));
        }
        // A file with children can only be an archive; resolve lazily so
        // this never blocks on a parse.
        self.wrap_entry(vec![name.to_owned()])
    }

    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        self.inner.delegate.open(start, canceled)
    }

    fn create(&self, directory: bool) -> Result<()> {
        self.inner.delegate.create(directory)
    }

    fn delete(&self, results: &mut DeleteResults) -> Result<()> {
        self.inner.delegate.delete(results)
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        self.inner.delegate.write()
    }

    fn set_last_modified(&self, millis: u64) -> bool {
        self.inner.delegate.set_last_modified(millis)
    }

    fn set_attribute(&self, attribute: Attribute, value: bool, owner_only: bool) -> bool {
        self.inner.delegate.set_attribute(attribute, value, owner_only)
    }

    fn move_to(&self, new_path: &str) -> Result<()> {
        self.inner.delegate.move_to(new_path)
    }

    fn to_url(&self, out: &mut String) -> Result<()> {
        self.inner.delegate.to_url(out)
    }
}

/// A node inside a parsed archive. Holds only its path; every operation
/// resolves against the archive's current snapshot, so an invalidated
/// parse makes all derived nodes read as missing (dangling).
struct EntryBacking {
    archive: Arc<ArchiveInner>,
    segments: Vec<String>,
}

impl EntryBacking {
    fn snapshot(&self) -> Option<Snapshot> {
        match self.archive.probe(&NOT_CANCELED) {
            Ok(Probe::Archive(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    fn joined(&self) -> String {
        self.segments.join("/")
    }
}

impl FileBacking for EntryBacking {
    fn name(&self) -> &str {
        self.segments.last().expect("entry backings have a name")
    }

    fn path(&self) -> String {
        concat_path(&self.archive.delegate.path(), &self.joined())
    }

    fn stat(&self) -> FileStat {
        let Some(snapshot) = self.snapshot() else {
            return FileStat::missing();
        };
        match snapshot.root.resolve(&self.joined()) {
            Some(entry) if entry.is_dir() => FileStat::dir(entry.last_modified()),
            Some(entry) => FileStat::file(entry.last_modified(), entry.length()),
            None => FileStat::missing(),
        }
    }

    fn check(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Children come back as bare entry backings, like every other
    /// variant; the archive-enabled wrapper is the one place that wraps.
    fn list(
        &self,
        on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        canceled: &AtomicBool,
    ) -> Result<bool> {
        let Some(snapshot) = self.snapshot() else {
            return Ok(true);
        };
        let Some(entry) = snapshot.root.resolve(&self.joined()) else {
            return Ok(true);
        };
        for child in entry.children() {
            if is_canceled(canceled) {
                return Ok(false);
            }
            let mut segments = self.segments.clone();
            segments.push(child.name().to_owned());
            on_child(Arc::new(EntryBacking {
                archive: Arc::clone(&self.archive),
                segments,
            }));
        }
        Ok(true)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Arc::new(EntryBacking {
            archive: Arc::clone(&self.archive),
            segments,
        })
    }

    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        let Some(snapshot) = self.snapshot() else {
            return Err(Error::NotFound(self.path()));
        };
        let Some(entry) = snapshot.root.resolve(&self.joined()) else {
            return Err(Error::NotFound(self.path()));
        };
        if entry.is_dir() {
            return Err(Error::Unsupported("cannot read an archive directory"));
        }
        snapshot
            .format
            .open_entry(&*self.archive.delegate, entry, start, canceled)
    }

    fn create(&self, _directory: bool) -> Result<()> {
        Err(Error::Unsupported("cannot modify archive entries"))
    }

    fn delete(&self, _results: &mut DeleteResults) -> Result<()> {
        Err(Error::Unsupported("cannot modify archive entries"))
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        Err(Error::Unsupported("cannot modify archive entries"))
    }

    fn set_last_modified(&self, _millis: u64) -> bool {
        false
    }

    fn set_attribute(&self, _attribute: Attribute, _value: bool, _owner_only: bool) -> bool {
        false
    }

    fn move_to(&self, _new_path: &str) -> Result<()> {
        Err(Error::Unsupported("cannot modify archive entries"))
    }

    fn to_url(&self, out: &mut String) -> Result<()> {
        let Some(snapshot) = self.snapshot() else {
            return Err(Error::Unsupported("no URL without a parsed archive"));
        };
        let mut url = String::new();
        self.archive.delegate.to_url(&mut url)?;
        url.push('/');
        url.push_str(&self.joined());
        snapshot.format.rewrite_url(&mut url)?;
        out.push_str(&url);
        Ok(())
    }
}
