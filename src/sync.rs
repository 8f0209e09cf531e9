//! Directory synchronization: make a destination tree match a source
//! tree, pair by pair, with a pluggable per-pair policy.
//!
//! The source is the authority. Matching is by name (case sensitivity is
//! the caller's choice); the merge walks the destination's listing order
//! first, with source-only children following in source order. Files
//! copy only when the destination is absent, a directory, or differs in
//! modification time — content is never compared. Destination symbolic
//! links are never touched.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::*;

use crate::backing::*;
use crate::path::concat_path;
use crate::result::*;

/// The transfer buffer each engine allocates once and reuses.
const TRANSFER_BUFFER: usize = 1 << 20;

/// What to do with one source/destination pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Leave both sides alone.
    Ignore,
    /// Remove the destination side.
    Delete,
    /// Make the destination match the source (the default for anything
    /// present in the source).
    Copy,
}

/// Counters accumulated over one synchronization.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncResults {
    pub files_added: u64,
    pub directories_added: u64,
    pub files_deleted: u64,
    pub directories_deleted: u64,
    pub files_updated: u64,
    pub total_files: u64,
    pub total_directories: u64,
    /// Destinations whose timestamp could not be set to the source's.
    pub last_modify_failures: u64,
}

/// Decides an action per pair: source side, destination side; either may
/// be absent (but not both).
pub type SyncPolicy =
    dyn FnMut(Option<&dyn FileBacking>, Option<&dyn FileBacking>) -> SyncAction + Send;

/// Drives ordered diff-and-apply between two trees.
///
/// Not internally synchronized; one engine serves one synchronization at
/// a time.
pub struct SyncEngine {
    case_sensitive: bool,
    policy: Option<Box<SyncPolicy>>,
    buffer: Vec<u8>,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            case_sensitive: true,
            policy: None,
            buffer: vec![0u8; TRANSFER_BUFFER],
        }
    }

    /// Match child names ignoring ASCII case.
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Overrides the default copy/delete decisions.
    pub fn with_policy(mut self, policy: Box<SyncPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Synchronizes `dest` to match `source`. Returns the counters, or
    /// `None` if the cancel flag fired (the destination may be partly
    /// updated).
    pub fn sync(
        &mut self,
        source: &Arc<dyn FileBacking>,
        dest: &Arc<dyn FileBacking>,
        canceled: &AtomicBool,
    ) -> Result<Option<SyncResults>> {
        let mut results = SyncResults::default();
        let path = dest.name().to_owned();
        let finished = self.sync_pair(source, dest, &path, &mut results, canceled)?;
        Ok(finished.then_some(results))
    }

    fn decide(
        &mut self,
        source: Option<&dyn FileBacking>,
        dest: Option<&dyn FileBacking>,
    ) -> SyncAction {
        match &mut self.policy {
            Some(policy) => policy(source, dest),
            None => {
                if source.is_some() {
                    SyncAction::Copy
                } else {
                    SyncAction::Delete
                }
            }
        }
    }

    /// Deletes a destination node, annotating failures with the running
    /// path. A failed delete of a symbolic link is quietly dropped.
    fn delete_dest(
        &mut self,
        dest: &dyn FileBacking,
        path: &str,
        results: &mut SyncResults,
    ) -> Result<()> {
        let mut deleted = DeleteResults::default();
        match dest.delete(&mut deleted) {
            Ok(()) => {}
            Err(e) => {
                if dest.stat().symbolic {
                    debug!("leaving undeletable symlink {path} alone: {e}");
                } else {
                    return Err(e.at(path));
                }
            }
        }
        results.files_deleted += deleted.files_deleted;
        results.directories_deleted += deleted.directories_deleted;
        Ok(())
    }

    fn sync_pair(
        &mut self,
        source: &Arc<dyn FileBacking>,
        dest: &Arc<dyn FileBacking>,
        path: &str,
        results: &mut SyncResults,
        canceled: &AtomicBool,
    ) -> Result<bool> {
        if is_canceled(canceled) {
            return Ok(false);
        }
        let dest_stat = dest.stat();
        if dest_stat.symbolic {
            // Never modified, whatever the source looks like.
            trace!("skipping symlink {path}");
            return Ok(true);
        }
        let source_stat = source.stat();
        if !source_stat.exists {
            // The authority vanished mid-walk; leave the destination be.
            return Ok(true);
        }
        if source_stat.directory {
            self.sync_directory(source, dest, &dest_stat, path, results, canceled)
        } else {
            self.sync_file(source, dest, &source_stat, &dest_stat, path, results, canceled)
        }
    }

    fn sync_directory(
        &mut self,
        source: &Arc<dyn FileBacking>,
        dest: &Arc<dyn FileBacking>,
        dest_stat: &FileStat,
        path: &str,
        results: &mut SyncResults,
        canceled: &AtomicBool,
    ) -> Result<bool> {
        results.total_directories += 1;
        if dest_stat.exists && !dest_stat.directory {
            // A file where a directory belongs.
            self.delete_dest(&**dest, path, results)?;
        }
        if !dest_stat.exists || !dest_stat.directory {
            dest.create(true).map_err(|e| e.at(path))?;
            results.directories_added += 1;
        }

        let Some(dest_children) = list_children(&**dest, canceled)? else {
            return Ok(false);
        };
        let Some(source_children) = list_children(&**source, canceled)? else {
            return Ok(false);
        };
        let case_sensitive = self.case_sensitive;
        let normalize = move |name: &str| {
            if case_sensitive {
                name.to_owned()
            } else {
                name.to_ascii_lowercase()
            }
        };
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (at, child) in source_children.iter().enumerate() {
            by_name.insert(normalize(child.name()), at);
        }
        let mut matched = vec![false; source_children.len()];

        // The destination's order first: matched pairs and
        // destination-only children.
        for dest_child in &dest_children {
            if is_canceled(canceled) {
                return Ok(false);
            }
            let child_path = concat_path(path, dest_child.name());
            let source_child = by_name
                .get(&normalize(dest_child.name()))
                .map(|&at| {
                    matched[at] = true;
                    &source_children[at]
                });
            let action = self.decide(source_child.map(|c| &**c), Some(&**dest_child));
            match action {
                SyncAction::Ignore => {}
                SyncAction::Delete => {
                    self.delete_dest(&**dest_child, &child_path, results)?;
                }
                SyncAction::Copy => {
                    if let Some(source_child) = source_child {
                        let source_child = Arc::clone(source_child);
                        if !self.sync_pair(
                            &source_child,
                            dest_child,
                            &child_path,
                            results,
                            canceled,
                        )? {
                            return Ok(false);
                        }
                    }
                }
            }
        }

        // Then whatever only the source has, in source order.
        for (at, source_child) in source_children.iter().enumerate() {
            if matched[at] {
                continue;
            }
            if is_canceled(canceled) {
                return Ok(false);
            }
            let child_path = concat_path(path, source_child.name());
            let action = self.decide(Some(&**source_child), None);
            match action {
                SyncAction::Ignore | SyncAction::Delete => {}
                SyncAction::Copy => {
                    let dest_child = dest.child_named(source_child.name());
                    if !self.sync_pair(source_child, &dest_child, &child_path, results, canceled)?
                    {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    fn sync_file(
        &mut self,
        source: &Arc<dyn FileBacking>,
        dest: &Arc<dyn FileBacking>,
        source_stat: &FileStat,
        dest_stat: &FileStat,
        path: &str,
        results: &mut SyncResults,
        canceled: &AtomicBool,
    ) -> Result<bool> {
        results.total_files += 1;
        if dest_stat.exists
            && !dest_stat.directory
            && dest_stat.last_modified == source_stat.last_modified
        {
            // Timestamps agree; the content is taken on faith.
            return Ok(true);
        }
        if dest_stat.directory {
            self.delete_dest(&**dest, path, results)?;
        }

        debug!("copying {path}");
        let mut writer = dest.write().map_err(|e| e.at(path))?;
        let copied = copy_content(&**source, &mut *writer, &mut self.buffer, canceled)
            .map_err(|e| e.at(path))?;
        drop(writer);
        if copied.is_none() {
            return Ok(false);
        }
        if dest_stat.exists && !dest_stat.directory {
            results.files_updated += 1;
        } else {
            results.files_added += 1;
        }

        if source_stat.last_modified != 0 && !dest.set_last_modified(source_stat.last_modified) {
            results.last_modify_failures += 1;
        }
        Ok(true)
    }
}
