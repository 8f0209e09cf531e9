//! The in-memory directory tree a parsed archive becomes.
//!
//! Directory children stay sorted by a numerically-tolerant name
//! comparison (digit runs compare as integers, so `file2` sorts before
//! `file10`), which keeps lookups binary-searchable.

use std::cmp::Ordering;

use crate::path::{is_separator, split_path};

/// Compares names with embedded digit runs treated as integers.
pub fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let mut ac = a.chars().peekable();
    let mut bc = b.chars().peekable();
    loop {
        match (ac.peek().copied(), bc.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let mut run_a = String::new();
                    while let Some(&d) = ac.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        run_a.push(d);
                        ac.next();
                    }
                    let mut run_b = String::new();
                    while let Some(&d) = bc.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        run_b.push(d);
                        bc.next();
                    }
                    let trim_a = run_a.trim_start_matches('0');
                    let trim_b = run_b.trim_start_matches('0');
                    let by_value = trim_a
                        .len()
                        .cmp(&trim_b.len())
                        .then_with(|| trim_a.cmp(trim_b));
                    if by_value != Ordering::Equal {
                        return by_value;
                    }
                    // Equal values: more leading zeros sorts later.
                    if run_a.len() != run_b.len() {
                        return run_a.len().cmp(&run_b.len());
                    }
                } else {
                    if x != y {
                        return x.cmp(&y);
                    }
                    ac.next();
                    bc.next();
                }
            }
        }
    }
}

/// One node in a parsed archive: a file with a record position, or a
/// directory with sorted children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    name: String,
    /// Byte position of the entry's local record in the archive, when
    /// the format supports random access to it.
    position: Option<u64>,
    length: u64,
    last_modified: u64,
    directory: bool,
    children: Vec<ArchiveEntry>,
}

impl ArchiveEntry {
    /// The unnamed directory an archive's contents hang from.
    pub fn root() -> Self {
        Self::dir("", 0)
    }

    pub fn dir(name: &str, last_modified: u64) -> Self {
        Self {
            name: name.to_owned(),
            position: None,
            length: 0,
            last_modified,
            directory: true,
            children: Vec::new(),
        }
    }

    pub fn file(name: &str, position: Option<u64>, length: u64, last_modified: u64) -> Self {
        Self {
            name: name.to_owned(),
            position,
            length,
            last_modified,
            directory: false,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Option<u64> {
        self.position
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    pub fn is_dir(&self) -> bool {
        self.directory
    }

    pub fn children(&self) -> &[ArchiveEntry] {
        &self.children
    }

    /// Binary search among this directory's children.
    pub fn child(&self, name: &str) -> Option<&ArchiveEntry> {
        let at = self
            .children
            .binary_search_by(|c| numeric_cmp(&c.name, name))
            .ok()?;
        Some(&self.children[at])
    }

    /// Walks a `/`-separated path down from this node.
    pub fn resolve(&self, path: &str) -> Option<&ArchiveEntry> {
        let mut current = self;
        for seg in split_path(path) {
            current = current.child(seg)?;
        }
        Some(current)
    }

    fn ensure_dir(&mut self, name: &str, last_modified: u64) -> &mut ArchiveEntry {
        let at = match self
            .children
            .binary_search_by(|c| numeric_cmp(&c.name, name))
        {
            Ok(at) => {
                if last_modified != 0 && self.children[at].last_modified == 0 {
                    self.children[at].last_modified = last_modified;
                }
                at
            }
            Err(at) => {
                self.children.insert(at, ArchiveEntry::dir(name, last_modified));
                at
            }
        };
        &mut self.children[at]
    }

    /// Inserts an entry at its slash-split path, fabricating intermediate
    /// directories as needed. A trailing separator marks a directory.
    /// Returns a reference to the inserted (or pre-existing) node.
    pub fn insert_path(
        &mut self,
        path: &str,
        position: Option<u64>,
        length: u64,
        last_modified: u64,
    ) -> &ArchiveEntry {
        let is_dir = path.ends_with(is_separator);
        let segments: Vec<&str> = split_path(path).collect();
        let mut current = self;
        let last = segments.len().saturating_sub(1);
        for (i, seg) in segments.iter().enumerate() {
            if i < last || is_dir {
                let mtime = if i == last { last_modified } else { 0 };
                current = current.ensure_dir(seg, mtime);
            } else {
                let at = match current
                    .children
                    .binary_search_by(|c| numeric_cmp(&c.name, seg))
                {
                    Ok(at) => {
                        // A duplicate record: the later one wins.
                        current.children[at] =
                            ArchiveEntry::file(seg, position, length, last_modified);
                        at
                    }
                    Err(at) => {
                        current.children.insert(
                            at,
                            ArchiveEntry::file(seg, position, length, last_modified),
                        );
                        at
                    }
                };
                return &current.children[at];
            }
        }
        current
    }

    /// Pre-order traversal handing each descendant and its relative path
    /// to `for_each`.
    pub fn visit(&self, for_each: &mut dyn FnMut(&ArchiveEntry, &str)) {
        fn walk(node: &ArchiveEntry, prefix: &str, for_each: &mut dyn FnMut(&ArchiveEntry, &str)) {
            for child in &node.children {
                let relative = crate::path::concat_path(prefix, &child.name);
                for_each(child, &relative);
                walk(child, &relative, for_each);
            }
        }
        walk(self, "", for_each);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn digit_runs_compare_as_integers() {
        assert_eq!(numeric_cmp("file2", "file10"), Ordering::Less);
        assert_eq!(numeric_cmp("file10", "file2"), Ordering::Greater);
        assert_eq!(numeric_cmp("file2", "file2"), Ordering::Equal);
        assert_eq!(numeric_cmp("a", "b"), Ordering::Less);
        assert_eq!(numeric_cmp("x2y3", "x2y10"), Ordering::Less);
        assert_eq!(numeric_cmp("abc", "abcd"), Ordering::Less);
    }

    #[test]
    fn leading_zeros_break_value_ties() {
        assert_eq!(numeric_cmp("a2", "a02"), Ordering::Less);
        assert_eq!(numeric_cmp("a02", "a2"), Ordering::Greater);
    }

    #[test]
    fn insert_builds_intermediate_directories() {
        let mut root = ArchiveEntry::root();
        root.insert_path("dir/sub/a.txt", Some(10), 3, 1000);
        root.insert_path("dir/b.txt", Some(20), 5, 2000);
        root.insert_path("dir/", None, 0, 3000);

        let dir = root.child("dir").unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.last_modified(), 3000);
        assert_eq!(dir.children().len(), 2);
        let a = root.resolve("dir/sub/a.txt").unwrap();
        assert_eq!(a.length(), 3);
        assert_eq!(a.position(), Some(10));
        assert!(root.resolve("dir/missing").is_none());
    }

    #[test]
    fn children_stay_in_numeric_order() {
        let mut root = ArchiveEntry::root();
        for name in ["f10", "f2", "f1", "f20"] {
            root.insert_path(name, None, 0, 0);
        }
        let names: Vec<&str> = root.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["f1", "f2", "f10", "f20"]);
        assert!(root.child("f10").is_some());
    }

    #[test]
    fn visit_is_pre_order() {
        let mut root = ArchiveEntry::root();
        root.insert_path("a/b.txt", None, 0, 0);
        root.insert_path("c.txt", None, 1, 0);
        let mut seen = Vec::new();
        root.visit(&mut |_, path| seen.push(path.to_owned()));
        assert_eq!(seen, ["a", "a/b.txt", "c.txt"]);
    }
}
