//! Tree combinators: overlay several trees, promote a sub-path to a
//! root, or present a blob of bytes as a one-file tree.

use std::io;
use std::io::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::backing::*;
use crate::path::concat_path;
use crate::result::*;

/// A permanently absent node. Handed out where a tree can name a child
/// but has nothing behind the name; its own children dangle the same way.
#[derive(Debug, Clone)]
pub struct MissingBacking {
    path: String,
}

impl MissingBacking {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

impl FileBacking for MissingBacking {
    fn name(&self) -> &str {
        crate::path::file_name(&self.path)
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn stat(&self) -> FileStat {
        FileStat::missing()
    }

    fn list(
        &self,
        _on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        _canceled: &AtomicBool,
    ) -> Result<bool> {
        Ok(true)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        Arc::new(MissingBacking::new(concat_path(&self.path, name)))
    }

    fn open(&self, _start: u64, _canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        Err(Error::NotFound(self.path.clone()))
    }

    fn create(&self, _directory: bool) -> Result<()> {
        Err(Error::Unsupported("nothing can be created here"))
    }

    fn delete(&self, _results: &mut DeleteResults) -> Result<()> {
        Ok(())
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        Err(Error::Unsupported("nothing can be written here"))
    }

    fn set_last_modified(&self, _millis: u64) -> bool {
        false
    }

    fn set_attribute(&self, _attribute: Attribute, _value: bool, _owner_only: bool) -> bool {
        false
    }

    fn move_to(&self, _new_path: &str) -> Result<()> {
        Err(Error::Unsupported("nothing to move"))
    }

    fn to_url(&self, _out: &mut String) -> Result<()> {
        Err(Error::Unsupported("no URL for an absent file"))
    }
}

/// An ordered overlay of peer backings presented as one node.
///
/// The first source that exists answers reads and stats. Listings yield
/// each child name once, in the order first seen across the sources.
pub struct CombinedBacking {
    name: String,
    /// The overlay root's name plus every ancestor's name, `/`-joined.
    prefix: String,
    sources: Vec<Arc<dyn FileBacking>>,
}

impl CombinedBacking {
    pub fn new(name: &str, sources: Vec<Arc<dyn FileBacking>>) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::Bounds(
                "a combined backing needs at least one source".into(),
            ));
        }
        Ok(Self {
            name: name.to_owned(),
            prefix: name.to_owned(),
            sources,
        })
    }

    fn first_existing(&self) -> Option<&Arc<dyn FileBacking>> {
        self.sources.iter().find(|s| s.stat().exists)
    }
}

impl FileBacking for CombinedBacking {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> String {
        self.prefix.clone()
    }

    fn stat(&self) -> FileStat {
        match self.first_existing() {
            Some(source) => source.stat(),
            None => FileStat::missing(),
        }
    }

    fn check(&self) -> bool {
        self.sources.iter().all(|s| s.check())
    }

    fn list(
        &self,
        on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        canceled: &AtomicBool,
    ) -> Result<bool> {
        let mut seen: Vec<String> = Vec::new();
        for source in &self.sources {
            let mut names: Vec<String> = Vec::new();
            if !source.list(&mut |child| names.push(child.name().to_owned()), canceled)? {
                return Ok(false);
            }
            for name in names {
                if is_canceled(canceled) {
                    return Ok(false);
                }
                if seen.iter().any(|s| s == &name) {
                    continue;
                }
                seen.push(name.clone());
                on_child(self.child_named(&name));
            }
        }
        Ok(true)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        let children = self
            .sources
            .iter()
            .map(|s| s.child_named(name))
            .collect::<Vec<_>>();
        Arc::new(CombinedBacking {
            name: name.to_owned(),
            prefix: concat_path(&self.prefix, name),
            sources: children,
        })
    }

    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        match self.first_existing() {
            Some(source) => source.open(start, canceled),
            None => Err(Error::NotFound(self.prefix.clone())),
        }
    }

    fn create(&self, directory: bool) -> Result<()> {
        self.sources[0].create(directory)
    }

    fn delete(&self, results: &mut DeleteResults) -> Result<()> {
        // Deleting from the overlay means deleting everywhere,
        // or the name just resurfaces from a lower layer.
        for source in &self.sources {
            if source.stat().exists {
                source.delete(results)?;
            }
        }
        Ok(())
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        let mut last = Error::Unsupported("no writable source");
        for source in &self.sources {
            match source.write() {
                Ok(writer) => return Ok(writer),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    fn set_last_modified(&self, millis: u64) -> bool {
        match self.first_existing() {
            Some(source) => source.set_last_modified(millis),
            None => false,
        }
    }

    fn set_attribute(&self, attribute: Attribute, value: bool, owner_only: bool) -> bool {
        match self.first_existing() {
            Some(source) => source.set_attribute(attribute, value, owner_only),
            None => false,
        }
    }

    fn move_to(&self, _new_path: &str) -> Result<()> {
        Err(Error::Unsupported("cannot move an overlay"))
    }

    fn to_url(&self, out: &mut String) -> Result<()> {
        match self.first_existing() {
            Some(source) => source.to_url(out),
            None => self.sources[0].to_url(out),
        }
    }
}

/// A sub-path of another tree promoted to a root of its own.
///
/// Operations delegate to the resolved target; only the reported paths
/// are synthetic.
pub struct SubBacking {
    inner: Arc<dyn FileBacking>,
    prefix: String,
}

impl SubBacking {
    pub fn new(target: &Arc<dyn FileBacking>, sub_path: &str) -> Self {
        Self {
            inner: resolve(target, sub_path),
            prefix: sub_path.trim_matches(crate::path::is_separator).to_owned(),
        }
    }

    fn wrap(&self, child: Arc<dyn FileBacking>) -> Arc<dyn FileBacking> {
        let prefix = concat_path(&self.prefix, child.name());
        Arc::new(SubBacking {
            inner: child,
            prefix,
        })
    }
}

impl FileBacking for SubBacking {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn path(&self) -> String {
        self.prefix.clone()
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
        let mut children = Vec::new();
        if !self.inner.list(&mut |child| children.push(child), canceled)? {
            return Ok(false);
        }
        for child in children {
            on_child(self.wrap(child));
        }
        Ok(true)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        self.wrap(self.inner.child_named(name))
    }

    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
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

    fn set_attribute(&self, attribute: Attribute, value: bool, owner_only: bool) -> bool {
        self.inner.set_attribute(attribute, value, owner_only)
    }

    fn move_to(&self, new_path: &str) -> Result<()> {
        self.inner.move_to(new_path)
    }

    fn to_url(&self, out: &mut String) -> Result<()> {
        self.inner.to_url(out)
    }
}

/// A reader over shared bytes.
struct BlobReader {
    data: Arc<Vec<u8>>,
    at: usize,
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.at.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.at += n;
        Ok(n)
    }
}

/// A single in-memory blob presented as a read-only file.
pub struct SyntheticFile {
    name: String,
    data: Arc<Vec<u8>>,
    last_modified: u64,
}

impl SyntheticFile {
    pub fn new(name: &str, data: Vec<u8>, last_modified: u64) -> Self {
        Self {
            name: name.to_owned(),
            data: Arc::new(data),
            last_modified,
        }
    }
}

impl FileBacking for SyntheticFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> String {
        self.name.clone()
    }

    fn stat(&self) -> FileStat {
        FileStat::file(self.last_modified, self.data.len() as u64)
    }

    fn list(
        &self,
        _on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        _canceled: &AtomicBool,
    ) -> Result<bool> {
        Ok(true)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        Arc::new(MissingBacking::new(concat_path(&self.name, name)))
    }

    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        if is_canceled(canceled) {
            return Ok(None);
        }
        Ok(Some(Box::new(BlobReader {
            data: Arc::clone(&self.data),
            at: start as usize,
        })))
    }

    fn create(&self, directory: bool) -> Result<()> {
        if directory {
            return Err(Error::Unsupported("synthetic files are not directories"));
        }
        Ok(())
    }

    fn delete(&self, _results: &mut DeleteResults) -> Result<()> {
        Err(Error::Unsupported("synthetic files are read-only"))
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        Err(Error::Unsupported("synthetic files are read-only"))
    }

    fn set_last_modified(&self, _millis: u64) -> bool {
        false
    }

    fn set_attribute(&self, _attribute: Attribute, _value: bool, _owner_only: bool) -> bool {
        false
    }

    fn move_to(&self, _new_path: &str) -> Result<()> {
        Err(Error::Unsupported("synthetic files are read-only"))
    }

    fn to_url(&self, _out: &mut String) -> Result<()> {
        Err(Error::Unsupported("synthetic files have no URL"))
    }
}

/// A read-only directory grouping other backings, in insertion order.
pub struct SyntheticDir {
    name: String,
    children: Vec<Arc<dyn FileBacking>>,
    last_modified: u64,
}

impl SyntheticDir {
    pub fn new(name: &str, children: Vec<Arc<dyn FileBacking>>, last_modified: u64) -> Self {
        Self {
            name: name.to_owned(),
            children,
            last_modified,
        }
    }
}

impl FileBacking for SyntheticDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> String {
        self.name.clone()
    }

    fn stat(&self) -> FileStat {
        FileStat::dir(self.last_modified)
    }

    fn list(
        &self,
        on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        canceled: &AtomicBool,
    ) -> Result<bool> {
        for child in &self.children {
            if is_canceled(canceled) {
                return Ok(false);
            }
            on_child(Arc::clone(child));
        }
        Ok(true)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        for child in &self.children {
            if child.name() == name {
                return Arc::clone(child);
            }
        }
        Arc::new(MissingBacking::new(concat_path(&self.name, name)))
    }

    fn open(&self, _start: u64, _canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        Err(Error::Unsupported("cannot read a directory"))
    }

    fn create(&self, directory: bool) -> Result<()> {
        if !directory {
            return Err(Error::Unsupported("synthetic directories are read-only"));
        }
        Ok(())
    }

    fn delete(&self, _results: &mut DeleteResults) -> Result<()> {
        Err(Error::Unsupported("synthetic directories are read-only"))
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        Err(Error::Unsupported("synthetic directories are read-only"))
    }

    fn set_last_modified(&self, _millis: u64) -> bool {
        false
    }

    fn set_attribute(&self, _attribute: Attribute, _value: bool, _owner_only: bool) -> bool {
        false
    }

    fn move_to(&self, _new_path: &str) -> Result<()> {
        Err(Error::Unsupported("synthetic directories are read-only"))
    }

    fn to_url(&self, _out: &mut String) -> Result<()> {
        Err(Error::Unsupported("synthetic directories have no URL"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn blob(name: &str, text: &str) -> Arc<dyn FileBacking> {
        Arc::new(SyntheticFile::new(name, text.as_bytes().to_vec(), 1000))
    }

    fn read_all(backing: &dyn FileBacking) -> String {
        let mut reader = backing.open(0, &NOT_CANCELED).unwrap().unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn first_source_wins() {
        let a: Arc<dyn FileBacking> =
            Arc::new(SyntheticDir::new("a", vec![blob("x", "1")], 0));
        let b: Arc<dyn FileBacking> = Arc::new(SyntheticDir::new(
            "b",
            vec![blob("x", "2"), blob("y", "3")],
            0,
        ));
        let combined = CombinedBacking::new("root", vec![a, b]).unwrap();

        let mut names = Vec::new();
        combined
            .list(&mut |child| names.push(child.name().to_owned()), &NOT_CANCELED)
            .unwrap();
        assert_eq!(names, ["x", "y"]);

        assert_eq!(read_all(&*combined.child_named("x")), "1");
        assert_eq!(read_all(&*combined.child_named("y")), "3");
        assert!(!combined.child_named("z").stat().exists);

        // Paths accumulate from the overlay root down.
        assert_eq!(combined.child_named("x").path(), "root/x");
        assert_eq!(
            combined.child_named("a").child_named("b").path(),
            "root/a/b"
        );
    }

    #[test]
    fn empty_overlay_is_rejected() {
        assert!(CombinedBacking::new("root", Vec::new()).is_err());
    }

    #[test]
    fn sub_backing_promotes_a_subtree() {
        let tree: Arc<dyn FileBacking> = Arc::new(SyntheticDir::new(
            "top",
            vec![Arc::new(SyntheticDir::new(
                "inner",
                vec![blob("leaf.txt", "deep")],
                0,
            ))],
            0,
        ));
        let sub = SubBacking::new(&tree, "inner");
        assert!(sub.stat().directory);
        let leaf = sub.child_named("leaf.txt");
        assert_eq!(leaf.path(), "inner/leaf.txt");
        assert_eq!(read_all(&*leaf), "deep");
    }

    #[test]
    fn missing_children_dangle() {
        let missing = MissingBacking::new("gone".into());
        let deeper = missing.child_named("a").child_named("b");
        assert!(!deeper.stat().exists);
        assert_eq!(deeper.path(), "gone/a/b");
        assert!(deeper.open(0, &NOT_CANCELED).is_err());
    }

    #[test]
    fn blob_reads_from_offset() {
        let file = SyntheticFile::new("f", b"hello world".to_vec(), 0);
        let mut reader = file.open(6, &NOT_CANCELED).unwrap().unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "world");
    }
}
