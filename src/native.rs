//! A file backing over the OS file system.

use std::fs;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use camino::{Utf8Path, Utf8PathBuf};
use filetime::FileTime;
use log::*;

use crate::backing::*;
use crate::result::*;

/// Milliseconds since the epoch, or 0 for unknowable (including pre-1970).
pub(crate) fn mtime_millis(time: std::io::Result<std::time::SystemTime>) -> u64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A value-like handle on one OS path. Nothing is cached; every query
/// re-stats.
#[derive(Debug, Clone)]
pub struct NativeBacking {
    path: Utf8PathBuf,
}

impl NativeBacking {
    pub fn new<P: Into<Utf8PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn os_path(&self) -> &Utf8Path {
        &self.path
    }
}

impl FileBacking for NativeBacking {
    fn name(&self) -> &str {
        self.path.file_name().unwrap_or_else(|| self.path.as_str())
    }

    fn path(&self) -> String {
        self.path.as_str().replace('\\', "/")
    }

    fn stat(&self) -> FileStat {
        let Ok(symlink_meta) = fs::symlink_metadata(&self.path) else {
            return FileStat::missing();
        };
        let symbolic = symlink_meta.file_type().is_symlink();
        // Stat through the link for everything else; a dangling link
        // still reports itself so sync can notice it.
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(_) => symlink_meta,
        };
        let directory = meta.is_dir();
        FileStat {
            exists: true,
            directory,
            last_modified: mtime_millis(meta.modified()),
            length: if directory { 0 } else { meta.len() },
            hidden: self.name().starts_with('.'),
            readable: true,
            writable: !meta.permissions().readonly(),
            symbolic,
        }
    }

    fn list(
        &self,
        on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        canceled: &AtomicBool,
    ) -> Result<bool> {
        let stat = self.stat();
        if !stat.exists || !stat.directory {
            return Ok(true);
        }
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(other) => warn!("skipping non-UTF-8 name {other:?} in {}", self.path),
            }
        }
        names.sort();
        for name in names {
            if is_canceled(canceled) {
                return Ok(false);
            }
            on_child(Arc::new(NativeBacking::new(self.path.join(&name))));
        }
        Ok(true)
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        Arc::new(NativeBacking::new(self.path.join(name)))
    }

    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        if is_canceled(canceled) {
            return Ok(None);
        }
        let mut file = fs::File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(self.path())
            } else {
                Error::Io(e)
            }
        })?;
        if start > 0 {
            file.seek(SeekFrom::Start(start))?;
        }
        Ok(Some(Box::new(file)))
    }

    fn create(&self, directory: bool) -> Result<()> {
        let stat = self.stat();
        if stat.exists {
            if stat.directory != directory {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists as the other kind", self.path),
                )));
            }
            return Ok(());
        }
        if directory {
            fs::create_dir_all(&self.path)?;
        } else {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::File::create(&self.path)?;
        }
        Ok(())
    }

    fn delete(&self, results: &mut DeleteResults) -> Result<()> {
        let meta = match fs::symlink_metadata(&self.path) {
            Ok(meta) => meta,
            Err(_) => return Ok(()),
        };
        if meta.file_type().is_symlink() || !meta.is_dir() {
            fs::remove_file(&self.path)?;
            results.files_deleted += 1;
            return Ok(());
        }
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let child = NativeBacking::new(
                Utf8PathBuf::from_path_buf(entry.path())
                    .map_err(|p| Error::InvalidPath(p.display().to_string()))?,
            );
            child.delete(results)?;
        }
        fs::remove_dir(&self.path)?;
        results.directories_deleted += 1;
        Ok(())
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(fs::File::create(&self.path)?))
    }

    fn set_last_modified(&self, millis: u64) -> bool {
        let time = FileTime::from_unix_time((millis / 1000) as i64, (millis % 1000) as u32 * 1_000_000);
        filetime::set_file_mtime(self.path.as_std_path(), time).is_ok()
    }

    fn set_attribute(&self, attribute: Attribute, value: bool, owner_only: bool) -> bool {
        match attribute {
            Attribute::Writable => set_mode_bits(&self.path, 0o200, value, owner_only),
            Attribute::Readable => set_mode_bits(&self.path, 0o400, value, owner_only),
            // Hiding a native file would be a rename; refuse.
            Attribute::Hidden => false,
        }
    }

    fn move_to(&self, new_path: &str) -> Result<()> {
        fs::rename(&self.path, new_path)?;
        Ok(())
    }

    fn to_url(&self, out: &mut String) -> Result<()> {
        out.push_str("file:");
        let normalized = self.path();
        if !normalized.starts_with('/') {
            out.push('/');
        }
        out.push_str(&normalized);
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode_bits(path: &Utf8Path, owner_bit: u32, value: bool, owner_only: bool) -> bool {
    use std::os::unix::fs::PermissionsExt;
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let mut mode = meta.permissions().mode();
    // The owner bit shifted down twice covers group and other.
    let mask = if owner_only {
        owner_bit
    } else {
        owner_bit | (owner_bit >> 3) | (owner_bit >> 6)
    };
    if value {
        mode |= mask;
    } else {
        mode &= !mask;
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).is_ok()
}

#[cfg(not(unix))]
fn set_mode_bits(path: &Utf8Path, owner_bit: u32, value: bool, _owner_only: bool) -> bool {
    if owner_bit != 0o200 {
        return false;
    }
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let mut permissions = meta.permissions();
    permissions.set_readonly(!value);
    fs::set_permissions(path, permissions).is_ok()
}
