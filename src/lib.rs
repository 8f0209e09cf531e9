//! arbor is a virtual hierarchical file system: one tree interface over
//! native directories, remote URL roots, and the *insides* of archive
//! files, with overlay and sub-tree combinators and a directory
//! synchronization engine on top.
//!
//! Every node is a [`FileBacking`]: a value-like handle that can stat,
//! list, read, and (where the variant allows) write, create, and delete.
//! Wrap any tree in [`ArchiveEnabledBacking`] and archive files under it
//! read as directories:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use arbor::backing::{FileBacking, NOT_CANCELED};
//! # use arbor::native::NativeBacking;
//! # use arbor::archive::ArchiveEnabledBacking;
//! let root: Arc<dyn FileBacking> = Arc::new(NativeBacking::new("/data"));
//! let root = ArchiveEnabledBacking::with_default_formats(root);
//!
//! // /data/pkg.zip is a file, but through the wrapper it lists and
//! // resolves like a directory:
//! let inside = root.child_named("pkg.zip").child_named("doc.txt");
//! let mut reader = inside.open(0, &NOT_CANCELED)?.expect("not canceled");
//! let mut text = String::new();
//! reader.read_to_string(&mut text)?;
//! # use std::io::Read;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Trees compose: [`overlay::CombinedBacking`] layers several trees with
//! first-hit-wins reads, [`overlay::SubBacking`] promotes a sub-path to
//! a root, and [`sync::SyncEngine`] drives an ordered diff from one tree
//! into another.
//!
//! Underneath, the archive codecs share a small toolkit this crate also
//! exports: growable ring buffers ([`ring`]), a blocking character pipe
//! ([`pipe`]), a position-counting reader ([`counting`]), and a file
//! rewriter that safely interleaves reading and writing in place
//! ([`rewrite`]).
//!
//! Long operations take an `&AtomicBool` cancel flag and poll it between
//! records, children, and buffer refills; a fired flag makes them return
//! `Ok(None)` (or `Ok(false)`), never an error.

pub mod archive;
pub mod backing;
pub mod counting;
pub mod entry;
pub mod format;
pub mod gzip;
pub mod native;
pub mod overlay;
pub mod path;
pub mod pipe;
pub mod result;
pub mod rewrite;
pub mod ring;
pub mod sync;
pub mod tar;
pub mod url;
pub mod urls;
pub mod zip;

pub use archive::ArchiveEnabledBacking;
pub use backing::{FileBacking, FileStat};
pub use format::{default_formats, ArchiveFormat};
pub use result::{Error, Result};

mod arch;
mod crc;
