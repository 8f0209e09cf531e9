//! Error types and the related `Result<T>`

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An error from underlying I/O
    #[error("I/O Error")]
    Io(#[from] std::io::Error),

    /// Nothing exists at the requested path.
    #[error("No file at {0}")]
    NotFound(String),

    /// The operation does not apply to this kind of backing
    /// (writing into an archive, moving a URL, and so on).
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// An archive violated its wire format: bad magic, truncated record,
    /// failed checksum. The message names the offending entry or signature.
    #[error("Malformed archive: {0}")]
    Format(String),

    /// Decoding a UTF-8 name failed
    #[error("Invalid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// A user-provided path was invalid.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// An archive contained a nonsensical file hierarchy
    /// (duplicate entries, bad paths, etc.)
    #[error("Strange file hierarchy: {0}")]
    Hierarchy(String),

    /// An index or range argument was out of bounds.
    #[error("Out of bounds: {0}")]
    Bounds(String),

    /// A cast from a 64-bit int to a usize failed,
    /// probably on a 32-bit system.
    #[error("Value too large for address space")]
    TooLarge,

    /// An error annotated with the virtual path where it happened.
    /// Synchronization re-raises everything through this.
    #[error("{path}: {source}")]
    At {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps the error with the virtual path the failing operation was
    /// working on.
    pub fn at(self, path: &str) -> Error {
        Error::At {
            path: path.to_owned(),
            source: Box::new(self),
        }
    }
}
