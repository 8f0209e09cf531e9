//! URL dispatch: turn an address into the backing it names.
//!
//! `file:/path` roots a native tree, `jar:<url>!/entry` digs into an
//! archive addressed by the inner URL, and anything else becomes a
//! remote URL backing.

use std::sync::Arc;

use crate::archive::ArchiveEnabledBacking;
use crate::backing::{resolve, FileBacking};
use crate::format::FormatRegistry;
use crate::native::NativeBacking;
use crate::result::*;
use crate::url::UrlBacking;

/// Resolves a URL to a backing, wrapping archives where the address digs
/// into one.
pub fn backing_for_url(url: &str, formats: &FormatRegistry) -> Result<Arc<dyn FileBacking>> {
    if let Some(rest) = url.strip_prefix("jar:") {
        let Some((inner, entry)) = rest.split_once("!/") else {
            return Err(Error::InvalidPath(format!(
                "jar URL without !/ separator: {url}"
            )));
        };
        let archive = backing_for_url(inner, formats)?;
        let wrapped: Arc<dyn FileBacking> =
            Arc::new(ArchiveEnabledBacking::new(archive, Arc::clone(formats)));
        return Ok(resolve(&wrapped, entry));
    }
    if let Some(path) = url.strip_prefix("file:") {
        let path = path.strip_prefix("//").unwrap_or(path);
        return Ok(Arc::new(NativeBacking::new(path)));
    }
    Ok(Arc::new(UrlBacking::new(url)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::default_formats;

    #[test]
    fn file_urls_are_native() {
        let formats = default_formats();
        let backing = backing_for_url("file:/tmp/somewhere", &formats).unwrap();
        assert_eq!(backing.name(), "somewhere");
        let mut url = String::new();
        backing.to_url(&mut url).unwrap();
        assert_eq!(url, "file:/tmp/somewhere");
    }

    #[test]
    fn jar_urls_dig_into_the_archive() {
        let formats = default_formats();
        let backing =
            backing_for_url("jar:file:/tmp/pkg.zip!/dir/a.txt", &formats).unwrap();
        assert_eq!(backing.name(), "a.txt");
        // The archive file itself is absent, so the entry dangles.
        assert!(!backing.stat().exists);
    }

    #[test]
    fn malformed_jar_urls_are_rejected() {
        let formats = default_formats();
        assert!(backing_for_url("jar:file:/tmp/pkg.zip", &formats).is_err());
    }

    #[test]
    fn everything_else_is_remote() {
        let formats = default_formats();
        let backing = backing_for_url("http://example.com/data/x.bin", &formats).unwrap();
        assert_eq!(backing.name(), "x.bin");
    }
}
