//! A file backing rooted at a remote URL.
//!
//! Remote stats are expensive, so each node caches its last-known stat
//! for a short TTL (1 second by default) and re-queries after expiry.
//! Any failure to reach the server reads as "does not exist".

use std::io;
use std::io::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::DateTime;
use log::*;
use reqwest::blocking::Client;
use reqwest::header;
use reqwest::Url;

use crate::backing::*;
use crate::result::*;

const DEFAULT_STAT_TTL: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy)]
struct CachedStat {
    stat: FileStat,
    fetched: Instant,
}

/// One node of a remote tree. Children are addressed by appending path
/// segments; the server is never asked for listings.
pub struct UrlBacking {
    client: Arc<Client>,
    url: Url,
    ttl: Duration,
    cache: Mutex<Option<CachedStat>>,
}

impl UrlBacking {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidPath(format!("{url}: {e}")))?;
        Ok(Self {
            client: Arc::new(Client::new()),
            url,
            ttl: DEFAULT_STAT_TTL,
            cache: Mutex::new(None),
        })
    }

    /// Overrides how long a fetched stat stays authoritative.
    pub fn with_stat_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn child(&self, name: &str) -> UrlBacking {
        let mut url = self.url.clone();
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(name);
            }
            Err(()) => warn!("cannot extend opaque URL {}", self.url),
        }
        UrlBacking {
            client: Arc::clone(&self.client),
            url,
            ttl: self.ttl,
            cache: Mutex::new(None),
        }
    }

    /// One round trip to the server; failures collapse to non-existent.
    fn fetch_stat(&self) -> FileStat {
        let response = match self.client.head(self.url.clone()).send() {
            Ok(response) => response,
            Err(e) => {
                debug!("stat of {} failed: {e}", self.url);
                return FileStat::missing();
            }
        };
        if !response.status().is_success() {
            return FileStat::missing();
        }
        let length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(LENGTH_UNKNOWN);
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.timestamp_millis().max(0) as u64)
            .unwrap_or(0);
        let directory = self.url.path().ends_with('/');
        FileStat {
            exists: true,
            directory,
            last_modified,
            length: if directory { 0 } else { length },
            hidden: false,
            readable: true,
            writable: false,
            symbolic: false,
        }
    }

    /// The cached stat, refreshed when the TTL has lapsed.
    fn cached_stat(&self) -> FileStat {
        let mut cache = self.cache.lock().unwrap();
        if let Some(cached) = *cache {
            if cached.fetched.elapsed() < self.ttl {
                return cached.stat;
            }
        }
        let stat = self.fetch_stat();
        *cache = Some(CachedStat {
            stat,
            fetched: Instant::now(),
        });
        stat
    }
}

impl FileBacking for UrlBacking {
    fn name(&self) -> &str {
        crate::path::file_name(self.url.path())
    }

    fn path(&self) -> String {
        self.url.as_str().to_owned()
    }

    fn stat(&self) -> FileStat {
        self.cached_stat()
    }

    /// Re-stats when the cache has gone stale; reports whether the
    /// remote timestamp is unchanged. An unreachable server counts as
    /// changed so consumers drop derived state.
    fn check(&self) -> bool {
        let previous = {
            let cache = self.cache.lock().unwrap();
            match *cache {
                Some(cached) if cached.fetched.elapsed() < self.ttl => return true,
                Some(cached) => Some(cached.stat),
                None => None,
            }
        };
        let fresh = self.cached_stat();
        match previous {
            Some(old) => fresh.exists && old.last_modified == fresh.last_modified,
            None => fresh.exists,
        }
    }

    fn list(
        &self,
        _on_child: &mut dyn FnMut(Arc<dyn FileBacking>),
        _canceled: &AtomicBool,
    ) -> Result<bool> {
        Err(Error::Unsupported("remote trees cannot be listed"))
    }

    fn child_named(&self, name: &str) -> Arc<dyn FileBacking> {
        Arc::new(self.child(name))
    }

    fn open(&self, start: u64, canceled: &AtomicBool) -> Result<Option<Box<dyn Read + Send>>> {
        if is_canceled(canceled) {
            return Ok(None);
        }
        let mut request = self.client.get(self.url.clone());
        if start > 0 {
            request = request.header(header::RANGE, format!("bytes={start}-"));
        }
        let response = request
            .send()
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(self.path()));
        }
        if !response.status().is_success() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("GET {} returned {}", self.url, response.status()),
            )));
        }
        let ranged = response.status() == reqwest::StatusCode::PARTIAL_CONTENT;
        let mut reader: Box<dyn Read + Send> = Box::new(response);
        if start > 0 && !ranged {
            // The server ignored the range; discard up to the offset.
            io::copy(&mut (&mut reader).take(start), &mut io::sink())?;
        }
        Ok(Some(reader))
    }

    fn create(&self, _directory: bool) -> Result<()> {
        Err(Error::Unsupported("remote trees are read-only"))
    }

    fn delete(&self, _results: &mut DeleteResults) -> Result<()> {
        Err(Error::Unsupported("remote trees are read-only"))
    }

    fn write(&self) -> Result<Box<dyn Write + Send>> {
        Err(Error::Unsupported("remote trees are read-only"))
    }

    fn set_last_modified(&self, _millis: u64) -> bool {
        false
    }

    fn set_attribute(&self, _attribute: Attribute, _value: bool, _owner_only: bool) -> bool {
        false
    }

    fn move_to(&self, _new_path: &str) -> Result<()> {
        Err(Error::Unsupported("cannot move a remote file"))
    }

    fn to_url(&self, out: &mut String) -> Result<()> {
        out.push_str(self.url.as_str());
        Ok(())
    }
}
