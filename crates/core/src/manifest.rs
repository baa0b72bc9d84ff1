//! Precache manifest.
//!
//! The manifest is static configuration: an ordered list of URLs that must be
//! in the cache before the agent starts serving. Entries on the application
//! origin are must-succeed; everything else (e.g. a CDN-hosted library) is
//! fetched best-effort.

use url::Url;

use crate::Error;
use crate::origin::{is_same_origin, resolve};

/// Built-in manifest for the document-scanning app.
pub const DEFAULT_PRECACHE_URLS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js",
];

/// Resolved precache manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    origin: Url,
    entries: Vec<Url>,
}

impl PrecacheManifest {
    /// Resolve every entry against `origin`, keeping manifest order and
    /// dropping duplicates.
    pub fn resolve<S: AsRef<str>>(origin: &Url, urls: &[S]) -> Result<Self, Error> {
        let mut entries: Vec<Url> = Vec::with_capacity(urls.len());
        for raw in urls {
            let url = resolve(origin, raw.as_ref()).map_err(|e| Error::InvalidUrl(format!("{}: {e}", raw.as_ref())))?;
            if !entries.contains(&url) {
                entries.push(url);
            }
        }
        Ok(Self { origin: origin.clone(), entries })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// All entries in manifest order.
    pub fn entries(&self) -> &[Url] {
        &self.entries
    }

    /// Entries on the application origin.
    pub fn same_origin(&self) -> impl Iterator<Item = &Url> {
        self.entries.iter().filter(|url| is_same_origin(&self.origin, url))
    }

    /// Entries on any other origin.
    pub fn external(&self) -> impl Iterator<Item = &Url> {
        self.entries.iter().filter(|url| !is_same_origin(&self.origin, url))
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.entries.contains(url)
    }
}
