//! Versioned cache storage.
//!
//! A store holds named cache generations; each generation maps request
//! identities to response snapshots. Two backends are provided:
//!
//! - [`MemoryStorage`], process-local, used by tests and when no database
//!   path is configured
//! - [`CacheDb`], SQLite with async access via tokio-rusqlite, with
//!   automatic schema migrations and WAL mode
//!
//! Only `GET` requests participate: lookups for any other method miss and
//! writes are refused with [`Error::UnsupportedMethod`].

pub mod connection;
pub mod entries;
pub mod generations;
pub mod key;
pub mod memory;
pub mod migrations;

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::Error;
use crate::http::{Method, Request, Response};

pub use connection::CacheDb;
pub use entries::SqliteGeneration;
pub use key::RequestKey;
pub use memory::{MemoryGeneration, MemoryStorage};

/// Storage of named cache generations.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the generation called `name`, creating it if absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheGeneration>, Error>;

    /// Whether a generation called `name` exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Delete a generation and all of its entries.
    ///
    /// Returns true if it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Names of all existing generations, oldest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;
}

/// Handle to one cache generation.
#[async_trait]
pub trait CacheGeneration: Send + Sync {
    fn name(&self) -> &str;

    /// Stored response for the request identity, if any.
    async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Store `response` for the request identity, replacing any previous entry.
    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error>;

    /// Remove the entry for the request identity. Returns true if it existed.
    async fn remove(&self, request: &Request) -> Result<bool, Error>;

    /// Number of stored entries.
    async fn entry_count(&self) -> Result<usize, Error>;
}

/// Whether `method` can be matched against stored entries.
pub(crate) fn is_cacheable_method(method: Method) -> bool {
    method == Method::Get
}

pub(crate) fn ensure_cacheable_method(request: &Request) -> Result<(), Error> {
    if is_cacheable_method(request.method) { Ok(()) } else { Err(Error::UnsupportedMethod(request.method)) }
}
