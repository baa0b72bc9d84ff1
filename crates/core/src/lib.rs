//! Core types and shared functionality for docscan-offline.
//!
//! This crate provides:
//! - Request/response model seen by the cache policy
//! - Versioned cache storage (memory and SQLite backends)
//! - Precache manifest and host bypass rules
//! - Unified error types
//! - Configuration structures

pub mod bypass;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod manifest;
pub mod origin;

pub use bypass::{BypassRules, HostMatch};
pub use cache::{CacheDb, CacheGeneration, CacheStorage, MemoryStorage};
pub use config::AgentConfig;
pub use error::Error;
pub use http::{Headers, Method, Request, RequestMode, Response, ResponseType};
pub use manifest::PrecacheManifest;
