//! Network access for docscan-offline.
//!
//! This crate provides the [`Network`] trait the agent consults on a cache
//! miss and its `reqwest`-backed implementation, which applies the fetch
//! response-tainting rules (basic / cors / opaque) a browser would.

pub mod fetch;
pub mod network;

pub use fetch::{HttpConfig, HttpNetwork};
pub use network::{FetchError, Network};
