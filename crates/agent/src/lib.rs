//! Offline cache agent for the DocScan web app.
//!
//! The agent precaches the app shell at install time, removes stale cache
//! generations at activation and answers page requests cache-first. The
//! binary drives it over a line-delimited JSON protocol on stdio; see
//! [`protocol`].

pub mod agent;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod protocol;

#[cfg(test)]
mod testing;

pub use agent::{FetchDecision, OfflineAgent, Served, ServedFrom};
pub use handler::AgentHost;
pub use lifecycle::{Registration, RegistrationState};
