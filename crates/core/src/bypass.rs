//! Hosts whose traffic the agent never intercepts.
//!
//! Identity-provider and Drive API traffic (OAuth redirects, token
//! exchanges) must always reach the network: a cached answer would break
//! token freshness and redirect handling.

use serde::{Deserialize, Serialize};
use url::Url;

/// Hosts excluded by default.
pub const DEFAULT_EXCLUDED_HOSTS: &[&str] = &["googleapis.com", "google.com", "gstatic.com"];

/// How an excluded host entry is compared against a request hostname.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMatch {
    /// The hostname contains the entry anywhere.
    #[default]
    Substring,
    /// The hostname equals the entry or ends with `.` + entry.
    Domain,
}

/// Excluded hosts plus the matching mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassRules {
    hosts: Vec<String>,
    matching: HostMatch,
}

impl BypassRules {
    pub fn new<I, S>(hosts: I, matching: HostMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts, matching }
    }

    /// The entry that excludes `url`, if any.
    pub fn matched(&self, url: &Url) -> Option<&str> {
        let host = url.host_str()?.to_ascii_lowercase();
        self.hosts
            .iter()
            .find(|entry| match self.matching {
                HostMatch::Substring => host.contains(entry.as_str()),
                HostMatch::Domain => host == **entry || host.ends_with(&format!(".{entry}")),
            })
            .map(String::as_str)
    }

    pub fn is_excluded(&self, url: &Url) -> bool {
        self.matched(url).is_some()
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn matching(&self) -> HostMatch {
        self.matching
    }
}

impl Default for BypassRules {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_HOSTS, HostMatch::default())
    }
}
