//! Request identity used as the cache entry key.

use sha2::{Digest, Sha256};
use url::Url;

use crate::http::{Method, Request};

/// Content-addressed key for a request identity (method + URL).
///
/// The URL fragment never takes part in the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn for_request(request: &Request) -> Self {
        Self::compute(request.method, &request.url)
    }

    pub fn compute(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);

        let mut hasher = Sha256::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
