//! Test doubles for the agent's two seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docscan_client::{FetchError, Network};
use docscan_core::{AgentConfig, CacheGeneration, CacheStorage, Error, MemoryStorage, Request, Response};
use url::Url;

use crate::agent::OfflineAgent;

/// Absolute URL on the default application origin.
pub fn origin_url(path: &str) -> Url {
    Url::parse("http://localhost:8080").unwrap().join(path).unwrap()
}

pub fn agent_with(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> OfflineAgent {
    agent_with_config(&AgentConfig::default(), storage, network)
}

pub fn agent_with_config(
    config: &AgentConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
) -> OfflineAgent {
    OfflineAgent::new(config, storage, network).unwrap()
}

/// Network answering from a fixed route table.
///
/// Unknown URLs fail as if the host were unreachable. Routes starting with
/// `/` are on the default origin.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: HashMap<String, Response>,
    offline: AtomicBool,
    calls: Mutex<Vec<Request>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ok(self, route: &str, body: &'static str) -> Self {
        self.with_response(route, Response::new(200, body))
    }

    pub fn with_response(mut self, route: &str, response: Response) -> Self {
        let url = if route.starts_with('/') { origin_url(route) } else { Url::parse(route).unwrap() };
        self.routes.insert(url.to_string(), response);
        self
    }

    /// Fail every request from now on.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".into()));
        }
        self.routes
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("unreachable: {}", request.url)))
    }
}

/// Memory storage whose deletes fail for selected generations. Counts
/// `open` calls.
pub struct FlakyStorage {
    inner: MemoryStorage,
    locked: HashSet<String>,
    opens: AtomicUsize,
}

impl FlakyStorage {
    pub fn new<'a>(inner: MemoryStorage, locked: impl IntoIterator<Item = &'a str>) -> Self {
        Self { inner, locked: locked.into_iter().map(String::from).collect(), opens: AtomicUsize::new(0) }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheGeneration>, Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.locked.contains(name) {
            return Err(Error::InvalidState(format!("{name} is locked")));
        }
        self.inner.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }
}
