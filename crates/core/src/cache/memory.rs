//! In-process cache storage.
//!
//! Uses HashMaps behind tokio RwLocks for concurrent access. A handle to a
//! deleted generation keeps working on its own detached entries, but the
//! generation is no longer reachable through the store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheGeneration, CacheStorage, RequestKey, ensure_cacheable_method, is_cacheable_method};
use crate::Error;
use crate::http::{Request, Response};

/// Memory-backed [`CacheStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    generations: Arc<RwLock<Generations>>,
}

#[derive(Debug, Default)]
struct Generations {
    by_name: HashMap<String, Arc<MemoryGeneration>>,
    order: Vec<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheGeneration>, Error> {
        {
            let generations = self.generations.read().await;
            if let Some(generation) = generations.by_name.get(name) {
                return Ok(generation.clone());
            }
        }

        let mut generations = self.generations.write().await;
        if let Some(generation) = generations.by_name.get(name) {
            return Ok(generation.clone());
        }

        tracing::debug!("creating cache generation {}", name);
        let generation = Arc::new(MemoryGeneration::new(name));
        generations.by_name.insert(name.to_string(), generation.clone());
        generations.order.push(name.to_string());
        Ok(generation)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.generations.read().await.by_name.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut generations = self.generations.write().await;
        let existed = generations.by_name.remove(name).is_some();
        generations.order.retain(|n| n != name);
        Ok(existed)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.generations.read().await.order.clone())
    }
}

/// One memory-backed generation.
#[derive(Debug)]
pub struct MemoryGeneration {
    name: String,
    entries: RwLock<HashMap<RequestKey, Response>>,
}

impl MemoryGeneration {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), entries: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl CacheGeneration for MemoryGeneration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !is_cacheable_method(request.method) {
            return Ok(None);
        }
        let key = RequestKey::for_request(request);
        Ok(self.entries.read().await.get(&key).cloned())
    }

    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        ensure_cacheable_method(request)?;
        let key = RequestKey::for_request(request);
        self.entries.write().await.insert(key, response.clone());
        Ok(())
    }

    async fn remove(&self, request: &Request) -> Result<bool, Error> {
        let key = RequestKey::for_request(request);
        Ok(self.entries.write().await.remove(&key).is_some())
    }

    async fn entry_count(&self) -> Result<usize, Error> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use url::Url;

    fn request(path: &str) -> Request {
        Request::get(Url::parse("https://scan.example.org").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_open_creates_once() {
        let storage = MemoryStorage::new();
        assert!(!storage.has("docscan-v1").await.unwrap());

        let a = storage.open("docscan-v1").await.unwrap();
        a.put(&request("/index.html"), &Response::new(200, "shell")).await.unwrap();
        let b = storage.open("docscan-v1").await.unwrap();

        assert_eq!(b.entry_count().await.unwrap(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["docscan-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_put_and_lookup() {
        let storage = MemoryStorage::new();
        let generation = storage.open("docscan-v1").await.unwrap();
        let response = Response::new(200, "<html>").with_header("content-type", "text/html");

        generation.put(&request("/index.html"), &response).await.unwrap();

        let hit = generation.lookup(&request("/index.html")).await.unwrap();
        assert_eq!(hit, Some(response));
        assert!(generation.lookup(&request("/other")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_whole_entry() {
        let storage = MemoryStorage::new();
        let generation = storage.open("docscan-v1").await.unwrap();

        generation
            .put(&request("/a"), &Response::new(200, "one").with_header("etag", "1"))
            .await
            .unwrap();
        generation.put(&request("/a"), &Response::new(200, "two")).await.unwrap();

        let hit = generation.lookup(&request("/a")).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"two");
        assert!(hit.header("etag").is_none());
        assert_eq!(generation.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_get_is_never_cached() {
        let storage = MemoryStorage::new();
        let generation = storage.open("docscan-v1").await.unwrap();
        let post = request("/upload").with_method(Method::Post);

        let result = generation.put(&post, &Response::new(200, "ok")).await;
        assert!(matches!(result, Err(Error::UnsupportedMethod(Method::Post))));
        assert!(generation.lookup(&post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_and_keys_order() {
        let storage = MemoryStorage::new();
        storage.open("docscan-v1").await.unwrap();
        storage.open("docscan-v2").await.unwrap();
        storage.open("other").await.unwrap();

        assert!(storage.delete("docscan-v1").await.unwrap());
        assert!(!storage.delete("docscan-v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["docscan-v2".to_string(), "other".to_string()]);
    }

    #[tokio::test]
    async fn test_reopen_after_delete_is_empty() {
        let storage = MemoryStorage::new();
        let generation = storage.open("docscan-v1").await.unwrap();
        generation.put(&request("/"), &Response::new(200, "x")).await.unwrap();

        storage.delete("docscan-v1").await.unwrap();
        let reopened = storage.open("docscan-v1").await.unwrap();
        assert_eq!(reopened.entry_count().await.unwrap(), 0);
    }
}
