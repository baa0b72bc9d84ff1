//! Fetch handler: cache-first with network fallback.

use serde::Serialize;

use docscan_core::{Method, Request, Response};

use super::{FetchEvent, OfflineAgent};

/// How the agent answers one intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchDecision {
    /// Not intercepted; the host performs the request itself.
    Bypass,
    Respond(Served),
}

impl FetchDecision {
    pub fn served(&self) -> Option<&Served> {
        match self {
            FetchDecision::Bypass => None,
            FetchDecision::Respond(served) => Some(served),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Cache,
    Network,
    /// Cached app shell substituted for a failed navigation.
    OfflineFallback,
    /// Synthesized network error; nothing usable was available.
    NetworkError,
}

/// Whether a network response may be written to the cache.
///
/// Only complete `200` responses to `GET` requests are kept. Opaque
/// responses are never kept since their status cannot be inspected.
pub fn should_cache(request: &Request, response: &Response) -> bool {
    request.method == Method::Get && response.status == 200 && !response.is_opaque()
}

impl OfflineAgent {
    /// Answer an intercepted request.
    ///
    /// Requests to excluded hosts are not intercepted at all. Everything
    /// else is looked up in the current generation first; on a miss the
    /// network is asked and cacheable responses are stored. When the
    /// network fails, navigations get the offline shell and anything else
    /// gets a network-error response.
    pub async fn handle_fetch(&self, event: FetchEvent) -> FetchDecision {
        let request = event.request;

        if let Some(host) = self.bypass.matched(&request.url) {
            tracing::debug!(url = %request.url, rule = host, "bypassing excluded host");
            return FetchDecision::Bypass;
        }

        if let Some(response) = self.cached(&request).await {
            tracing::debug!(url = %request.url, "served from cache");
            return FetchDecision::Respond(Served { response, source: ServedFrom::Cache });
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if should_cache(&request, &response) {
                    self.store(&request, response.clone()).await;
                }
                FetchDecision::Respond(Served { response, source: ServedFrom::Network })
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network request failed");
                FetchDecision::Respond(self.offline(&request).await)
            }
        }
    }

    /// Lookup in the current generation. Store errors count as a miss.
    async fn cached(&self, request: &Request) -> Option<Response> {
        let generation = match self.current().await {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(generation = %self.version, error = %e, "cache unavailable");
                return None;
            }
        };

        match generation.lookup(request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Write-through after a network hit. Failures never reach the page.
    async fn store(&self, request: &Request, response: Response) {
        let result = match self.current().await {
            Ok(generation) => generation.put(request, &response).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(url = %request.url, error = %e, "failed to cache response");
        }
    }

    async fn offline(&self, request: &Request) -> Served {
        if request.is_navigation() {
            let shell = Request::get(self.offline_fallback.clone());
            if let Some(response) = self.cached(&shell).await {
                tracing::info!(url = %request.url, fallback = %self.offline_fallback, "serving offline shell");
                return Served { response, source: ServedFrom::OfflineFallback };
            }
            tracing::warn!(url = %request.url, fallback = %self.offline_fallback, "offline shell is not cached");
        }
        Served { response: Response::network_error(), source: ServedFrom::NetworkError }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docscan_core::{AgentConfig, CacheDb, CacheGeneration, CacheStorage, MemoryStorage, RequestMode, ResponseType};
    use url::Url;

    use super::*;
    use crate::agent::InstallEvent;
    use crate::testing::{FlakyStorage, ScriptedNetwork, agent_with, agent_with_config, origin_url};

    async fn generation(storage: &MemoryStorage, name: &str) -> Arc<dyn CacheGeneration> {
        storage.open(name).await.unwrap()
    }

    #[tokio::test]
    async fn test_excluded_hosts_are_never_intercepted() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(ScriptedNetwork::new().with_ok("https://fonts.googleapis.com/css", "body{}"));
        let agent = agent_with(storage.clone(), network.clone());

        for url in [
            "https://fonts.googleapis.com/css",
            "https://accounts.google.com/o/oauth2/auth",
            "https://www.gstatic.com/firebasejs/9.0.0/app.js",
        ] {
            let request = Request::get(Url::parse(url).unwrap());
            assert_eq!(agent.handle_fetch(FetchEvent::new(request)).await, FetchDecision::Bypass);
        }

        assert!(network.calls().is_empty());
        assert!(!storage.has("docscan-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_repeat_request_served_from_cache() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(ScriptedNetwork::new().with_response(
            "/app.js",
            Response::new(200, "console.log(1)").with_header("content-type", "text/javascript"),
        ));
        let agent = agent_with(storage.clone(), network.clone());
        let request = Request::get(origin_url("/app.js"));

        let first = agent.handle_fetch(FetchEvent::new(request.clone())).await;
        let second = agent.handle_fetch(FetchEvent::new(request.clone())).await;

        let first = first.served().unwrap();
        let second = second.served().unwrap();
        assert_eq!(first.source, ServedFrom::Network);
        assert_eq!(second.source, ServedFrom::Cache);
        assert_eq!(second.response.body, first.response.body);
        assert_eq!(second.response.headers, first.response.headers);
        assert_eq!(network.calls().len(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["docscan-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(ScriptedNetwork::new().with_response("/missing.png", Response::new(404, "nope")));
        let agent = agent_with(storage.clone(), network.clone());
        let request = Request::get(origin_url("/missing.png"));

        let decision = agent.handle_fetch(FetchEvent::new(request.clone())).await;

        assert_eq!(decision.served().unwrap().response.status, 404);
        assert!(generation(&storage, "docscan-v1").await.lookup(&request).await.unwrap().is_none());
        agent.handle_fetch(FetchEvent::new(request)).await;
        assert_eq!(network.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_opaque_is_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let url = "https://cdn.example.net/tracker.js";
        let network = Arc::new(ScriptedNetwork::new().with_response(url, Response::opaque()));
        let agent = agent_with(storage.clone(), network);
        let request = Request::get(Url::parse(url).unwrap()).with_mode(RequestMode::NoCors);

        let decision = agent.handle_fetch(FetchEvent::new(request.clone())).await;

        assert_eq!(decision.served().unwrap().response.kind, ResponseType::Opaque);
        assert!(generation(&storage, "docscan-v1").await.lookup(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_get_is_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(ScriptedNetwork::new().with_ok("/api/scans", "{\"id\":1}"));
        let agent = agent_with(storage.clone(), network.clone());
        let request = Request::get(origin_url("/api/scans")).with_method(Method::Post);

        let decision = agent.handle_fetch(FetchEvent::new(request)).await;

        assert_eq!(decision.served().unwrap().source, ServedFrom::Network);
        assert_eq!(generation(&storage, "docscan-v1").await.entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_shell() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(
            ScriptedNetwork::new()
                .with_ok("/", "<html>root</html>")
                .with_ok("/index.html", "<html>shell</html>")
                .with_ok("/manifest.json", "{}"),
        );
        let agent = agent_with(storage, network.clone());
        agent.install(InstallEvent).await.unwrap();

        network.go_offline();
        let request = Request::navigate(origin_url("/dashboard"));
        let decision = agent.handle_fetch(FetchEvent::new(request)).await;

        let served = decision.served().unwrap();
        assert_eq!(served.source, ServedFrom::OfflineFallback);
        assert_eq!(&served.response.body[..], b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_offline_subresource_gets_network_error() {
        let network = Arc::new(ScriptedNetwork::new());
        let agent = agent_with(Arc::new(MemoryStorage::new()), network);

        let request = Request::get(origin_url("/api/scans"));
        let decision = agent.handle_fetch(FetchEvent::new(request)).await;

        let served = decision.served().unwrap();
        assert_eq!(served.source, ServedFrom::NetworkError);
        assert_eq!(served.response.kind, ResponseType::Error);
        assert_eq!(served.response.status, 0);
    }

    #[tokio::test]
    async fn test_offline_navigation_without_shell_gets_network_error() {
        let agent = agent_with(Arc::new(MemoryStorage::new()), Arc::new(ScriptedNetwork::new()));

        let decision = agent.handle_fetch(FetchEvent::new(Request::navigate(origin_url("/dashboard")))).await;

        assert_eq!(decision.served().unwrap().source, ServedFrom::NetworkError);
    }

    #[tokio::test]
    async fn test_old_generation_is_not_consulted() {
        let storage = Arc::new(MemoryStorage::new());
        let request = Request::get(origin_url("/app.js"));
        generation(&storage, "docscan-v1").await.put(&request, &Response::new(200, "old")).await.unwrap();

        let config = AgentConfig { cache_version: "docscan-v2".into(), ..Default::default() };
        let network = Arc::new(ScriptedNetwork::new().with_ok("/app.js", "new"));
        let agent = agent_with_config(&config, storage.clone(), network);

        let decision = agent.handle_fetch(FetchEvent::new(request.clone())).await;
        let served = decision.served().unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(&served.response.body[..], b"new");
    }

    #[tokio::test]
    async fn test_generation_opened_once() {
        let storage = Arc::new(FlakyStorage::new(MemoryStorage::new(), Vec::<&str>::new()));
        let network = Arc::new(ScriptedNetwork::new().with_ok("/app.js", "x").with_ok("/style.css", "y"));
        let agent = agent_with(storage.clone(), network);

        for path in ["/app.js", "/app.js", "/style.css", "/missing"] {
            agent.handle_fetch(FetchEvent::new(Request::get(origin_url(path)))).await;
        }

        assert_eq!(storage.opens(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_repeat_request_served_from_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new().with_response(
            "/icon.png",
            Response::new(200, vec![137u8, 80, 78, 71, 255, 254, 0, 128]).with_header("content-type", "image/png"),
        ));
        let agent = agent_with(Arc::new(db.clone()), network.clone());
        let request = Request::get(origin_url("/icon.png"));

        let first = agent.handle_fetch(FetchEvent::new(request.clone())).await;
        let second = agent.handle_fetch(FetchEvent::new(request)).await;

        let first = first.served().unwrap();
        let second = second.served().unwrap();
        assert_eq!(second.source, ServedFrom::Cache);
        assert_eq!(second.response.body, first.response.body);
        assert_eq!(second.response.header("content-type"), Some("image/png"));
        assert_eq!(network.calls().len(), 1);
        assert_eq!(db.count_entries("docscan-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_uncacheable_responses_not_stored() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cdn = "https://cdn.example.net/tracker.js";
        let network = Arc::new(
            ScriptedNetwork::new()
                .with_response("/missing.png", Response::new(404, "nope"))
                .with_response(cdn, Response::opaque()),
        );
        let agent = agent_with(Arc::new(db.clone()), network);

        agent.handle_fetch(FetchEvent::new(Request::get(origin_url("/missing.png")))).await;
        let opaque = Request::get(Url::parse(cdn).unwrap()).with_mode(RequestMode::NoCors);
        agent.handle_fetch(FetchEvent::new(opaque)).await;

        assert_eq!(db.count_entries("docscan-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_store_failure_still_serves_network_response() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new().with_ok("/a.js", "a").with_ok("/b.js", "b"));
        let agent = agent_with(Arc::new(db.clone()), network);
        agent.handle_fetch(FetchEvent::new(Request::get(origin_url("/a.js")))).await;

        // Generation removed behind the agent's back; the write hits the foreign key.
        db.delete("docscan-v1").await.unwrap();
        let decision = agent.handle_fetch(FetchEvent::new(Request::get(origin_url("/b.js")))).await;

        let served = decision.served().unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(&served.response.body[..], b"b");
        assert!(!db.has("docscan-v1").await.unwrap());
    }

    #[test]
    fn test_should_cache() {
        let get = Request::get(origin_url("/a"));
        assert!(should_cache(&get, &Response::new(200, "x")));
        assert!(!should_cache(&get, &Response::new(204, "")));
        assert!(!should_cache(&get, &Response::new(404, "x")));
        assert!(!should_cache(&get, &Response::opaque()));
        assert!(!should_cache(&get.clone().with_method(Method::Post), &Response::new(200, "x")));
    }
}
