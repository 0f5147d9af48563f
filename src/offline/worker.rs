use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::offline::network::Network;
use crate::offline::policy::{FetchPolicy, RouteTable};
use crate::offline::request::{FetchRequest, FetchResponse};
use crate::offline::storage::CacheStorage;

pub const DEFAULT_SHELL: [&str; 5] = [
    "/",
    "/index.html",
    "/manifest.webmanifest",
    "/service-worker.js",
    "/data/shorts.csv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the current cache generation; every other store is purged on activation.
    pub generation: String,
    pub origin: Url,
    pub shell: Vec<String>,
    pub routes: RouteTable,
}

impl WorkerConfig {
    pub fn new(generation: impl Into<String>, origin: Url) -> Self {
        Self {
            generation: generation.into(),
            origin,
            shell: DEFAULT_SHELL.iter().map(|p| (*p).to_owned()).collect(),
            routes: RouteTable::default(),
        }
    }

    /// Places an app path under the origin, keeping any base path the origin carries. The
    /// origin's host is never replaced.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.origin.clone();
        let base = self.origin.path().trim_end_matches('/');
        url.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
        url.set_query(query);
        url.set_fragment(None);
        url
    }

    pub fn shell_requests(&self) -> Vec<FetchRequest> {
        self.shell
            .iter()
            .map(|entry| {
                let (path, query) = match entry.split_once('?') {
                    Some((path, query)) => (path, Some(query)),
                    None => (entry.as_str(), None),
                };
                FetchRequest::get(self.resolve(path, query))
            })
            .collect()
    }
}

pub struct OfflineWorker {
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
}

impl OfflineWorker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn generation(&self) -> &str {
        &self.config.generation
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Installs then activates. Fetches are served only after this returns `Ok`.
    ///
    /// A generation that is already fully stored is reused without touching the network, so
    /// only a new generation tag triggers a fresh install.
    pub async fn start(&self) -> anyhow::Result<()> {
        if !self.resume().await? {
            self.install().await.context("install offline worker")?;
        }
        self.activate().await.context("activate offline worker")?;
        Ok(())
    }

    /// Moves straight to `Installed` when the current generation already holds every shell
    /// entry. Returns whether it did.
    pub async fn resume(&self) -> anyhow::Result<bool> {
        let mut state = self.state.write().await;
        if *state != WorkerState::Parsed {
            anyhow::bail!("worker cannot resume from state {:?}", *state);
        }
        if !self.has_complete_generation().await? {
            return Ok(false);
        }
        tracing::info!(generation = %self.config.generation, "reusing installed shell");
        *state = WorkerState::Installed;
        Ok(true)
    }

    async fn has_complete_generation(&self) -> anyhow::Result<bool> {
        let name = self.config.generation.as_str();
        let stores = self.storage.keys().await.context("list cache stores")?;
        if !stores.iter().any(|store| store == name) {
            return Ok(false);
        }
        for request in self.config.shell_requests() {
            match self.storage.lookup(name, &request).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::info!(generation = name, url = %request.url, "stored shell incomplete");
                    return Ok(false);
                }
                Err(err) => {
                    tracing::warn!(?err, generation = name, url = %request.url, "unreadable shell entry");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Pre-populates the current generation with every shell entry, or with nothing.
    pub async fn install(&self) -> anyhow::Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Parsed {
                anyhow::bail!("worker cannot install from state {:?}", *state);
            }
            *state = WorkerState::Installing;
        }

        match self.try_install().await {
            Ok(count) => {
                tracing::info!(generation = %self.config.generation, count, "installed shell");
                *self.state.write().await = WorkerState::Installed;
                Ok(())
            }
            Err(err) => {
                tracing::error!(generation = %self.config.generation, ?err, "install failed");
                *self.state.write().await = WorkerState::Redundant;
                Err(err)
            }
        }
    }

    async fn try_install(&self) -> anyhow::Result<usize> {
        let requests = self.config.shell_requests();

        let mut tasks = tokio::task::JoinSet::new();
        for (idx, request) in requests.iter().cloned().enumerate() {
            let network = Arc::clone(&self.network);
            tasks.spawn(async move {
                let result = network.fetch(&request).await;
                (idx, request, result)
            });
        }

        let mut fetched: Vec<Option<FetchResponse>> = vec![None; requests.len()];
        while let Some(joined) = tasks.join_next().await {
            let (idx, request, result) = joined.context("join shell fetch task")?;
            let response = result.with_context(|| format!("fetch shell entry {}", request.url))?;
            if !response.is_success() {
                anyhow::bail!(
                    "shell entry {} returned status {}",
                    request.url,
                    response.status
                );
            }
            fetched[idx] = Some(response);
        }

        let name = self.config.generation.as_str();
        self.storage.open(name).await?;
        for (request, response) in requests.iter().zip(fetched) {
            let response =
                response.ok_or_else(|| anyhow::anyhow!("missing shell entry {}", request.url))?;
            if let Err(err) = self.storage.put(name, request, &response).await {
                if let Err(cleanup) = self.storage.delete(name).await {
                    tracing::warn!(?cleanup, generation = name, "failed to discard partial store");
                }
                return Err(err).with_context(|| format!("store shell entry {}", request.url));
            }
        }

        Ok(requests.len())
    }

    /// Deletes every store that does not belong to the current generation.
    pub async fn activate(&self) -> anyhow::Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Installed {
                anyhow::bail!("worker cannot activate from state {:?}", *state);
            }
            *state = WorkerState::Activating;
        }

        let result = self.purge_stale_generations().await;
        let mut state = self.state.write().await;
        match result {
            Ok(purged) => {
                tracing::info!(generation = %self.config.generation, ?purged, "activated");
                *state = WorkerState::Activated;
                Ok(())
            }
            Err(err) => {
                // Stays installed so activation can be retried.
                *state = WorkerState::Installed;
                Err(err)
            }
        }
    }

    async fn purge_stale_generations(&self) -> anyhow::Result<Vec<String>> {
        let mut purged = Vec::new();
        for name in self.storage.keys().await.context("list cache stores")? {
            if name == self.config.generation {
                continue;
            }
            self.storage
                .delete(&name)
                .await
                .with_context(|| format!("delete stale cache store {name}"))?;
            purged.push(name);
        }
        Ok(purged)
    }

    pub fn policy_for(&self, request: &FetchRequest) -> FetchPolicy {
        self.config.routes.select(request.url.path())
    }

    /// Answers one intercepted request according to its route policy.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            anyhow::bail!("worker is not active (state {state:?})");
        }

        match self.policy_for(request) {
            FetchPolicy::NetworkFirst => self.network_first(request).await,
            FetchPolicy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
        let name = self.config.generation.as_str();
        match self.network.fetch(request).await {
            Ok(response) => {
                if let Err(err) = self.storage.put(name, request, &response).await {
                    tracing::warn!(?err, url = %request.url, "failed to refresh cached copy");
                }
                Ok(response)
            }
            Err(network_err) => {
                tracing::debug!(?network_err, url = %request.url, "network failed; trying cache");
                match self.storage.lookup(name, request).await {
                    Ok(Some(cached)) => Ok(cached),
                    Ok(None) => Err(network_err.context(format!(
                        "network failed and no cached copy of {}",
                        request.url
                    ))),
                    Err(lookup_err) => Err(network_err.context(format!(
                        "network failed and cache lookup for {} failed: {lookup_err:#}",
                        request.url
                    ))),
                }
            }
        }
    }

    async fn cache_first(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
        match self
            .storage
            .lookup(self.config.generation.as_str(), request)
            .await
        {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(?err, url = %request.url, "cache lookup failed; using network");
            }
        }
        self.network.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::offline::storage::MemoryCacheStorage;

    #[derive(Default)]
    struct ScriptedNetwork {
        responses: Mutex<HashMap<String, FetchResponse>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedNetwork {
        fn serve(&self, path: &str, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(path.to_owned(), FetchResponse::new(200, body));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Network for ScriptedNetwork {
        async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
            let path = request.url.path().to_owned();
            self.calls.lock().unwrap().push(path.clone());
            self.responses
                .lock()
                .unwrap()
                .get(&path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection refused: {path}"))
        }
    }

    fn origin() -> Url {
        Url::parse("https://app.test/").unwrap()
    }

    fn get(path: &str) -> FetchRequest {
        FetchRequest::get(origin().join(path).unwrap())
    }

    fn serve_shell(network: &ScriptedNetwork) {
        for path in DEFAULT_SHELL {
            network.serve(path, &format!("shell {path}"));
        }
    }

    #[test]
    fn resolve_keeps_origin_base_path() -> anyhow::Result<()> {
        let config = WorkerConfig::new("v1", Url::parse("https://cdn.test/app/")?);
        assert_eq!(
            config.resolve("/index.html", None).as_str(),
            "https://cdn.test/app/index.html"
        );
        assert_eq!(
            config.resolve("//evil.test/x", Some("v=2")).as_str(),
            "https://cdn.test/app/evil.test/x?v=2"
        );

        let urls: Vec<_> = config
            .shell_requests()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect();
        assert_eq!(urls[0], "https://cdn.test/app/");
        assert_eq!(urls[4], "https://cdn.test/app/data/shorts.csv");
        Ok(())
    }

    #[tokio::test]
    async fn fetch_before_activation_is_rejected() {
        let network = Arc::new(ScriptedNetwork::default());
        serve_shell(&network);
        let worker = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            Arc::new(MemoryCacheStorage::new()),
            network,
        );
        assert!(worker.handle_fetch(&get("/")).await.is_err());
        worker.install().await.unwrap();
        assert!(worker.handle_fetch(&get("/")).await.is_err());
        worker.activate().await.unwrap();
        assert!(worker.handle_fetch(&get("/")).await.is_ok());
    }

    #[tokio::test]
    async fn activation_requires_successful_install() {
        let worker = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(ScriptedNetwork::default()),
        );
        assert!(worker.install().await.is_err());
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(worker.activate().await.is_err());
    }

    #[tokio::test]
    async fn non_success_shell_status_fails_install() -> anyhow::Result<()> {
        let network = Arc::new(ScriptedNetwork::default());
        serve_shell(&network);
        network
            .responses
            .lock()
            .unwrap()
            .insert("/manifest.webmanifest".to_owned(), FetchResponse::new(404, "missing"));
        let storage = Arc::new(MemoryCacheStorage::new());
        let worker = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            storage.clone(),
            network,
        );

        let err = worker.install().await.unwrap_err();
        assert!(format!("{err:#}").contains("status 404"));
        assert!(storage.keys().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn cache_first_misses_are_not_written_back() -> anyhow::Result<()> {
        let network = Arc::new(ScriptedNetwork::default());
        serve_shell(&network);
        network.serve("/img/logo.png", "png");
        let storage = Arc::new(MemoryCacheStorage::new());
        let worker = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            storage.clone(),
            network.clone(),
        );
        worker.start().await?;

        let resp = worker.handle_fetch(&get("/img/logo.png")).await?;
        assert_eq!(resp.body, b"png");
        assert!(storage.lookup("v1", &get("/img/logo.png")).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn cache_first_hit_skips_network() -> anyhow::Result<()> {
        let network = Arc::new(ScriptedNetwork::default());
        serve_shell(&network);
        let worker = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            Arc::new(MemoryCacheStorage::new()),
            network.clone(),
        );
        worker.start().await?;
        let installs = network.calls().len();

        let resp = worker.handle_fetch(&get("/index.html")).await?;
        assert_eq!(resp.body, b"shell /index.html");
        assert_eq!(network.calls().len(), installs);
        Ok(())
    }

    #[tokio::test]
    async fn same_generation_restart_reuses_stored_shell() -> anyhow::Result<()> {
        let network = Arc::new(ScriptedNetwork::default());
        serve_shell(&network);
        let storage = Arc::new(MemoryCacheStorage::new());

        let first = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            storage.clone(),
            network.clone(),
        );
        first.start().await?;
        let installs = network.calls().len();
        assert_eq!(installs, DEFAULT_SHELL.len());

        let again = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            storage.clone(),
            network.clone(),
        );
        again.start().await?;
        assert_eq!(again.state().await, WorkerState::Activated);
        assert_eq!(network.calls().len(), installs);

        let bumped = OfflineWorker::new(
            WorkerConfig::new("v2", origin()),
            storage.clone(),
            network.clone(),
        );
        bumped.start().await?;
        assert_eq!(network.calls().len(), installs * 2);
        assert_eq!(storage.keys().await?, ["v2"]);
        Ok(())
    }

    #[tokio::test]
    async fn incomplete_generation_is_installed_again() -> anyhow::Result<()> {
        let network = Arc::new(ScriptedNetwork::default());
        serve_shell(&network);
        let storage = Arc::new(MemoryCacheStorage::new());
        storage.open("v1").await?;
        storage
            .put("v1", &get("/index.html"), &FetchResponse::new(200, "stale"))
            .await?;

        let worker = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            storage.clone(),
            network.clone(),
        );
        assert!(!worker.resume().await?);
        worker.install().await?;
        assert_eq!(network.calls().len(), DEFAULT_SHELL.len());

        let stored = storage.lookup("v1", &get("/index.html")).await?;
        assert_eq!(stored.map(|r| r.body), Some(b"shell /index.html".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn network_first_refreshes_store() -> anyhow::Result<()> {
        let network = Arc::new(ScriptedNetwork::default());
        serve_shell(&network);
        let storage = Arc::new(MemoryCacheStorage::new());
        let worker = OfflineWorker::new(
            WorkerConfig::new("v1", origin()),
            storage.clone(),
            network.clone(),
        );
        worker.start().await?;

        network.serve("/data/shorts.csv", "id\nfresh\n");
        let resp = worker.handle_fetch(&get("/data/shorts.csv")).await?;
        assert_eq!(resp.body, b"id\nfresh\n");

        let stored = storage.lookup("v1", &get("/data/shorts.csv")).await?;
        assert_eq!(stored.map(|r| r.body), Some(b"id\nfresh\n".to_vec()));
        Ok(())
    }
}
