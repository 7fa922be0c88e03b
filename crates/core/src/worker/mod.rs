//! The service worker object.
//!
//! A [`ServiceWorker`] serves exactly one cache version. It is constructed
//! explicitly with its storage handle, network fetcher and route table, and
//! the host drives it through [`ServiceWorker::install`],
//! [`ServiceWorker::activate`], [`ServiceWorker::handle_fetch`] and
//! [`ServiceWorker::sync`].
//!
//! ```text
//! install:   Uninitialized -> Installing -> Active        (pre-cache manifest)
//! resume:    Uninitialized -> Active                      (store already on disk)
//! activate:  Active -> ActivatingNewVersion -> EvictingOldVersions -> Active
//! fetch:     classify -> network-first | cache-first | stale-while-revalidate
//! ```

pub mod fetch;
pub mod lifecycle;
pub mod sync;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use url::Url;

use crate::cache::CacheDb;
use crate::config::AppConfig;
use crate::http::{Fetcher, Request, Response};
use crate::routes::RouteTable;
use crate::Error;

pub use fetch::{FetchOutcome, ResponseSource, Revalidation};
pub use lifecycle::{LifecycleEvent, LifecycleState};
pub use sync::SyncReport;

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub store: String,
    /// Absolute URLs written to the store, in manifest order.
    pub cached: Vec<String>,
}

/// Result of an activation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivationReport {
    pub kept: String,
    pub evicted: Vec<String>,
    /// Stale stores whose deletion failed; retried on the next activation.
    pub failed: Vec<String>,
}

pub struct ServiceWorker {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    routes: RouteTable,
    store_name: String,
    manifest: Vec<String>,
    state: RwLock<LifecycleState>,
}

impl ServiceWorker {
    /// Build a worker serving `store_name`. Manifest entries are
    /// root-relative paths resolved against the route table's origin.
    pub fn new(
        db: CacheDb, fetcher: Arc<dyn Fetcher>, routes: RouteTable, store_name: impl Into<String>,
        manifest: Vec<String>,
    ) -> Self {
        Self {
            db,
            fetcher,
            routes,
            store_name: store_name.into(),
            manifest,
            state: RwLock::new(LifecycleState::Uninitialized),
        }
    }

    /// Build a worker from loaded configuration.
    pub fn from_config(config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config.origin_url()?;
        let routes =
            RouteTable::from_patterns(origin, config.network_first.iter().cloned(), config.cache_first.iter().cloned());
        Ok(Self::new(db, fetcher, routes, config.store_name(), config.precache.clone()))
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    async fn advance(&self, event: LifecycleEvent) -> Result<LifecycleState, Error> {
        let mut state = self.state.write().await;
        let from = *state;
        let next = from.transition(event)?;
        tracing::info!(store = %self.store_name, ?from, to = ?next, "lifecycle transition");
        *state = next;
        Ok(next)
    }

    /// Open the versioned store and pre-cache the manifest.
    ///
    /// All manifest assets are fetched before anything is written; if any
    /// fetch fails or does not return 200 the install fails, the store is
    /// left untouched and the worker returns to `Uninitialized` so the host
    /// can retry.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.advance(LifecycleEvent::Install).await?;

        match self.precache().await {
            Ok(cached) => {
                self.advance(LifecycleEvent::InstallSucceeded).await?;
                Ok(InstallReport { store: self.store_name.clone(), cached })
            }
            Err(e) => {
                tracing::warn!(store = %self.store_name, error = %e, "install failed");
                self.advance(LifecycleEvent::InstallFailed).await?;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<Vec<String>, Error> {
        let mut requests = Vec::with_capacity(self.manifest.len());
        for path in &self.manifest {
            let url = self
                .routes
                .origin()
                .join(path)
                .map_err(|e| Error::InstallFailed { url: path.clone(), reason: e.to_string() })?;
            requests.push(Request::get(url));
        }

        let mut tasks = JoinSet::new();
        for (index, request) in requests.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            tasks.spawn(async move {
                let result = fetcher.fetch(&request).await;
                (index, result)
            });
        }

        let mut responses: Vec<Option<Response>> = vec![None; requests.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) =
                joined.map_err(|e| Error::InstallFailed { url: "manifest".into(), reason: e.to_string() })?;
            let url = requests[index].url.to_string();
            let response = result.map_err(|e| Error::InstallFailed { url: url.clone(), reason: e.to_string() })?;
            if !response.is_cacheable() {
                return Err(Error::InstallFailed { url, reason: format!("status {}", response.status) });
            }
            responses[index] = Some(response);
        }

        let entries: Vec<(Request, Response)> = requests
            .into_iter()
            .zip(responses)
            .filter_map(|(request, response)| response.map(|r| (request, r)))
            .collect();

        self.db.put_all(&self.store_name, &entries).await?;
        tracing::info!(store = %self.store_name, count = entries.len(), "pre-cached manifest");

        Ok(entries.into_iter().map(|(request, _)| request.url.to_string()).collect())
    }

    /// Take control again after a restart when this version's store was
    /// already installed by an earlier process.
    ///
    /// Returns false, leaving the worker `Uninitialized`, when there is no
    /// store for this version yet; the host must install.
    pub async fn resume(&self) -> Result<bool, Error> {
        if !self.db.has_store(&self.store_name).await? {
            tracing::debug!(store = %self.store_name, "no installed store to resume");
            return Ok(false);
        }
        self.advance(LifecycleEvent::Resume).await?;
        Ok(true)
    }

    /// Delete every store except this worker's, then resume serving.
    ///
    /// A store that fails to delete is reported in `failed` and does not
    /// abort the pass.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.advance(LifecycleEvent::Activate).await?;
        self.advance(LifecycleEvent::Evict).await?;

        let evicted = self.evict_stale_stores().await;
        self.advance(LifecycleEvent::Activated).await?;

        evicted
    }

    async fn evict_stale_stores(&self) -> Result<ActivationReport, Error> {
        let mut report = ActivationReport { kept: self.store_name.clone(), ..Default::default() };

        for name in self.db.store_names().await? {
            if name == self.store_name {
                continue;
            }
            match self.db.delete_store(&name).await {
                Ok(_) => {
                    tracing::info!(store = %name, "evicted stale cache store");
                    report.evicted.push(name);
                }
                Err(e) => {
                    tracing::warn!(store = %name, error = %e, "failed to evict stale cache store");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }

    /// Resolve the page a notification click should focus or open.
    pub fn notification_target(&self, target: Option<&str>) -> Result<Url, Error> {
        let target = target.map(str::trim).filter(|t| !t.is_empty()).unwrap_or("/");
        let url = self
            .routes
            .origin()
            .join(target)
            .map_err(|e| Error::InvalidUrl(format!("{target}: {e}")))?;

        if !self.routes.is_same_origin(&url) {
            return Err(Error::InvalidUrl(format!("{url} is outside {}", self.routes.origin())));
        }

        Ok(url)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted fetcher shared by the worker tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;

    /// Serves canned responses by URL and counts calls. When `gate` holds
    /// no permits, fetches wait until the test releases one.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        responses: Mutex<HashMap<String, Result<Response, String>>>,
        calls: Mutex<Vec<String>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn gated(gate: Arc<Semaphore>) -> Self {
            Self { gate: Some(gate), ..Self::default() }
        }

        pub fn respond(&self, url: &str, response: Response) {
            self.responses.lock().unwrap().insert(url.to_string(), Ok(response));
        }

        pub fn fail(&self, url: &str, reason: &str) {
            self.responses.lock().unwrap().insert(url.to_string(), Err(reason.to_string()));
        }

        pub fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            let url = request.url.to_string();
            self.calls.lock().unwrap().push(url.clone());

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            let scripted = self.responses.lock().unwrap().get(&url).cloned();
            match scripted {
                Some(Ok(response)) => Ok(response),
                Some(Err(reason)) => Err(Error::Network(reason)),
                None => Err(Error::Network(format!("no route to {url}"))),
            }
        }
    }

    pub const ORIGIN: &str = "https://acme.example";

    pub fn routes() -> RouteTable {
        RouteTable::from_patterns(Url::parse(ORIGIN).unwrap(), ["/api/"], [".js", ".css", ".png"])
    }

    pub fn site_url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    pub fn get(path: &str) -> Request {
        Request::get(Url::parse(&site_url(path)).unwrap())
    }

    pub async fn worker(fetcher: Arc<ScriptedFetcher>, version: &str, manifest: &[&str]) -> ServiceWorker {
        let db = CacheDb::open_in_memory().await.unwrap();
        worker_on(db, fetcher, version, manifest)
    }

    pub fn worker_on(db: CacheDb, fetcher: Arc<ScriptedFetcher>, version: &str, manifest: &[&str]) -> ServiceWorker {
        ServiceWorker::new(
            db,
            fetcher,
            routes(),
            format!("acme-{version}"),
            manifest.iter().map(|p| p.to_string()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&site_url("/"), Response::new(200, "root"));
        fetcher.respond(&site_url("/index.html"), Response::new(200, "index"));
        fetcher.respond(&site_url("/logo.png"), Response::new(200, "png"));

        let worker = worker(fetcher, "v1", &["/", "/index.html", "/logo.png"]).await;
        let report = worker.install().await.unwrap();

        assert_eq!(report.store, "acme-v1");
        assert_eq!(report.cached, vec![site_url("/"), site_url("/index.html"), site_url("/logo.png")]);
        assert_eq!(worker.state().await, LifecycleState::Active);

        let keys = worker.db().keys("acme-v1").await.unwrap();
        assert_eq!(keys, vec![site_url("/"), site_url("/index.html"), site_url("/logo.png")]);
        assert_eq!(worker.db().store_names().await.unwrap(), vec!["acme-v1"]);
    }

    #[tokio::test]
    async fn test_install_is_atomic() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&site_url("/"), Response::new(200, "root"));
        fetcher.respond(&site_url("/logo.png"), Response::new(404, "missing"));

        let worker = worker(fetcher, "v1", &["/", "/logo.png"]).await;
        let err = worker.install().await.unwrap_err();

        assert!(matches!(&err, Error::InstallFailed { url: u, reason } if u.ends_with("/logo.png") && reason == "status 404"));
        assert_eq!(worker.state().await, LifecycleState::Uninitialized);
        assert!(worker.db().store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_network_failure_then_retry() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&site_url("/"), Response::new(200, "root"));
        fetcher.fail(&site_url("/index.html"), "connection refused");

        let worker = worker(Arc::clone(&fetcher), "v1", &["/", "/index.html"]).await;
        assert!(worker.install().await.is_err());

        fetcher.respond(&site_url("/index.html"), Response::new(200, "index"));
        worker.install().await.unwrap();
        assert_eq!(worker.state().await, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_activate_evicts_every_stale_version() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for stale in ["acme-v1", "acme-v2", "unrelated"] {
            db.put_all(stale, &[(get("/"), Response::new(200, "old"))]).await.unwrap();
        }

        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&site_url("/"), Response::new(200, "new"));
        let worker = worker_on(db, fetcher, "v3", &["/"]);

        worker.install().await.unwrap();
        let report = worker.activate().await.unwrap();

        assert_eq!(report.kept, "acme-v3");
        assert_eq!(report.evicted, vec!["acme-v1", "acme-v2", "unrelated"]);
        assert!(report.failed.is_empty());
        assert_eq!(worker.db().store_names().await.unwrap(), vec!["acme-v3"]);
        assert_eq!(worker.state().await, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_activate_keeps_going_when_one_eviction_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for stale in ["acme-v1", "acme-v2", "unrelated"] {
            db.put_all(stale, &[(get("/"), Response::new(200, "old"))]).await.unwrap();
        }
        db.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER pin_v2 BEFORE DELETE ON cache_stores WHEN old.name = 'acme-v2'
                     BEGIN SELECT RAISE(ABORT, 'store is pinned'); END;",
                )
            })
            .await
            .unwrap();

        let worker = worker_on(db, Arc::new(ScriptedFetcher::new()), "v3", &[]);
        worker.install().await.unwrap();
        let report = worker.activate().await.unwrap();

        assert_eq!(report.evicted, vec!["acme-v1", "unrelated"]);
        assert_eq!(report.failed, vec!["acme-v2"]);
        assert_eq!(worker.state().await, LifecycleState::Active);
        assert_eq!(worker.db().store_names().await.unwrap(), vec!["acme-v2", "acme-v3"]);
    }

    #[tokio::test]
    async fn test_resume_serves_installed_store_offline_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");

        let online = Arc::new(ScriptedFetcher::new());
        online.respond(&site_url("/logo.png"), Response::new(200, "png"));
        let first = worker_on(CacheDb::open(&path).await.unwrap(), online, "v1", &["/logo.png"]);
        first.install().await.unwrap();
        drop(first);

        let offline = Arc::new(ScriptedFetcher::new());
        let restarted = worker_on(CacheDb::open(&path).await.unwrap(), offline, "v1", &["/logo.png"]);
        assert_eq!(restarted.state().await, LifecycleState::Uninitialized);

        assert!(restarted.resume().await.unwrap());
        assert_eq!(restarted.state().await, LifecycleState::Active);

        let outcome = restarted.handle_fetch(get("/logo.png")).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body.as_ref(), b"png");
    }

    #[tokio::test]
    async fn test_resume_without_store_needs_install() {
        let worker = worker(Arc::new(ScriptedFetcher::new()), "v1", &[]).await;
        assert!(!worker.resume().await.unwrap());
        assert_eq!(worker.state().await, LifecycleState::Uninitialized);

        worker.install().await.unwrap();
        assert!(worker.resume().await.is_err());
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let worker = worker(Arc::new(ScriptedFetcher::new()), "v1", &[]).await;
        let err = worker.activate().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(worker.state().await, LifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn test_activate_twice_is_idempotent() {
        let worker = worker(Arc::new(ScriptedFetcher::new()), "v1", &[]).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        let report = worker.activate().await.unwrap();
        assert!(report.evicted.is_empty());
        assert_eq!(worker.db().store_names().await.unwrap(), vec!["acme-v1"]);
    }

    #[tokio::test]
    async fn test_notification_target() {
        let worker = worker(Arc::new(ScriptedFetcher::new()), "v1", &[]).await;
        assert_eq!(worker.notification_target(None).unwrap().as_str(), "https://acme.example/");
        assert_eq!(worker.notification_target(Some("/careers")).unwrap().as_str(), "https://acme.example/careers");
        assert!(matches!(worker.notification_target(Some("https://evil.example/")), Err(Error::InvalidUrl(_))));
    }
}
