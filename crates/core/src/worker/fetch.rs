//! Fetch interception and the three cache strategies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::ServiceWorker;
use crate::Error;
use crate::cache::{CacheDb, CachedEntry};
use crate::http::{Fetcher, Request, Response};
use crate::routes::{Route, Strategy};

/// Where the returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// A background refresh of one cache entry.
///
/// Dropping it detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct Revalidation(JoinHandle<Result<Response, Error>>);

impl Revalidation {
    /// Wait for the refresh and return the live response it fetched.
    pub async fn finished(self) -> Result<Response, Error> {
        match self.0.await {
            Ok(result) => result,
            Err(e) => Err(Error::Network(format!("revalidation task failed: {e}"))),
        }
    }
}

/// Response handed back to the host for one intercepted request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
    pub route: Route,
    /// Set when a cached response was returned while a refresh runs.
    pub revalidation: Option<Revalidation>,
}

impl FetchOutcome {
    fn network(response: Response, route: Route) -> Self {
        Self { response, source: ResponseSource::Network, route, revalidation: None }
    }

    fn cached(entry: CachedEntry, route: Route, revalidation: Option<Revalidation>) -> Self {
        Self { response: entry.response, source: ResponseSource::Cache, route, revalidation }
    }
}

/// Fetch `request` live and, on 200, overwrite its cache entry.
///
/// Failures never touch the existing entry.
async fn revalidate(
    db: CacheDb, fetcher: Arc<dyn Fetcher>, store: String, request: Request,
) -> Result<Response, Error> {
    let response = fetcher.fetch(&request).await.inspect_err(|e| {
        tracing::warn!(url = %request.url, error = %e, "revalidation fetch failed; keeping cached entry");
    })?;

    if response.is_cacheable() {
        write_back(&db, &store, &request, &response).await;
    } else {
        tracing::debug!(url = %request.url, status = response.status, "not caching non-200 response");
    }

    Ok(response)
}

/// Store a live response. Store failures only cost the write.
async fn write_back(db: &CacheDb, store: &str, request: &Request, response: &Response) {
    match db.put(store, request, response).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(url = %request.url, store, "store evicted; skipping cache write"),
        Err(e) => tracing::warn!(url = %request.url, store, error = %e, "cache write dropped"),
    }
}

impl ServiceWorker {
    /// Answer an intercepted request.
    ///
    /// Requests pass straight to the network while the worker is not
    /// controlling, for non-GET methods, and for other origins.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        let controlling = self.state().await.is_controlling();
        let route = if controlling && request.is_get() { self.routes.classify(&request.url) } else { Route::Bypass };

        tracing::debug!(method = %request.method, url = %request.url, ?route, "intercepted request");

        match route {
            Route::Bypass => {
                let response = self.fetcher.fetch(&request).await?;
                Ok(FetchOutcome::network(response, route))
            }
            Route::Cached(Strategy::NetworkFirst) => self.network_first(request).await,
            Route::Cached(Strategy::CacheFirst) => self.cache_first(request).await,
            Route::Cached(Strategy::StaleWhileRevalidate) => self.stale_while_revalidate(request).await,
        }
    }

    /// Live response when reachable, cached copy otherwise.
    pub async fn network_first(&self, request: Request) -> Result<FetchOutcome, Error> {
        let route = Route::Cached(Strategy::NetworkFirst);

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    write_back(&self.db, &self.store_name, &request, &response).await;
                }
                Ok(FetchOutcome::network(response, route))
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed; falling back to cache");
                match self.lookup(&request).await {
                    Some(entry) => Ok(FetchOutcome::cached(entry, route, None)),
                    None => Err(Error::CacheMiss(format!("{} (network: {e})", request.url))),
                }
            }
        }
    }

    /// Cached copy immediately with a background refresh; live fetch on miss.
    pub async fn cache_first(&self, request: Request) -> Result<FetchOutcome, Error> {
        let route = Route::Cached(Strategy::CacheFirst);

        if let Some(entry) = self.lookup(&request).await {
            tracing::debug!(url = %request.url, "cache hit");
            let refresh = self.spawn_revalidation(request);
            return Ok(FetchOutcome::cached(entry, route, Some(refresh)));
        }

        tracing::debug!(url = %request.url, "cache miss");
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::CacheMiss(format!("{} (network: {e})", request.url)))?;

        if response.is_cacheable() {
            write_back(&self.db, &self.store_name, &request, &response).await;
        }
        Ok(FetchOutcome::network(response, route))
    }

    /// Cached copy immediately when present; the live fetch starts either
    /// way and refreshes the entry. With no cached copy the live response
    /// is returned.
    pub async fn stale_while_revalidate(&self, request: Request) -> Result<FetchOutcome, Error> {
        let route = Route::Cached(Strategy::StaleWhileRevalidate);
        let url = request.url.clone();

        let cached = self.lookup(&request).await;
        let refresh = self.spawn_revalidation(request);

        if let Some(entry) = cached {
            tracing::debug!(%url, "serving stale entry while revalidating");
            return Ok(FetchOutcome::cached(entry, route, Some(refresh)));
        }

        let response = refresh
            .finished()
            .await
            .map_err(|e| Error::CacheMiss(format!("{url} (network: {e})")))?;
        Ok(FetchOutcome::network(response, route))
    }

    fn spawn_revalidation(&self, request: Request) -> Revalidation {
        let db = self.db.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let store = self.store_name.clone();
        Revalidation(tokio::spawn(revalidate(db, fetcher, store, request)))
    }

    /// Read failures are treated as a miss.
    async fn lookup(&self, request: &Request) -> Option<CachedEntry> {
        match self.db.match_request(&self.store_name, request).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }
}
