//! cache_list tool implementation.
//!
//! Enumerates cache stores and the URLs each one holds.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Error, ServiceWorker};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Only list this store. Lists every store when omitted.
    #[serde(default)]
    pub store: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreListing {
    pub name: String,
    /// True for the store the running version serves from.
    pub current: bool,
    pub keys: Vec<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub stores: Vec<StoreListing>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(worker: &ServiceWorker, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let db = worker.db();
    let names = match params.store {
        Some(name) => {
            if !db.has_store(&name).await? {
                return Err(Error::CacheMiss(format!("no cache store named {name}")).into());
            }
            vec![name]
        }
        None => db.store_names().await?,
    };

    let mut stores = Vec::with_capacity(names.len());
    for name in names {
        let keys = db.keys(&name).await?;
        stores.push(StoreListing { current: name == worker.store_name(), name, keys });
    }

    json_result(&CacheListOutput { stores })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use swcache_core::{Request, Response};

    use super::*;
    use crate::tools::testing::*;

    #[tokio::test]
    async fn test_list_all_stores() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.respond("/", Response::new(200, "root"));
        fetcher.respond("/index.html", Response::new(200, "index"));
        let worker = worker(fetcher, &["/", "/index.html"]).await;
        worker.install().await.unwrap();

        let legacy = Request::get(url::Url::parse("https://acme.example/old.css").unwrap());
        worker.db().put_all("acme-v0", &[(legacy, Response::new(200, "body{}"))]).await.unwrap();

        let out = output(list_impl(&worker, CacheListParams::default()).await.unwrap());
        let stores = out["stores"].as_array().unwrap();
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0]["name"], "acme-v0");
        assert_eq!(stores[0]["current"], false);
        assert_eq!(stores[1]["name"], "acme-v1");
        assert_eq!(stores[1]["current"], true);
        assert_eq!(
            stores[1]["keys"],
            serde_json::json!(["https://acme.example/", "https://acme.example/index.html"])
        );
    }

    #[tokio::test]
    async fn test_list_unknown_store() {
        let worker = worker(Arc::new(StubFetcher::default()), &[]).await;
        let params = CacheListParams { store: Some("acme-v9".into()) };
        let err = list_impl(&worker, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }
}
