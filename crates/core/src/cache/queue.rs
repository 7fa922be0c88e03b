//! Parked requests awaiting a background sync.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{Headers, Request};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use url::Url;

/// A request parked under a sync tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ParkedRequest {
    pub id: i64,
    pub tag: String,
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub queued_at: String,
    pub attempts: i64,
    pub last_error: Option<String>,
}

impl ParkedRequest {
    /// Rebuild the request for resubmission.
    pub fn to_request(&self) -> Result<Request, Error> {
        let url = Url::parse(&self.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.url)))?;
        Ok(Request {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: self.body.clone().map(Into::into),
        })
    }
}

impl CacheDb {
    /// Park `request` under `tag`. Returns the queue id.
    pub async fn enqueue_request(&self, tag: &str, request: &Request) -> Result<i64, Error> {
        let tag = tag.to_string();
        let method = request.method.to_ascii_uppercase();
        let url = request.url.to_string();
        let headers_json = serde_json::to_string(&request.headers)?;
        let body = request.body.as_ref().map(|b| b.to_vec());
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO sync_queue (tag, method, url, headers_json, body, queued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![tag, method, url, headers_json, body, now],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Parked requests for `tag`, oldest first.
    pub async fn queued_requests(&self, tag: &str) -> Result<Vec<ParkedRequest>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<ParkedRequest>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, tag, method, url, headers_json, body, queued_at, attempts, last_error
                     FROM sync_queue WHERE tag = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![tag], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, Option<Vec<u8>>>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, i64>(7)?,
                            row.get::<_, Option<String>>(8)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(id, tag, method, url, headers_json, body, queued_at, attempts, last_error)| -> Result<ParkedRequest, Error> {
                        Ok(ParkedRequest {
                            id,
                            tag,
                            method,
                            url,
                            headers: serde_json::from_str(&headers_json)?,
                            body,
                            queued_at,
                            attempts,
                            last_error,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a parked request after a successful resubmission.
    pub async fn remove_queued(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record a failed resubmission; the entry stays queued.
    pub async fn record_sync_failure(&self, id: i64, reason: &str) -> Result<(), Error> {
        let reason = reason.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE sync_queue SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
                    params![id, reason],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
