//! Named cache stores and their entries.
//!
//! Mirrors the host cache API: open a store by name, enumerate and delete
//! stores, and match, put, list or delete entries inside one store.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use crate::http::{Headers, Request, Response};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A stored response together with the request identity it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub method: String,
    pub url: String,
    pub response: Response,
    pub stored_at: String,
}

/// Row shape shared by `put` and `put_all`.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        let method = request.method.to_ascii_uppercase();
        let url = request.url.to_string();
        Ok(Self {
            key_hash: compute_request_key(&method, &url),
            method,
            url,
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }

    fn write(&self, conn: &rusqlite::Connection, store: &str, stored_at: &str) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO cache_entries (store, key_hash, method, url, status, headers_json, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(store, key_hash) DO UPDATE SET
                status = excluded.status,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                store,
                &self.key_hash,
                &self.method,
                &self.url,
                self.status,
                &self.headers_json,
                &self.body,
                stored_at
            ],
        )?;
        Ok(())
    }
}

impl CacheDb {
    /// Create the named store if it does not exist yet.
    pub async fn open_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_stores (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a store with this name exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All store names, sorted.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no store had that name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry stored for `request` in `store`.
    pub async fn match_request(&self, store: &str, request: &Request) -> Result<Option<CachedEntry>, Error> {
        let store = store.to_string();
        let key_hash = compute_request_key(&request.method, request.url.as_str());
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let row = conn
                    .query_row(
                        "SELECT method, url, status, headers_json, body, stored_at
                         FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                        params![store, key_hash],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, u16>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Vec<u8>>(4)?,
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((method, url, status, headers_json, body, stored_at)) = row else {
                    return Ok(None);
                };
                let headers: Headers = serde_json::from_str(&headers_json)?;

                Ok(Some(CachedEntry {
                    method,
                    url,
                    response: Response { status, headers, body: body.into() },
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Store `response` for `request` in an existing store. An existing
    /// entry for the same request is replaced.
    ///
    /// Returns false without writing when `store` does not exist, so a late
    /// write cannot bring back an evicted store.
    pub async fn put(&self, store: &str, request: &Request, response: &Response) -> Result<bool, Error> {
        let store = store.to_string();
        let row = EntryRow::new(request, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let exists: bool =
                    tx.query_row("SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)", params![store], |row| {
                        row.get(0)
                    })?;
                if !exists {
                    return Ok(false);
                }
                row.write(&tx, &store, &now)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Create `store` and write every pair in a single transaction.
    ///
    /// Either all entries land or none do.
    pub async fn put_all(&self, store: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        let store = store.to_string();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO cache_stores (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![store, now],
                )?;
                for row in &rows {
                    row.write(&tx, &store, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every entry in `store`, sorted.
    pub async fn keys(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry for `request` from `store`.
    pub async fn delete_entry(&self, store: &str, request: &Request) -> Result<bool, Error> {
        let store = store.to_string();
        let key_hash = compute_request_key(&request.method, request.url.as_str());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                    params![store, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
