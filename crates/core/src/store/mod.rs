//! Versioned cache store over SQLite.
//!
//! The store owns all cached response snapshots, grouped into named
//! generations. Exactly one generation is current at any time; stale
//! generations are deleted wholesale during activation. Within a generation,
//! writes are last-write-wins per entry key.

pub mod connection;
pub mod key;
pub mod migrations;

pub use connection::CacheDb;

use crate::Error;
use crate::http::{Request, Response};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// The versioned store: creation, enumeration, and deletion of generations.
///
/// Entry reads and writes go through a [`CacheHandle`] obtained from
/// [`VersionedStore::open`].
#[derive(Clone, Debug)]
pub struct VersionedStore {
    db: CacheDb,
    allow_opaque: bool,
}

impl VersionedStore {
    pub fn new(db: CacheDb, allow_opaque: bool) -> Self {
        Self { db, allow_opaque }
    }

    /// Open a generation, creating it if absent. Idempotent.
    pub async fn open(&self, name: &str) -> Result<CacheHandle, Error> {
        let generation = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO generations (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![generation, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheHandle {
            db: self.db.clone(),
            name: name.to_string(),
            allow_opaque: self.allow_opaque,
        })
    }

    /// All generation names currently present, in no significant order.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.db
            .conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a generation and all its entries.
    pub async fn delete(&self, name: &str) -> Result<(), Error> {
        let generation = name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM generations WHERE name = ?1", params![generation])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

/// Handle to one named generation.
///
/// Cloneable and cheap to pass into background tasks; all clones address the
/// same underlying store.
#[derive(Clone, Debug)]
pub struct CacheHandle {
    db: CacheDb,
    name: String,
    allow_opaque: bool,
}

impl CacheHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response snapshot keyed by the request.
    ///
    /// Returns `Ok(false)` when the pair is not cacheable (non-GET request,
    /// or a response that is neither status 200 nor a permitted opaque one);
    /// nothing is written in that case. Overwrites an existing entry for the
    /// same key silently.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<bool, Error> {
        if !request.is_get() || !response.is_cacheable(self.allow_opaque) {
            return Ok(false);
        }

        let entry_key = key::entry_key(&request.method, &request.url);
        let generation = self.name.clone();
        let url = request.url.to_string();
        let status = i64::from(response.status);
        let opaque = response.opaque as i32;
        let headers_json = serde_json::to_string(&response.headers).ok();
        let body = response.body.to_vec();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        generation, key, url, status, opaque, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(generation, key) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        opaque = excluded.opaque,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![generation, entry_key, url, status, opaque, headers_json, body, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(true)
    }

    /// Exact-match lookup for a request. Non-GET requests never match.
    pub async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        self.lookup_key(key::entry_key(&request.method, &request.url)).await
    }

    /// Lookup against a canonical URL key, e.g. a navigation fallback page.
    pub async fn lookup_url(&self, url: &Url) -> Result<Option<Response>, Error> {
        self.lookup_key(key::entry_key("GET", url)).await
    }

    async fn lookup_key(&self, entry_key: String) -> Result<Option<Response>, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, opaque, headers_json, body FROM entries
                     WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, entry_key], |row| {
                    let headers_json: Option<String> = row.get(2)?;
                    Ok(Response {
                        status: row.get::<_, i64>(0)? as u16,
                        opaque: row.get::<_, i32>(1)? == 1,
                        headers: headers_json
                            .as_deref()
                            .and_then(|json| serde_json::from_str(json).ok())
                            .unwrap_or_default(),
                        body: Bytes::from(row.get::<_, Vec<u8>>(3)?),
                    })
                });

                match result {
                    Ok(response) => Ok(Some(response)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn ok_response(body: &'static str) -> Response {
        Response {
            status: 200,
            opaque: false,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::from(body),
        }
    }

    async fn store() -> VersionedStore {
        VersionedStore::new(CacheDb::open_in_memory().await.unwrap(), false)
    }

    #[tokio::test]
    async fn test_put_and_lookup_round_trip() {
        let cache = store().await.open("static-v1").await.unwrap();
        let request = Request::get(url("https://example.com/index.html"));

        let stored = cache.put(&request, &ok_response("hello")).await.unwrap();
        assert!(stored);

        let hit = cache.lookup(&request).await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body.as_ref(), b"hello");
        assert_eq!(hit.headers[0].0, "content-type");
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let cache = store().await.open("static-v1").await.unwrap();
        let request = Request::get(url("https://example.com/missing"));
        assert!(cache.lookup(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let cache = store().await.open("static-v1").await.unwrap();
        let request = Request::new("POST", url("https://example.com/submit"));

        let stored = cache.put(&request, &ok_response("ignored")).await.unwrap();
        assert!(!stored);
        assert!(cache.lookup_url(&url("https://example.com/submit")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_non_200() {
        let cache = store().await.open("static-v1").await.unwrap();
        let request = Request::get(url("https://example.com/gone"));

        let stored = cache.put(&request, &Response::new(404, "not found")).await.unwrap();
        assert!(!stored);
        assert!(cache.lookup(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_opaque_gated_by_policy() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get(url("https://cdn.example.com/lib.js"));

        let strict = VersionedStore::new(db.clone(), false).open("static-v1").await.unwrap();
        assert!(!strict.put(&request, &Response::opaque("blob")).await.unwrap());

        let permissive = VersionedStore::new(db, true).open("static-v1").await.unwrap();
        assert!(permissive.put(&request, &Response::opaque("blob")).await.unwrap());

        let hit = permissive.lookup(&request).await.unwrap().unwrap();
        assert!(hit.opaque);
        assert_eq!(hit.status, 0);
    }

    #[tokio::test]
    async fn test_put_overwrites_last_write_wins() {
        let cache = store().await.open("static-v1").await.unwrap();
        let request = Request::get(url("https://example.com/app.js"));

        cache.put(&request, &ok_response("v1 body")).await.unwrap();
        cache.put(&request, &ok_response("v2 body")).await.unwrap();

        let hit = cache.lookup(&request).await.unwrap().unwrap();
        assert_eq!(hit.body.as_ref(), b"v2 body");
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let store = store().await;
        store.open("static-v1").await.unwrap();
        store.open("static-v1").await.unwrap();
        assert_eq!(store.list_generations().await.unwrap(), vec!["static-v1"]);
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let store = store().await;
        let v1 = store.open("static-v1").await.unwrap();
        let v2 = store.open("static-v2").await.unwrap();
        let request = Request::get(url("https://example.com/"));

        v1.put(&request, &ok_response("old")).await.unwrap();

        assert!(v2.lookup(&request).await.unwrap().is_none());
        assert_eq!(v1.lookup(&request).await.unwrap().unwrap().body.as_ref(), b"old");
    }

    #[tokio::test]
    async fn test_delete_removes_generation_and_entries() {
        let store = store().await;
        let v1 = store.open("static-v1").await.unwrap();
        let request = Request::get(url("https://example.com/"));
        v1.put(&request, &ok_response("old")).await.unwrap();

        store.delete("static-v1").await.unwrap();

        assert!(store.list_generations().await.unwrap().is_empty());
        // Reopening yields an empty generation; old entries are unreachable.
        let reopened = store.open("static-v1").await.unwrap();
        assert!(reopened.lookup(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_generation_is_ok() {
        let store = store().await;
        store.delete("static-v9").await.unwrap();
    }
}
