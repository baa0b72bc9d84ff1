//! Entry CRUD for the SQLite store and its [`CacheStorage`] implementation.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::{CacheGeneration, CacheStorage, RequestKey, ensure_cacheable_method, is_cacheable_method};
use crate::Error;
use crate::http::{Headers, Request, Response, ResponseType};

/// Raw column values of one entry row.
struct EntryRow {
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_type: String,
}

impl EntryRow {
    fn into_response(self) -> Result<Response, Error> {
        let headers: Headers = serde_json::from_str(&self.headers_json)?;
        Ok(Response {
            status: self.status,
            status_text: self.status_text,
            headers,
            body: Bytes::from(self.body),
            kind: self.response_type.parse::<ResponseType>()?,
        })
    }
}

impl CacheDb {
    /// Insert or replace the entry for `request` in `generation`.
    ///
    /// The generation must exist; writing into a deleted generation fails
    /// on the foreign key rather than resurrecting it.
    pub async fn upsert_entry(&self, generation: &str, request: &Request, response: &Response) -> Result<(), Error> {
        ensure_cacheable_method(request)?;

        let generation = generation.to_string();
        let key = RequestKey::for_request(request);
        let method = request.method.as_str();
        let url = request.url.to_string();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                    generation, key, method, url, status, status_text,
                    headers_json, body, response_type, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(generation, key) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    status_text = excluded.status_text,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    response_type = excluded.response_type,
                    stored_at = excluded.stored_at",
                    params![
                        &generation,
                        key.as_str(),
                        method,
                        &url,
                        response.status,
                        &response.status_text,
                        &headers_json,
                        &response.body[..],
                        response.kind.as_str(),
                        &stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `request` in `generation`.
    ///
    /// Returns None on a miss, including for non-GET requests.
    pub async fn get_entry(&self, generation: &str, request: &Request) -> Result<Option<Response>, Error> {
        if !is_cacheable_method(request.method) {
            return Ok(None);
        }

        let generation = generation.to_string();
        let key = RequestKey::for_request(request);
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let result = conn.query_row(
                    "SELECT status, status_text, headers_json, body, response_type
                FROM entries WHERE generation = ?1 AND key = ?2",
                    params![generation, key.as_str()],
                    |row| {
                        Ok(EntryRow {
                            status: row.get(0)?,
                            status_text: row.get(1)?,
                            headers_json: row.get(2)?,
                            body: row.get(3)?,
                            response_type: row.get(4)?,
                        })
                    },
                );

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    pub async fn delete_entry(&self, generation: &str, request: &Request) -> Result<bool, Error> {
        let generation = generation.to_string();
        let key = RequestKey::for_request(request);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE generation = ?1 AND key = ?2",
                    params![generation, key.as_str()],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_entries(&self, generation: &str) -> Result<usize, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}

/// Handle to one generation in a [`CacheDb`].
#[derive(Debug, Clone)]
pub struct SqliteGeneration {
    db: CacheDb,
    name: String,
}

#[async_trait]
impl CacheGeneration for SqliteGeneration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error> {
        self.db.get_entry(&self.name, request).await
    }

    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.db.upsert_entry(&self.name, request, response).await
    }

    async fn remove(&self, request: &Request) -> Result<bool, Error> {
        self.db.delete_entry(&self.name, request).await
    }

    async fn entry_count(&self) -> Result<usize, Error> {
        self.db.count_entries(&self.name).await
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheGeneration>, Error> {
        if self.create_generation(name).await? {
            tracing::debug!("created cache generation {}", name);
        }
        Ok(Arc::new(SqliteGeneration { db: self.clone(), name: name.to_string() }))
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.generation_exists(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_generation(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }
}
