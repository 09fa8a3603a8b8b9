//! Entry reads and writes for the SQLite store.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::{CacheStore, RequestKey, StoredResponse};
use crate::Error;
use crate::http::{Headers, Response, ResponseKind};

impl CacheDb {
    /// Insert or replace an entry.
    ///
    /// The generation row is created in the same transaction so a write
    /// never lands in a generation that does not exist.
    pub async fn upsert_entry(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let generation = generation.to_string();
        let key = key.clone();
        let response = response.clone();
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![&generation, &now],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    generation, key_hash, method, url, status, kind, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(generation, key_hash) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    kind = excluded.kind,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &generation,
                        key.hash(),
                        &key.method,
                        &key.url,
                        response.status as i32,
                        response.kind.as_str(),
                        &headers_json,
                        &response.body[..],
                        &now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key.
    ///
    /// Returns None if the generation or the key doesn't exist.
    pub async fn get_entry(&self, generation: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let generation = generation.to_string();
        let key = key.clone();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, kind, headers_json, body, stored_at
                FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key.hash()], |row| {
                    Ok((
                        row.get::<_, i32>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                });

                let (status, kind, headers_json, body, stored_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let kind = ResponseKind::parse(&kind).ok_or_else(|| Error::CorruptEntry(format!("kind {kind}")))?;
                let headers: Headers =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?;

                Ok(Some(StoredResponse {
                    key,
                    response: Response { status, kind, headers, body: body.into() },
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// List the keys stored in a generation, ordered by URL.
    pub async fn entry_keys(&self, generation: &str) -> Result<Vec<RequestKey>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE generation = ?1 ORDER BY url")?;
                let keys = stmt
                    .query_map(params![generation], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.open_generation(name).await
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.list_generations().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_generation(name).await
    }

    async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        self.get_entry(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.upsert_entry(name, key, response).await
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        self.entry_keys(name).await
    }
}
