//! Named cache partitions.
//!
//! A partition is a durable mapping from a request key (method + canonical
//! URL) to the most recently stored response. The coordinator is the only
//! owner of partition lifecycle; everything else reaches the entries through
//! its interception.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A response stored in a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    /// Partition key of this entry.
    pub fn key(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Storage capability behind the coordinator.
///
/// Operations are per-key atomic; concurrent writers to the same key are not
/// serialized beyond that and the last completed `put` wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist, stamped with `created_at`
    /// (same timestamp form as `stored_at`).
    async fn open(&self, name: &str, created_at: &str) -> Result<(), Error>;

    /// Names of all existing partitions, oldest first.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Delete a partition and every entry in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// URLs stored in a partition, oldest first.
    async fn keys(&self, name: &str) -> Result<Vec<String>, Error>;

    /// Look up the entry for `method url` in a partition.
    async fn lookup(&self, name: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error>;

    /// Store an entry, replacing any previous entry for the same key.
    async fn put(&self, name: &str, entry: &CachedResponse) -> Result<(), Error>;

    /// Store all entries in one transaction; on error nothing is written.
    async fn put_all(&self, name: &str, entries: &[CachedResponse]) -> Result<(), Error>;

    /// Evict oldest entries until at most `max_entries` remain.
    async fn purge_lru(&self, name: &str, max_entries: usize) -> Result<u64, Error>;

    /// Evict entries stored before `cutoff` (RFC 3339).
    async fn purge_older_than(&self, name: &str, cutoff: &str) -> Result<u64, Error>;
}

fn upsert_entry(conn: &rusqlite::Connection, name: &str, entry: &CachedResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers)?;
    conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![name, &entry.stored_at],
    )?;
    conn.execute(
        "INSERT INTO entries (
            partition, key_hash, method, url, status, status_text, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(partition, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            name,
            entry.key(),
            &entry.method,
            &entry.url,
            entry.status,
            &entry.status_text,
            headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str, created_at: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = created_at.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY created_at ASC, rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY stored_at ASC, rowid ASC")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    async fn lookup(&self, name: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let name = name.to_string();
        let key_hash = compute_request_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT method, url, status, status_text, headers_json, body, stored_at
                        FROM entries WHERE partition = ?1 AND key_hash = ?2",
                        params![name, key_hash],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, u16>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, String>(4)?,
                                row.get::<_, Vec<u8>>(5)?,
                                row.get::<_, String>(6)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((method, url, status, status_text, headers_json, body, stored_at)) = row else {
                    return Ok(None);
                };

                Ok(Some(CachedResponse {
                    method,
                    url,
                    status,
                    status_text,
                    headers: serde_json::from_str(&headers_json)?,
                    body,
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, entry: &CachedResponse) -> Result<(), Error> {
        let name = name.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> { upsert_entry(conn, &name, &entry) })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, name: &str, entries: &[CachedResponse]) -> Result<(), Error> {
        let name = name.to_string();
        let entries = entries.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    upsert_entry(&tx, &name, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn purge_lru(&self, name: &str, max_entries: usize) -> Result<u64, Error> {
        let name = name.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![&name], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE rowid IN (
                    SELECT rowid FROM entries WHERE partition = ?1
                    ORDER BY stored_at ASC, rowid ASC LIMIT ?2
                )",
                    params![name, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn purge_older_than(&self, name: &str, cutoff: &str) -> Result<u64, Error> {
        let name = name.to_string();
        let cutoff = cutoff.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND stored_at < ?2",
                    params![name, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
