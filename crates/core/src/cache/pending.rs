//! Durable queue of user actions that could not reach the network.
//!
//! Actions are replayed strictly in enqueue order. A failed replay is never
//! dropped: it is either rescheduled or marked dead and kept for inspection.

use super::connection::CacheDb;
use crate::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A write captured while offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NewAction {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

/// A queued action with its replay bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PendingAction {
    pub id: i64,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub enqueued_at: String,
    pub attempts: u32,
    pub next_attempt_at: Option<String>,
    pub last_error: Option<String>,
    pub dead: bool,
}

/// Outcome of a failed replay attempt.
#[derive(Debug, Clone)]
pub struct ReplayFailure {
    pub error: String,
    /// Earliest time the action may be retried; ignored when `dead`.
    pub next_attempt_at: Option<String>,
    /// Stop retrying; the action stays in the store flagged as dead.
    pub dead: bool,
}

/// Persistence capability for offline actions.
#[async_trait]
pub trait PendingActionStore: Send + Sync {
    /// Append an action; returns its id. Ids grow with enqueue order.
    async fn enqueue(&self, action: &NewAction, enqueued_at: &str) -> Result<i64, Error>;

    /// Live (not dead) actions in enqueue order.
    async fn pending(&self) -> Result<Vec<PendingAction>, Error>;

    /// Oldest live action, if any.
    async fn peek(&self) -> Result<Option<PendingAction>, Error>;

    /// Remove and return every live action in one transaction.
    async fn dequeue_all(&self) -> Result<Vec<PendingAction>, Error>;

    /// Remove an action after a successful replay.
    async fn remove(&self, id: i64) -> Result<(), Error>;

    /// Record a failed attempt, bumping the attempt counter.
    async fn record_failure(&self, id: i64, failure: &ReplayFailure) -> Result<(), Error>;

    /// Dead-lettered actions in enqueue order.
    async fn dead(&self) -> Result<Vec<PendingAction>, Error>;
}

const SELECT_ACTION: &str = "SELECT id, method, url, headers_json, body, enqueued_at, attempts,
    next_attempt_at, last_error, dead FROM pending_actions";

fn read_action(row: &rusqlite::Row<'_>) -> rusqlite::Result<(PendingAction, String)> {
    let headers_json: String = row.get(3)?;
    let action = PendingAction {
        id: row.get(0)?,
        method: row.get(1)?,
        url: row.get(2)?,
        headers: Vec::new(),
        body: row.get(4)?,
        enqueued_at: row.get(5)?,
        attempts: row.get(6)?,
        next_attempt_at: row.get(7)?,
        last_error: row.get(8)?,
        dead: row.get::<_, i32>(9)? == 1,
    };
    Ok((action, headers_json))
}

fn decode(rows: Vec<(PendingAction, String)>) -> Result<Vec<PendingAction>, Error> {
    rows.into_iter()
        .map(|(mut action, headers_json)| {
            action.headers = serde_json::from_str(&headers_json)?;
            Ok(action)
        })
        .collect()
}

fn query_actions(conn: &rusqlite::Connection, dead: bool) -> Result<Vec<PendingAction>, Error> {
    let mut stmt = conn.prepare(&format!("{SELECT_ACTION} WHERE dead = ?1 ORDER BY id ASC"))?;
    let rows = stmt
        .query_map(params![dead as i32], read_action)?
        .collect::<Result<Vec<_>, _>>()?;
    decode(rows)
}

#[async_trait]
impl PendingActionStore for CacheDb {
    async fn enqueue(&self, action: &NewAction, enqueued_at: &str) -> Result<i64, Error> {
        let action = action.clone();
        let enqueued_at = enqueued_at.to_string();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                let headers_json = serde_json::to_string(&action.headers)?;
                conn.execute(
                    "INSERT INTO pending_actions (method, url, headers_json, body, enqueued_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![action.method.to_ascii_uppercase(), action.url, headers_json, action.body, enqueued_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    async fn pending(&self) -> Result<Vec<PendingAction>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PendingAction>, Error> { query_actions(conn, false) })
            .await
            .map_err(Error::from)
    }

    async fn peek(&self) -> Result<Option<PendingAction>, Error> {
        self.conn
            .call(|conn| -> Result<Option<PendingAction>, Error> {
                let row = conn
                    .query_row(&format!("{SELECT_ACTION} WHERE dead = 0 ORDER BY id ASC LIMIT 1"), [], read_action)
                    .optional()?;
                Ok(decode(row.into_iter().collect())?.pop())
            })
            .await
            .map_err(Error::from)
    }

    async fn dequeue_all(&self) -> Result<Vec<PendingAction>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PendingAction>, Error> {
                let tx = conn.transaction()?;
                let actions = query_actions(&tx, false)?;
                tx.execute("DELETE FROM pending_actions WHERE dead = 0", [])?;
                tx.commit()?;
                Ok(actions)
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, id: i64) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let deleted = conn.execute("DELETE FROM pending_actions WHERE id = ?1", params![id])?;
                if deleted == 0 {
                    return Err(Error::ActionNotFound(id));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn record_failure(&self, id: i64, failure: &ReplayFailure) -> Result<(), Error> {
        let failure = failure.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let updated = conn.execute(
                    "UPDATE pending_actions
                    SET attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3, dead = ?4
                    WHERE id = ?1",
                    params![id, failure.error, failure.next_attempt_at, failure.dead as i32],
                )?;
                if updated == 0 {
                    return Err(Error::ActionNotFound(id));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn dead(&self) -> Result<Vec<PendingAction>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PendingAction>, Error> { query_actions(conn, true) })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(url: &str) -> NewAction {
        NewAction {
            method: "post".to_string(),
            url: url.to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(br#"{"title":"Lisbon"}"#.to_vec()),
        }
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = db.enqueue(&action("https://example.com/api/trips"), "2026-01-01T00:00:00Z").await.unwrap();
        let second = db.enqueue(&action("https://example.com/api/events"), "2026-01-01T00:00:00Z").await.unwrap();
        assert!(second > first);

        let pending = db.pending().await.unwrap();
        assert_eq!(pending.iter().map(|a| a.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(pending[0].method, "POST");
        assert_eq!(pending[0].headers[0].0, "content-type");
        assert_eq!(db.peek().await.unwrap().unwrap().id, first);
    }

    #[tokio::test]
    async fn test_record_failure_and_dead_letter() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = db.enqueue(&action("https://example.com/api/trips"), "2026-01-01T00:00:00Z").await.unwrap();

        let retry = ReplayFailure {
            error: "status 503".to_string(),
            next_attempt_at: Some("2026-01-01T00:01:00Z".to_string()),
            dead: false,
        };
        db.record_failure(id, &retry).await.unwrap();

        let pending = db.peek().await.unwrap().unwrap();
        assert_eq!(pending.attempts, 1);
        assert_eq!(pending.last_error.as_deref(), Some("status 503"));

        let give_up = ReplayFailure { error: "status 400".to_string(), next_attempt_at: None, dead: true };
        db.record_failure(id, &give_up).await.unwrap();

        assert!(db.pending().await.unwrap().is_empty());
        let dead = db.dead().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_remove_missing_action() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(matches!(db.remove(42).await, Err(Error::ActionNotFound(42))));
    }

    #[tokio::test]
    async fn test_dequeue_all_leaves_dead_actions() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let live = db.enqueue(&action("https://example.com/api/a"), "2026-01-01T00:00:00Z").await.unwrap();
        let dead = db.enqueue(&action("https://example.com/api/b"), "2026-01-01T00:00:00Z").await.unwrap();
        db.record_failure(dead, &ReplayFailure { error: "gone".into(), next_attempt_at: None, dead: true })
            .await
            .unwrap();

        let drained = db.dequeue_all().await.unwrap();
        assert_eq!(drained.iter().map(|a| a.id).collect::<Vec<_>>(), vec![live]);
        assert!(db.pending().await.unwrap().is_empty());
        assert_eq!(db.dead().await.unwrap().len(), 1);
    }
}
