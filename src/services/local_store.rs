//! SQLite-backed bookmark store for Linkdock.
//!
//! Reference implementation of the [`BookmarkStore`] contract, used by the
//! demo binary and the integration tests. Change events are fanned out
//! in-process to every matching subscriber after each committed write.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, Connection};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::services::store::{BookmarkStore, SubscriptionHandle};
use crate::types::bookmark::{Bookmark, BookmarkPage, BookmarkPatch, BookmarkQuery, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::events::ChangeEvent;

/// Bookmark store backed by a SQLite database.
pub struct LocalStore {
    conn: Mutex<Connection>,
    subscribers: Mutex<HashMap<u64, (String, UnboundedSender<ChangeEvent>)>>,
    next_subscription: AtomicU64,
}

impl LocalStore {
    /// Opens (or creates) the store at the given path and ensures the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store. Discarded on drop; useful for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        // Idempotent schema creation, safe on every open
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bookmarks (
                 id TEXT PRIMARY KEY,
                 title TEXT NOT NULL,
                 url TEXT NOT NULL,
                 owner_id TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 thumbnail_url TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_bookmarks_owner_created
                 ON bookmarks(owner_id, created_at DESC);",
        )
        .map_err(db_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let created_at: String = row.get(4)?;
        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            owner_id: row.get(3)?,
            created_at: created_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            thumbnail_url: row.get(5)?,
        })
    }

    /// Delivers an event to every subscriber registered for `owner_id`.
    /// Closed receivers are pruned on the way.
    fn broadcast(&self, owner_id: &str, event: ChangeEvent) {
        let mut subs = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.retain(|_, (owner, sender)| {
            if owner != owner_id {
                return true;
            }
            if sender.send(event.clone()).is_err() {
                warn!("dropping closed change-feed subscriber for {}", owner_id);
                return false;
            }
            true
        });
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Owner of the row, looked up before a delete so the event can be
    /// routed to the right subscribers.
    fn owner_of(&self, id: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock_conn();
        match conn.query_row(
            "SELECT owner_id FROM bookmarks WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        ) {
            Ok(owner) => Ok(Some(owner)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::QueryFailed(e.to_string())
}

#[async_trait]
impl BookmarkStore for LocalStore {
    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark, StoreError> {
        let record = Bookmark {
            id: Uuid::new_v4().to_string(),
            title: bookmark.title.clone(),
            url: bookmark.url.clone(),
            owner_id: bookmark.owner_id.clone(),
            created_at: Utc::now(),
            thumbnail_url: bookmark.thumbnail_url.clone(),
        };

        {
            let conn = self.lock_conn();
            conn.execute(
                "INSERT INTO bookmarks (id, title, url, owner_id, created_at, thumbnail_url) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.title,
                    record.url,
                    record.owner_id,
                    // Fixed-width timestamps keep the textual DESC order exact
                    record
                        .created_at
                        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
                    record.thumbnail_url,
                ],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }

        self.broadcast(&record.owner_id, ChangeEvent::Created(record.clone()));
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let owner = self
            .owner_of(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let affected = {
            let conn = self.lock_conn();
            conn.execute("DELETE FROM bookmarks WHERE id = ?1", params![id])
                .map_err(|e| StoreError::WriteFailed(e.to_string()))?
        };
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.broadcast(&owner, ChangeEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    async fn update(&self, id: &str, patch: &BookmarkPatch) -> Result<(), StoreError> {
        let owner = self
            .owner_of(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let affected = {
            let conn = self.lock_conn();
            conn.execute(
                "UPDATE bookmarks SET \
                     title = COALESCE(?1, title), \
                     url = COALESCE(?2, url), \
                     thumbnail_url = COALESCE(?3, thumbnail_url) \
                 WHERE id = ?4",
                params![patch.title, patch.url, patch.thumbnail_url, id],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?
        };
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.broadcast(
            &owner,
            ChangeEvent::Updated {
                id: id.to_string(),
                patch: patch.clone(),
            },
        );
        Ok(())
    }

    async fn query(&self, query: &BookmarkQuery) -> Result<BookmarkPage, StoreError> {
        let conn = self.lock_conn();
        let pattern = query
            .search_term
            .as_ref()
            .map(|term| format!("%{}%", term));

        let total_count: i64 = match pattern {
            Some(ref p) => conn.query_row(
                "SELECT COUNT(*) FROM bookmarks \
                 WHERE owner_id = ?1 AND (title LIKE ?2 OR url LIKE ?2)",
                params![query.owner_id, p],
                |row| row.get(0),
            ),
            None => conn.query_row(
                "SELECT COUNT(*) FROM bookmarks WHERE owner_id = ?1",
                params![query.owner_id],
                |row| row.get(0),
            ),
        }
        .map_err(db_err)?;

        let mut stmt = match pattern {
            Some(_) => conn.prepare(
                "SELECT id, title, url, owner_id, created_at, thumbnail_url FROM bookmarks \
                 WHERE owner_id = ?1 AND (title LIKE ?2 OR url LIKE ?2) \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            ),
            None => conn.prepare(
                "SELECT id, title, url, owner_id, created_at, thumbnail_url FROM bookmarks \
                 WHERE owner_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            ),
        }
        .map_err(db_err)?;

        let rows = match pattern {
            Some(ref p) => stmt.query_map(
                params![query.owner_id, p, query.limit as i64, query.offset as i64],
                Self::row_to_bookmark,
            ),
            None => stmt.query_map(
                params![query.owner_id, query.limit as i64, query.offset as i64],
                Self::row_to_bookmark,
            ),
        }
        .map_err(db_err)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(db_err)?);
        }

        Ok(BookmarkPage {
            rows: results,
            total_count: total_count.max(0) as u64,
        })
    }

    fn subscribe(
        &self,
        owner_id: &str,
        sender: UnboundedSender<ChangeEvent>,
    ) -> SubscriptionHandle {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let mut subs = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.insert(id, (owner_id.to_string(), sender));
        SubscriptionHandle(id)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut subs = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.remove(&handle.0);
    }
}
