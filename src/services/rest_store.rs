//! PostgREST-style remote bookmark store for Linkdock.
//!
//! Speaks the managed backend's REST dialect: row filters as query
//! parameters (`id=eq.…`, `or=(title.ilike.…,url.ilike.…)`), exact counts
//! via the `Prefer: count=exact` / `Content-Range` pair, and
//! `return=representation` on insert.
//!
//! The change feed is a per-subscription polling task that snapshots the
//! owner's rows and diffs consecutive snapshots into tagged events. That
//! delivers at-least-once with no ordering guarantee — the same contract
//! the reconciler is written against, so a missed poll or a duplicate
//! diff is harmless.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::services::store::{BookmarkStore, SubscriptionHandle};
use crate::types::bookmark::{Bookmark, BookmarkPage, BookmarkPatch, BookmarkQuery, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::events::ChangeEvent;

/// Upper bound on rows fetched per feed snapshot.
const FEED_SNAPSHOT_LIMIT: u64 = 1000;

/// Bookmark store backed by a PostgREST-compatible HTTP API.
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    feeds: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_subscription: AtomicU64,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            poll_interval: Duration::from_secs(3),
            feeds: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Overrides the change-feed polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn rows_url(&self) -> String {
        format!("{}/rest/v1/bookmarks", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

/// Parses the total row count out of a `Content-Range` header value such
/// as `0-9/57` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// Pulls the human-readable `message` out of a PostgREST error body such
/// as `{"code":"23505","message":"duplicate key value"}`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}

/// Status plus the backend's error message, when the body carries one.
async fn failure_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let message = response
        .text()
        .await
        .ok()
        .and_then(|body| extract_error_message(&body));
    match message {
        Some(message) => format!("{} ({})", status, message),
        None => status.to_string(),
    }
}

/// Diffs two snapshots of an owner's rows into change events.
///
/// New ids become `Created`, missing ids become `Deleted`, and rows whose
/// fields differ become `Updated` with the changed fields. Kept as a free
/// function so the feed logic is unit-testable without a server.
pub fn diff_snapshots(
    previous: &HashMap<String, Bookmark>,
    current: &[Bookmark],
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for row in current {
        match previous.get(&row.id) {
            None => events.push(ChangeEvent::Created(row.clone())),
            Some(old) if old != row => {
                let patch = BookmarkPatch {
                    title: (old.title != row.title).then(|| row.title.clone()),
                    url: (old.url != row.url).then(|| row.url.clone()),
                    thumbnail_url: (old.thumbnail_url != row.thumbnail_url)
                        .then(|| row.thumbnail_url.clone())
                        .flatten(),
                };
                events.push(ChangeEvent::Updated {
                    id: row.id.clone(),
                    patch,
                });
            }
            Some(_) => {}
        }
    }

    for id in previous.keys() {
        if !current.iter().any(|row| &row.id == id) {
            events.push(ChangeEvent::Deleted { id: id.clone() });
        }
    }

    events
}

#[async_trait]
impl BookmarkStore for RestStore {
    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark, StoreError> {
        let response = self
            .authed(self.http.post(self.rows_url()))
            .header("Prefer", "return=representation")
            .json(bookmark)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::WriteFailed(format!(
                "insert returned {}",
                failure_detail(response).await
            )));
        }

        let mut rows: Vec<Bookmark> = response
            .json()
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        rows.pop()
            .ok_or_else(|| StoreError::WriteFailed("insert returned no row".to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .authed(self.http.delete(self.rows_url()))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::WriteFailed(format!(
                "delete returned {}",
                failure_detail(response).await
            )));
        }
        Ok(())
    }

    async fn update(&self, id: &str, patch: &BookmarkPatch) -> Result<(), StoreError> {
        let response = self
            .authed(self.http.patch(self.rows_url()))
            .query(&[("id", format!("eq.{}", id))])
            .json(patch)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::WriteFailed(format!(
                "update returned {}",
                failure_detail(response).await
            )));
        }
        Ok(())
    }

    async fn query(&self, query: &BookmarkQuery) -> Result<BookmarkPage, StoreError> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("owner_id".to_string(), format!("eq.{}", query.owner_id)),
            ("order".to_string(), "created_at.desc".to_string()),
            ("offset".to_string(), query.offset.to_string()),
            ("limit".to_string(), query.limit.to_string()),
        ];
        if let Some(ref term) = query.search_term {
            params.push((
                "or".to_string(),
                format!("(title.ilike.*{}*,url.ilike.*{}*)", term, term),
            ));
        }

        let response = self
            .authed(self.http.get(self.rows_url()))
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::QueryFailed(format!(
                "query returned {}",
                failure_detail(response).await
            )));
        }

        let total_count = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(0);

        let rows: Vec<Bookmark> = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(BookmarkPage { rows, total_count })
    }

    fn subscribe(
        &self,
        owner_id: &str,
        sender: UnboundedSender<ChangeEvent>,
    ) -> SubscriptionHandle {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);

        let http = self.http.clone();
        let rows_url = self.rows_url();
        let api_key = self.api_key.clone();
        let owner = owner_id.to_string();
        let interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut known: Option<HashMap<String, Bookmark>> = None;
            loop {
                tokio::time::sleep(interval).await;

                let request = http
                    .get(&rows_url)
                    .header("apikey", &api_key)
                    .header("Authorization", format!("Bearer {}", api_key))
                    .query(&[
                        ("select", "*".to_string()),
                        ("owner_id", format!("eq.{}", owner)),
                        ("order", "created_at.desc".to_string()),
                        ("limit", FEED_SNAPSHOT_LIMIT.to_string()),
                    ]);

                let rows: Vec<Bookmark> = match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        match response.json().await {
                            Ok(rows) => rows,
                            Err(e) => {
                                warn!("change-feed decode failed: {}", e);
                                continue;
                            }
                        }
                    }
                    Ok(response) => {
                        warn!("change-feed poll returned {}", response.status());
                        continue;
                    }
                    Err(e) => {
                        warn!("change-feed poll failed: {}", e);
                        continue;
                    }
                };

                if let Some(ref previous) = known {
                    for event in diff_snapshots(previous, &rows) {
                        if sender.send(event).is_err() {
                            debug!("change-feed receiver closed, stopping poller");
                            return;
                        }
                    }
                }
                known = Some(rows.into_iter().map(|b| (b.id.clone(), b)).collect());
            }
        });

        let mut feeds = match self.feeds.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        feeds.insert(id, task);
        SubscriptionHandle(id)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut feeds = match self.feeds.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(task) = feeds.remove(&handle.0) {
            task.abort();
        }
    }
}
