//! Data-access collaborator contract for Linkdock.
//!
//! The dashboard is written against this port; the backend behind it is
//! opaque. Two implementations ship with the crate: a SQLite-backed
//! reference store and a PostgREST-style remote store.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::types::bookmark::{Bookmark, BookmarkPage, BookmarkPatch, BookmarkQuery, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::events::ChangeEvent;

/// Opaque handle for an active change-feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Asynchronous bookmark store operations.
///
/// `subscribe` delivers change events for rows belonging to `owner_id`,
/// at-least-once, with no ordering guarantee relative to local writes.
/// Consumers must treat every event as an idempotent merge.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn update(&self, id: &str, patch: &BookmarkPatch) -> Result<(), StoreError>;
    async fn query(&self, query: &BookmarkQuery) -> Result<BookmarkPage, StoreError>;
    fn subscribe(&self, owner_id: &str, sender: UnboundedSender<ChangeEvent>)
        -> SubscriptionHandle;
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
