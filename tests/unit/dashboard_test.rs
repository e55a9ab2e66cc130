use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use linkdock::app::{Dashboard, DashboardCommand, Notice};
use linkdock::managers::list_manager::BookmarkListTrait;
use linkdock::services::local_store::LocalStore;
use linkdock::services::store::{BookmarkStore, SubscriptionHandle};
use linkdock::types::bookmark::{
    Bookmark, BookmarkPage, BookmarkPatch, BookmarkQuery, NewBookmark, ViewMode,
};
use linkdock::types::errors::StoreError;
use linkdock::types::events::ChangeEvent;
use linkdock::types::route::RouteState;

fn new_bookmark(owner: &str, title: &str, url: &str, thumb: Option<&str>) -> NewBookmark {
    NewBookmark {
        title: title.to_string(),
        url: url.to_string(),
        owner_id: owner.to_string(),
        thumbnail_url: thumb.map(str::to_string),
    }
}

/// Store whose writes always fail; used to exercise rollback paths.
struct FailingStore;

#[async_trait]
impl BookmarkStore for FailingStore {
    async fn insert(&self, _bookmark: &NewBookmark) -> Result<Bookmark, StoreError> {
        Err(StoreError::WriteFailed("disk full".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::WriteFailed("disk full".to_string()))
    }

    async fn update(&self, _id: &str, _patch: &BookmarkPatch) -> Result<(), StoreError> {
        Err(StoreError::WriteFailed("disk full".to_string()))
    }

    async fn query(&self, _query: &BookmarkQuery) -> Result<BookmarkPage, StoreError> {
        Ok(BookmarkPage {
            rows: Vec::new(),
            total_count: 0,
        })
    }

    fn subscribe(
        &self,
        _owner_id: &str,
        _sender: UnboundedSender<ChangeEvent>,
    ) -> SubscriptionHandle {
        SubscriptionHandle(0)
    }

    fn unsubscribe(&self, _handle: SubscriptionHandle) {}
}

/// Store holding one legacy row without a thumbnail whose updates always
/// fail, so the repair path can never land its patch.
struct BrokenRepairStore {
    row: Bookmark,
    update_calls: AtomicUsize,
}

impl BrokenRepairStore {
    fn new() -> Self {
        Self {
            row: Bookmark {
                id: "legacy-1".to_string(),
                title: "Legacy".to_string(),
                url: "https://old.example.com".to_string(),
                owner_id: "u1".to_string(),
                created_at: Utc::now(),
                thumbnail_url: None,
            },
            update_calls: AtomicUsize::new(0),
        }
    }

    fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookmarkStore for BrokenRepairStore {
    async fn insert(&self, _bookmark: &NewBookmark) -> Result<Bookmark, StoreError> {
        Err(StoreError::WriteFailed("read-only".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::WriteFailed("read-only".to_string()))
    }

    async fn update(&self, _id: &str, _patch: &BookmarkPatch) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::WriteFailed("read-only".to_string()))
    }

    async fn query(&self, _query: &BookmarkQuery) -> Result<BookmarkPage, StoreError> {
        Ok(BookmarkPage {
            rows: vec![self.row.clone()],
            total_count: 1,
        })
    }

    fn subscribe(
        &self,
        _owner_id: &str,
        _sender: UnboundedSender<ChangeEvent>,
    ) -> SubscriptionHandle {
        SubscriptionHandle(0)
    }

    fn unsubscribe(&self, _handle: SubscriptionHandle) {}
}

/// Wraps a [`LocalStore`] and delays each query by the next queued amount,
/// so tests can force fetch responses to arrive out of order.
struct DelayedStore {
    inner: LocalStore,
    delays_ms: Mutex<VecDeque<u64>>,
}

impl DelayedStore {
    fn new(inner: LocalStore, delays_ms: &[u64]) -> Self {
        Self {
            inner,
            delays_ms: Mutex::new(delays_ms.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl BookmarkStore for DelayedStore {
    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark, StoreError> {
        self.inner.insert(bookmark).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn update(&self, id: &str, patch: &BookmarkPatch) -> Result<(), StoreError> {
        self.inner.update(id, patch).await
    }

    async fn query(&self, query: &BookmarkQuery) -> Result<BookmarkPage, StoreError> {
        let delay = self.delays_ms.lock().unwrap().pop_front().unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.query(query).await
    }

    fn subscribe(
        &self,
        owner_id: &str,
        sender: UnboundedSender<ChangeEvent>,
    ) -> SubscriptionHandle {
        self.inner.subscribe(owner_id, sender)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner.unsubscribe(handle)
    }
}

#[tokio::test]
async fn test_submit_replaces_placeholder_via_change_feed() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    let mut dashboard = Dashboard::new(Arc::clone(&store), "u1", RouteState::default());
    dashboard.connect();
    dashboard.run_until_idle().await;

    dashboard.dispatch(DashboardCommand::Submit {
        title: "Crates".to_string(),
        url: "crates.io".to_string(),
    });
    dashboard.run_until_idle().await;

    let list = dashboard.list();
    assert_eq!(list.bookmarks().len(), 1);
    assert!(!list.bookmarks()[0].is_placeholder());
    assert_eq!(list.bookmarks()[0].url, "https://crates.io");
    assert_eq!(list.total_count(), 1);

    let notices = dashboard.drain_notices();
    assert!(notices.contains(&Notice::Info("Saving bookmark...".to_string())));
    assert!(notices.contains(&Notice::Info("Bookmark added!".to_string())));
}

#[tokio::test]
async fn test_failed_submit_rolls_back_exactly() {
    let store: Arc<dyn BookmarkStore> = Arc::new(FailingStore);
    let mut dashboard = Dashboard::new(store, "u1", RouteState::default());
    dashboard.run_until_idle().await;

    dashboard.dispatch(DashboardCommand::Submit {
        title: "Crates".to_string(),
        url: "crates.io".to_string(),
    });
    dashboard.run_until_idle().await;

    assert!(dashboard.list().bookmarks().is_empty());
    assert_eq!(dashboard.list().total_count(), 0);

    let notices = dashboard.drain_notices();
    assert!(notices
        .iter()
        .any(|n| matches!(n, Notice::Error(msg) if msg.starts_with("Failed to save"))));
}

#[tokio::test]
async fn test_invalid_submission_leaves_state_untouched() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    let mut dashboard = Dashboard::new(store, "u1", RouteState::default());
    dashboard.run_until_idle().await;

    dashboard.dispatch(DashboardCommand::Submit {
        title: "Bad".to_string(),
        url: "not a url".to_string(),
    });
    dashboard.run_until_idle().await;

    assert!(dashboard.list().bookmarks().is_empty());
    assert_eq!(dashboard.list().total_count(), 0);

    let notices = dashboard.drain_notices();
    assert!(notices
        .iter()
        .any(|n| matches!(n, Notice::Error(msg) if msg.contains("Invalid domain"))));
}

#[tokio::test]
async fn test_second_submit_while_first_in_flight_is_rejected() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    let mut dashboard = Dashboard::new(store, "u1", RouteState::default());
    dashboard.connect();
    dashboard.run_until_idle().await;

    dashboard.dispatch(DashboardCommand::Submit {
        title: "First".to_string(),
        url: "first.example.com".to_string(),
    });
    dashboard.dispatch(DashboardCommand::Submit {
        title: "Second".to_string(),
        url: "second.example.com".to_string(),
    });
    dashboard.run_until_idle().await;

    assert_eq!(dashboard.list().bookmarks().len(), 1);
    assert_eq!(dashboard.list().bookmarks()[0].title, "First");

    let notices = dashboard.drain_notices();
    assert!(notices
        .iter()
        .any(|n| matches!(n, Notice::Error(msg) if msg.contains("already"))));
}

#[tokio::test]
async fn test_delete_updates_list_through_change_feed() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    let record = store
        .insert(&new_bookmark(
            "u1",
            "Docs",
            "https://example.com",
            Some("https://t/x.png"),
        ))
        .await
        .unwrap();

    let mut dashboard = Dashboard::new(Arc::clone(&store), "u1", RouteState::default());
    dashboard.connect();
    dashboard.run_until_idle().await;
    assert_eq!(dashboard.list().bookmarks().len(), 1);

    dashboard.dispatch(DashboardCommand::Delete {
        id: record.id.clone(),
    });
    dashboard.run_until_idle().await;

    assert!(dashboard.list().bookmarks().is_empty());
    assert_eq!(dashboard.list().total_count(), 0);
    assert!(dashboard
        .drain_notices()
        .contains(&Notice::Info("Bookmark deleted".to_string())));
}

#[tokio::test]
async fn test_deleting_the_only_row_on_a_later_page_steps_back() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    for i in 0..11 {
        store
            .insert(&new_bookmark(
                "u1",
                &format!("Bookmark {}", i),
                &format!("https://site{}.com", i),
                Some("https://t/x.png"),
            ))
            .await
            .unwrap();
    }

    let route = RouteState {
        page: 2,
        view: ViewMode::Grid,
    };
    let mut dashboard = Dashboard::new(Arc::clone(&store), "u1", route);
    dashboard.connect();
    dashboard.run_until_idle().await;
    assert_eq!(dashboard.list().current_page(), 2);
    assert_eq!(dashboard.list().bookmarks().len(), 1);
    assert_eq!(dashboard.list().total_count(), 11);

    let last = dashboard.list().bookmarks()[0].id.clone();
    dashboard.dispatch(DashboardCommand::Delete { id: last });
    dashboard.run_until_idle().await;

    assert_eq!(dashboard.list().current_page(), 1);
    assert_eq!(dashboard.list().bookmarks().len(), 10);
    assert_eq!(dashboard.list().total_count(), 10);
    assert_eq!(dashboard.route().page, 1);
}

#[tokio::test]
async fn test_navigating_past_the_end_self_corrects() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    store
        .insert(&new_bookmark(
            "u1",
            "Docs",
            "https://example.com",
            Some("https://t/x.png"),
        ))
        .await
        .unwrap();

    let mut dashboard = Dashboard::new(Arc::clone(&store), "u1", RouteState::default());
    dashboard.run_until_idle().await;

    dashboard.dispatch(DashboardCommand::SetPage(3));
    dashboard.run_until_idle().await;

    assert_eq!(dashboard.list().current_page(), 1);
    assert_eq!(dashboard.list().bookmarks().len(), 1);
}

#[tokio::test]
async fn test_thumbnail_backfill_repairs_legacy_rows() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    store
        .insert(&new_bookmark("u1", "Legacy", "https://old.example.com", None))
        .await
        .unwrap();

    let mut dashboard = Dashboard::new(Arc::clone(&store), "u1", RouteState::default());
    dashboard.run_until_idle().await;

    let row = &dashboard.list().bookmarks()[0];
    let thumb = row.thumbnail_url.as_deref().expect("thumbnail repaired");
    assert!(thumb.contains("microlink"));

    // The repair is durable, not just an in-memory merge
    let page = store.query(&BookmarkQuery::page("u1", "", 1)).await.unwrap();
    assert!(page.rows[0].thumbnail_url.is_some());
}

#[tokio::test]
async fn test_failed_backfill_leaves_row_unpatched_and_retries_on_refetch() {
    let store = Arc::new(BrokenRepairStore::new());
    let mut dashboard = Dashboard::new(
        Arc::clone(&store) as Arc<dyn BookmarkStore>,
        "u1",
        RouteState::default(),
    );
    dashboard.run_until_idle().await;

    // The patch failed, so nothing is merged and the pending marker is
    // released for the next attempt
    assert_eq!(store.update_calls(), 1);
    assert!(dashboard.list().bookmarks()[0].thumbnail_url.is_none());
    assert!(!dashboard.list().is_thumbnail_pending("legacy-1"));

    dashboard.dispatch(DashboardCommand::Refresh);
    dashboard.run_until_idle().await;

    assert_eq!(store.update_calls(), 2);
    assert!(dashboard.list().bookmarks()[0].thumbnail_url.is_none());
}

#[tokio::test]
async fn test_stale_fetch_response_is_discarded() {
    let inner = LocalStore::open_in_memory().unwrap();
    inner
        .insert(&new_bookmark(
            "u1",
            "Alpha site",
            "https://alpha.example.com",
            Some("https://t/a.png"),
        ))
        .await
        .unwrap();
    inner
        .insert(&new_bookmark(
            "u1",
            "Beta site",
            "https://beta.example.com",
            Some("https://t/b.png"),
        ))
        .await
        .unwrap();

    // Initial fetch responds at once, the "alpha" search lags behind the
    // cleared search that supersedes it.
    let store: Arc<dyn BookmarkStore> = Arc::new(DelayedStore::new(inner, &[0, 80, 0]));
    let mut dashboard = Dashboard::new(store, "u1", RouteState::default());
    dashboard.run_until_idle().await;

    dashboard.dispatch(DashboardCommand::Search("alpha".to_string()));
    dashboard.dispatch(DashboardCommand::Search(String::new()));
    dashboard.run_until_idle().await;

    // The late filtered response must not clobber the current view
    assert_eq!(dashboard.list().search_term(), "");
    assert_eq!(dashboard.list().bookmarks().len(), 2);
    assert_eq!(dashboard.list().total_count(), 2);
}

#[tokio::test]
async fn test_view_mode_round_trips_through_the_route() {
    let store: Arc<dyn BookmarkStore> = Arc::new(LocalStore::open_in_memory().unwrap());
    let mut dashboard = Dashboard::new(store, "u1", RouteState::default());
    dashboard.run_until_idle().await;

    dashboard.dispatch(DashboardCommand::SetView(ViewMode::List));
    dashboard.run_until_idle().await;

    let route = dashboard.route();
    assert_eq!(route.view, ViewMode::List);
    assert_eq!(route.to_query(), "view=list");
}
