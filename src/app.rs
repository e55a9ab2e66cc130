//! Dashboard core for Linkdock.
//!
//! Central struct wiring the list manager to a [`BookmarkStore`], running
//! every state transition through one serialized reducer. User commands,
//! store-call completions and change-feed events are all messages on the
//! dashboard's channels; the reducer applies them one at a time against
//! current state, so no handler can ever act on a stale snapshot.

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::managers::list_manager::{BookmarkList, BookmarkListTrait};
use crate::services::store::{BookmarkStore, SubscriptionHandle};
use crate::services::thumbnail;
use crate::types::bookmark::{BookmarkPage, BookmarkPatch, BookmarkQuery, NewBookmark, ViewMode};
use crate::types::errors::StoreError;
use crate::types::events::ChangeEvent;
use crate::types::route::RouteState;

/// A user-facing dashboard operation.
#[derive(Debug, Clone)]
pub enum DashboardCommand {
    /// Save a new bookmark (optimistic; rolls back on write failure).
    Submit { title: String, url: String },
    /// Delete a bookmark. DB-first: the list updates when the Deleted
    /// event comes back over the change feed.
    Delete { id: String },
    /// Navigate to a page (1-based).
    SetPage(u32),
    /// Change the search term; resets to page 1.
    Search(String),
    /// Switch grid/list rendering.
    SetView(ViewMode),
    /// Refetch the current page.
    Refresh,
}

/// A transient user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// Internal reducer messages: commands plus store-call completions.
enum Msg {
    Command(DashboardCommand),
    InsertSettled {
        placeholder_id: String,
        result: Result<(), StoreError>,
    },
    DeleteSettled {
        result: Result<(), StoreError>,
    },
    PageFetched {
        seq: u64,
        page: u32,
        result: Result<BookmarkPage, StoreError>,
    },
    BackfillSettled {
        updates: Vec<(String, String)>,
        all_ok: bool,
    },
}

/// One authenticated user's bookmark dashboard session.
pub struct Dashboard {
    store: Arc<dyn BookmarkStore>,
    list: BookmarkList,
    msg_tx: UnboundedSender<Msg>,
    msg_rx: UnboundedReceiver<Msg>,
    event_tx: UnboundedSender<ChangeEvent>,
    event_rx: UnboundedReceiver<ChangeEvent>,
    subscription: Option<SubscriptionHandle>,
    notices: Vec<Notice>,
    fetch_seq: u64,
    in_flight: usize,
}

impl Dashboard {
    pub fn new(store: Arc<dyn BookmarkStore>, owner_id: &str, route: RouteState) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut list = BookmarkList::new(owner_id);
        list.set_view(route.view);

        let mut dashboard = Self {
            store,
            list,
            msg_tx,
            msg_rx,
            event_tx,
            event_rx,
            subscription: None,
            notices: Vec::new(),
            fetch_seq: 0,
            in_flight: 0,
        };
        dashboard.fetch(route.page.max(1));
        dashboard
    }

    /// Establishes the change-feed subscription. One per session; torn
    /// down on [`Dashboard::disconnect`] or drop.
    pub fn connect(&mut self) {
        if self.subscription.is_none() {
            let handle = self
                .store
                .subscribe(self.list.owner_id(), self.event_tx.clone());
            self.subscription = Some(handle);
            info!("change feed connected for {}", self.list.owner_id());
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(handle);
        }
    }

    /// Enqueues a command behind any messages already waiting.
    pub fn dispatch(&mut self, command: DashboardCommand) {
        // Receiver lives on self, the send cannot fail
        let _ = self.msg_tx.send(Msg::Command(command));
    }

    /// The reconciled list state.
    pub fn list(&self) -> &BookmarkList {
        &self.list
    }

    /// Address-bar state for the current view.
    pub fn route(&self) -> RouteState {
        RouteState {
            page: self.list.current_page(),
            view: self.list.view_mode(),
        }
    }

    /// Takes the accumulated user-visible notices.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Runs the reducer forever. Intended as the session's main loop.
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                Some(msg) = self.msg_rx.recv() => self.process(msg).await,
                Some(event) = self.event_rx.recv() => self.handle_event(event),
                else => break,
            }
        }
    }

    /// Processes queued messages until no store call is outstanding and
    /// both queues are empty. Used by tests and the demo binary.
    pub async fn run_until_idle(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
            match self.msg_rx.try_recv() {
                Ok(msg) => {
                    self.process(msg).await;
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
            if self.in_flight == 0 {
                // Let spawned tasks get scheduled before declaring idle
                tokio::task::yield_now().await;
                if let Ok(event) = self.event_rx.try_recv() {
                    self.handle_event(event);
                    continue;
                }
                if let Ok(msg) = self.msg_rx.try_recv() {
                    self.process(msg).await;
                    continue;
                }
                return;
            }
            if let Some(msg) = self.msg_rx.recv().await {
                self.process(msg).await;
            }
        }
    }

    /// Applies one change-feed event, then re-checks pagination: a
    /// deletion that empties a page past the first steps the view back.
    fn handle_event(&mut self, event: ChangeEvent) {
        debug!("change event for record {}", event.record_id());
        self.list.apply_event(event);
        if let Some(previous) = self.list.corrected_page() {
            self.fetch(previous);
        }
    }

    async fn process(&mut self, msg: Msg) {
        match msg {
            Msg::Command(command) => self.handle_command(command),
            Msg::InsertSettled {
                placeholder_id,
                result,
            } => {
                self.in_flight -= 1;
                match result {
                    Ok(()) => {
                        self.list.settle_insert(&placeholder_id, true);
                        self.notices
                            .push(Notice::Info("Bookmark added!".to_string()));
                    }
                    Err(e) => {
                        self.list.settle_insert(&placeholder_id, false);
                        self.notices
                            .push(Notice::Error(format!("Failed to save: {}", e)));
                    }
                }
            }
            Msg::DeleteSettled { result } => {
                self.in_flight -= 1;
                match result {
                    Ok(()) => self
                        .notices
                        .push(Notice::Info("Bookmark deleted".to_string())),
                    Err(e) => {
                        warn!("delete failed: {}", e);
                        self.notices
                            .push(Notice::Error("Failed to delete".to_string()));
                    }
                }
            }
            Msg::PageFetched { seq, page, result } => {
                self.in_flight -= 1;
                if seq != self.fetch_seq {
                    // Superseded by a later navigation; the response
                    // targets a page/search state no longer on screen.
                    debug!("dropping stale fetch response for page {}", page);
                    return;
                }
                match result {
                    Ok(fetched) => {
                        self.list.apply_page(page, fetched);
                        if let Some(previous) = self.list.corrected_page() {
                            // Deletions emptied this page; step back once
                            self.fetch(previous);
                        } else {
                            self.start_backfill();
                        }
                    }
                    Err(e) => {
                        warn!("fetch failed: {}", e);
                        self.notices
                            .push(Notice::Error("Failed to load bookmarks".to_string()));
                    }
                }
            }
            Msg::BackfillSettled { updates, all_ok } => {
                self.in_flight -= 1;
                let ids: Vec<String> = updates.iter().map(|(id, _)| id.clone()).collect();
                self.list.clear_thumbnails_pending(&ids);
                if all_ok {
                    self.list.merge_thumbnails(&updates);
                } else {
                    // Left without thumbnails; retried on the next fetch
                    // of this page.
                    warn!("one or more thumbnail backfills failed");
                }
            }
        }
    }

    fn handle_command(&mut self, command: DashboardCommand) {
        match command {
            DashboardCommand::Submit { title, url } => {
                let placeholder = match self.list.begin_optimistic_insert(&title, &url) {
                    Ok(placeholder) => placeholder,
                    Err(e) => {
                        self.notices.push(Notice::Error(e.to_string()));
                        return;
                    }
                };
                self.notices
                    .push(Notice::Info("Saving bookmark...".to_string()));

                let new = NewBookmark {
                    title: placeholder.title.clone(),
                    url: placeholder.url.clone(),
                    owner_id: self.list.owner_id().to_string(),
                    thumbnail_url: placeholder.thumbnail_url.clone(),
                };
                let store = Arc::clone(&self.store);
                let tx = self.msg_tx.clone();
                self.in_flight += 1;
                tokio::spawn(async move {
                    let result = store.insert(&new).await.map(|_| ());
                    let _ = tx.send(Msg::InsertSettled {
                        placeholder_id: placeholder.id,
                        result,
                    });
                });
            }
            DashboardCommand::Delete { id } => {
                let store = Arc::clone(&self.store);
                let tx = self.msg_tx.clone();
                self.in_flight += 1;
                tokio::spawn(async move {
                    let result = store.delete(&id).await;
                    let _ = tx.send(Msg::DeleteSettled { result });
                });
            }
            DashboardCommand::SetPage(page) => {
                if page >= 1 {
                    self.fetch(page);
                }
            }
            DashboardCommand::Search(term) => {
                self.list.set_search(&term);
                self.fetch(1);
            }
            DashboardCommand::SetView(view) => self.list.set_view(view),
            DashboardCommand::Refresh => self.fetch(self.list.current_page()),
        }
    }

    fn fetch(&mut self, page: u32) {
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let query = BookmarkQuery::page(self.list.owner_id(), self.list.search_term(), page);
        let store = Arc::clone(&self.store);
        let tx = self.msg_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = store.query(&query).await;
            let _ = tx.send(Msg::PageFetched { seq, page, result });
        });
    }

    /// Repairs legacy rows on the fetched page that lack a thumbnail:
    /// patches all of them in parallel and merges only if every patch
    /// succeeded.
    fn start_backfill(&mut self) {
        let missing = self.list.missing_thumbnails();
        if missing.is_empty() {
            return;
        }
        let ids: Vec<String> = missing.iter().map(|(id, _)| id.clone()).collect();
        self.list.mark_thumbnails_pending(&ids);

        let updates: Vec<(String, String)> = missing
            .into_iter()
            .map(|(id, url)| (id, thumbnail::screenshot_url(&url)))
            .collect();

        let store = Arc::clone(&self.store);
        let tx = self.msg_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let patches = updates.iter().map(|(id, thumb)| {
                let store = Arc::clone(&store);
                async move { store.update(id, &BookmarkPatch::thumbnail(thumb.clone())).await }
            });
            let results = join_all(patches).await;
            let all_ok = results.iter().all(|r| r.is_ok());
            let _ = tx.send(Msg::BackfillSettled { updates, all_ok });
        });
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.disconnect();
    }
}
