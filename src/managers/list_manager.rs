//! Bookmark List Manager for Linkdock.
//!
//! The reconciler at the center of the dashboard: one in-memory, ordered
//! page of bookmarks merged from three independently-ordered sources —
//! optimistic local mutations, paginated fetch results, and the change
//! feed from the backing store. Every merge is idempotent, so redelivered
//! or reordered change events never corrupt the view.

use std::collections::HashSet;

use chrono::Utc;
use log::debug;

use crate::services::thumbnail;
use crate::services::validation::normalize_url;
use crate::types::bookmark::{Bookmark, BookmarkPage, ViewMode, PAGE_SIZE, PLACEHOLDER_PREFIX};
use crate::types::errors::SubmitError;
use crate::types::events::ChangeEvent;

/// Trait defining the list reconciliation operations.
pub trait BookmarkListTrait {
    /// Validates the submission and, if accepted, prepends an optimistic
    /// placeholder and bumps the total count. Returns the placeholder so
    /// the caller can issue the durable insert.
    fn begin_optimistic_insert(&mut self, title: &str, url: &str) -> Result<Bookmark, SubmitError>;
    /// Settles the in-flight submission. On failure the placeholder is
    /// removed and the count restored — exact rollback.
    fn settle_insert(&mut self, placeholder_id: &str, succeeded: bool);
    /// Applies one change-feed event. Infallible and idempotent.
    fn apply_event(&mut self, event: ChangeEvent);
    /// Replaces the list and total count with a fetched page.
    fn apply_page(&mut self, page: u32, result: BookmarkPage);
    /// After an empty fetch: the page to step back to, if any.
    fn corrected_page(&self) -> Option<u32>;
    fn set_search(&mut self, term: &str);
    fn set_view(&mut self, view: ViewMode);
    fn bookmarks(&self) -> &[Bookmark];
    fn total_count(&self) -> u64;
    fn total_pages(&self) -> u32;
    fn current_page(&self) -> u32;
    fn search_term(&self) -> &str;
    fn view_mode(&self) -> ViewMode;
}

/// In-memory bookmark list state for one authenticated owner.
pub struct BookmarkList {
    owner_id: String,
    bookmarks: Vec<Bookmark>,
    total_count: u64,
    current_page: u32,
    search_term: String,
    view_mode: ViewMode,
    insert_in_flight: bool,
    pending_thumbnails: HashSet<String>,
}

impl BookmarkList {
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            bookmarks: Vec::new(),
            total_count: 0,
            current_page: 1,
            search_term: String::new(),
            view_mode: ViewMode::Grid,
            insert_in_flight: false,
            pending_thumbnails: HashSet::new(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn contains_id(&self, id: &str) -> bool {
        self.bookmarks.iter().any(|b| b.id == id)
    }

    /// Records on the current page still missing a thumbnail, as
    /// `(id, page_url)` pairs for the repair path.
    pub fn missing_thumbnails(&self) -> Vec<(String, String)> {
        self.bookmarks
            .iter()
            .filter(|b| b.thumbnail_url.is_none() && !b.is_placeholder())
            .map(|b| (b.id.clone(), b.url.clone()))
            .collect()
    }

    pub fn mark_thumbnails_pending(&mut self, ids: &[String]) {
        for id in ids {
            self.pending_thumbnails.insert(id.clone());
        }
    }

    pub fn clear_thumbnails_pending(&mut self, ids: &[String]) {
        for id in ids {
            self.pending_thumbnails.remove(id);
        }
    }

    pub fn is_thumbnail_pending(&self, id: &str) -> bool {
        self.pending_thumbnails.contains(id)
    }

    /// Merges repaired thumbnail URLs into the list, preserving positions.
    /// Called only when every backfill patch succeeded.
    pub fn merge_thumbnails(&mut self, updates: &[(String, String)]) {
        for (id, thumb) in updates {
            if let Some(b) = self.bookmarks.iter_mut().find(|b| &b.id == id) {
                b.thumbnail_url = Some(thumb.clone());
            }
        }
    }
}

impl BookmarkListTrait for BookmarkList {
    fn begin_optimistic_insert(&mut self, title: &str, url: &str) -> Result<Bookmark, SubmitError> {
        if self.insert_in_flight {
            return Err(SubmitError::SubmissionInFlight);
        }

        let title = title.trim();
        if title.is_empty() {
            return Err(SubmitError::EmptyTitle);
        }
        if url.trim().is_empty() {
            return Err(SubmitError::EmptyUrl);
        }
        let formatted_url =
            normalize_url(url).ok_or_else(|| SubmitError::InvalidUrl(url.trim().to_string()))?;

        let now = Utc::now();
        let placeholder = Bookmark {
            id: format!("{}{}", PLACEHOLDER_PREFIX, now.timestamp_millis()),
            title: title.to_string(),
            url: formatted_url.clone(),
            owner_id: String::new(),
            created_at: now,
            // Computed up front so the eventual durable row needs no repair
            thumbnail_url: Some(thumbnail::screenshot_url(&formatted_url)),
        };

        self.bookmarks.insert(0, placeholder.clone());
        self.total_count += 1;
        self.insert_in_flight = true;
        Ok(placeholder)
    }

    fn settle_insert(&mut self, placeholder_id: &str, succeeded: bool) {
        self.insert_in_flight = false;
        if succeeded {
            // Nothing to do locally; the durable record arrives over the
            // change feed and replaces the placeholder there.
            return;
        }
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.id != placeholder_id);
        if self.bookmarks.len() < before {
            self.total_count = self.total_count.saturating_sub(1);
        }
    }

    fn apply_event(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Created(record) => {
                if self.contains_id(&record.id) {
                    // Duplicate delivery, or an echo of a row we already
                    // hold from a fetch.
                    debug!("created event for already-present id {}", record.id);
                    return;
                }
                // Replace the optimistic placeholder this row confirms,
                // never show both. A replaced placeholder was already
                // counted at submit time, so the count stays put.
                let before = self.bookmarks.len();
                self.bookmarks.retain(|b| {
                    !(b.is_placeholder() && b.url == record.url && b.title == record.title)
                });
                let replaced_placeholder = self.bookmarks.len() < before;
                self.bookmarks.insert(0, record);
                if !replaced_placeholder {
                    self.total_count += 1;
                }
            }
            ChangeEvent::Deleted { id } => {
                self.bookmarks.retain(|b| b.id != id);
                self.pending_thumbnails.remove(&id);
                // The row may live on a page we do not hold; the count
                // still shrinks either way.
                self.total_count = self.total_count.saturating_sub(1);
            }
            ChangeEvent::Updated { id, patch } => {
                if let Some(b) = self.bookmarks.iter_mut().find(|b| b.id == id) {
                    patch.apply_to(b);
                }
            }
        }
    }

    fn apply_page(&mut self, page: u32, result: BookmarkPage) {
        self.bookmarks = result.rows;
        self.total_count = result.total_count;
        self.current_page = page.max(1);
        self.pending_thumbnails.clear();
    }

    fn corrected_page(&self) -> Option<u32> {
        if self.bookmarks.is_empty() && self.total_count > 0 && self.current_page > 1 {
            Some(self.current_page - 1)
        } else {
            None
        }
    }

    fn set_search(&mut self, term: &str) {
        self.search_term = term.to_string();
        self.current_page = 1;
    }

    fn set_view(&mut self, view: ViewMode) {
        self.view_mode = view;
    }

    fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn total_pages(&self) -> u32 {
        self.total_count.div_ceil(PAGE_SIZE) as u32
    }

    fn current_page(&self) -> u32 {
        self.current_page
    }

    fn search_term(&self) -> &str {
        &self.search_term
    }

    fn view_mode(&self) -> ViewMode {
        self.view_mode
    }
}
