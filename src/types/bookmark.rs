use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking a locally-generated placeholder id for an optimistic
/// insert that has not been confirmed by the backend yet.
pub const PLACEHOLDER_PREFIX: &str = "temp-";

/// Number of bookmarks per page.
pub const PAGE_SIZE: u64 = 10;

/// A saved bookmark, as held in the dashboard list.
///
/// `id` is either a durable backend-assigned identifier or a `temp-`
/// placeholder. Placeholders carry an empty `owner_id` and a local
/// `created_at` until the durable row arrives over the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl Bookmark {
    /// True when this record is an unconfirmed optimistic placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }
}

/// Insert payload. The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Partial update for an existing bookmark. Absent fields are untouched.
///
/// Title and URL are immutable in the dashboard UI; only `thumbnail_url`
/// is patched there (the repair path). The other fields exist because the
/// change feed may report updates made elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl BookmarkPatch {
    /// A patch setting only the thumbnail URL.
    pub fn thumbnail(url: impl Into<String>) -> Self {
        Self {
            thumbnail_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Merge this patch into a bookmark in place.
    pub fn apply_to(&self, bookmark: &mut Bookmark) {
        if let Some(ref title) = self.title {
            bookmark.title = title.clone();
        }
        if let Some(ref url) = self.url {
            bookmark.url = url.clone();
        }
        if let Some(ref thumb) = self.thumbnail_url {
            bookmark.thumbnail_url = Some(thumb.clone());
        }
    }
}

/// One page of query results plus the exact row count for the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkPage {
    pub rows: Vec<Bookmark>,
    pub total_count: u64,
}

/// Query parameters for a paginated, filtered bookmark fetch.
///
/// Results are always ordered by `created_at` descending.
#[derive(Debug, Clone)]
pub struct BookmarkQuery {
    pub owner_id: String,
    pub search_term: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

impl BookmarkQuery {
    /// Query for one page (1-based) of the owner's bookmarks.
    pub fn page(owner_id: &str, search_term: &str, page: u32) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            search_term: if search_term.is_empty() {
                None
            } else {
                Some(search_term.to_string())
            },
            offset: (page.max(1) as u64 - 1) * PAGE_SIZE,
            limit: PAGE_SIZE,
        }
    }
}

/// Bookmark list rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Grid,
    List,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }

    /// Parses a view mode, falling back to `Grid` for anything unknown.
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "list" => ViewMode::List,
            _ => ViewMode::Grid,
        }
    }
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::Grid
    }
}
