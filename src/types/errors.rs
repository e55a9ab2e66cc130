use std::fmt;

// === SubmitError ===

/// Errors rejecting a bookmark submission before any state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The title is empty after trimming.
    EmptyTitle,
    /// The URL is empty after trimming.
    EmptyUrl,
    /// The URL cannot be normalized to an absolute URL with a valid host.
    InvalidUrl(String),
    /// Another submission is still in flight (single-flight guard).
    SubmissionInFlight,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::EmptyTitle => write!(f, "Title is required"),
            SubmitError::EmptyUrl => write!(f, "URL is required"),
            SubmitError::InvalidUrl(url) => {
                write!(f, "Invalid domain format (e.g., example.com): {}", url)
            }
            SubmitError::SubmissionInFlight => {
                write!(f, "A bookmark is already being saved")
            }
        }
    }
}

impl std::error::Error for SubmitError {}

// === StoreError ===

/// Errors from the external data-access collaborator.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// A durable insert/update/delete failed.
    WriteFailed(String),
    /// A paginated fetch failed.
    QueryFailed(String),
    /// The addressed record does not exist.
    NotFound(String),
    /// The backend could not be reached.
    NetworkError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::WriteFailed(msg) => write!(f, "Store write failed: {}", msg),
            StoreError::QueryFailed(msg) => write!(f, "Store query failed: {}", msg),
            StoreError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            StoreError::NetworkError(msg) => write!(f, "Store network error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}
