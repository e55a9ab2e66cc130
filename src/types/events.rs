use serde::{Deserialize, Serialize};

use crate::types::bookmark::{Bookmark, BookmarkPatch};

/// A change notification from the backing store.
///
/// Delivered at-least-once with no ordering guarantee relative to local
/// writes or to other events. The list reconciler applies every variant
/// as an idempotent merge, so redelivery and reordering are harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeEvent {
    /// A row was inserted. Carries the full durable record.
    Created(Bookmark),
    /// A row was deleted.
    Deleted { id: String },
    /// Fields of a row changed.
    Updated { id: String, patch: BookmarkPatch },
}

impl ChangeEvent {
    /// The id of the affected record.
    pub fn record_id(&self) -> &str {
        match self {
            ChangeEvent::Created(b) => &b.id,
            ChangeEvent::Deleted { id } => id,
            ChangeEvent::Updated { id, .. } => id,
        }
    }
}
