//! Edit operations applied to the index, and queued client intents.
//!
//! [`IndexEdit`] is the field-level mutation vocabulary shared by the
//! server store and the client's optimistic cache. Both sides apply the
//! exact same logic, so an optimistic edit and the eventual server
//! mutation agree. [`Operation`] is the coarser client-side intent that
//! the mutation coalescer queues per `file_name` before batching.

use chrono::{DateTime, Utc};

use crate::index::{Index, IndexItem};

/// A queued user intent, keyed by object identity in the coalescer.
///
/// Ephemeral and client-only: never persisted, never sent as-is; flushes
/// group intents into batch requests, so nothing here is serializable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// What the user asked for.
    pub kind: OperationKind,
    /// Which object.
    pub file_name: String,
    /// When the intent was queued.
    pub queued_at: DateTime<Utc>,
}

impl Operation {
    pub fn delete(file_name: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete, file_name)
    }

    pub fn like(file_name: impl Into<String>) -> Self {
        Self::new(OperationKind::Like, file_name)
    }

    pub fn unlike(file_name: impl Into<String>) -> Self {
        Self::new(OperationKind::Unlike, file_name)
    }

    fn new(kind: OperationKind, file_name: impl Into<String>) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
            queued_at: Utc::now(),
        }
    }
}

/// Intent discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Delete,
    Like,
    Unlike,
}

impl OperationKind {
    /// Queue conflict rule: a later intent replaces the pending one for
    /// the same key, except that a pending delete is terminal: it is
    /// never displaced by a like/unlike.
    pub fn displaces(self, pending: OperationKind) -> bool {
        self == OperationKind::Delete || pending != OperationKind::Delete
    }
}

/// A field-level mutation of the index document.
///
/// Applying an edit via [`Index::apply`] returns the compensating inverse
/// edit, so optimistic client-side applications can be rolled back
/// exactly when the corresponding server call fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEdit {
    /// Append items not already present (duplicates by `file_name` are
    /// dropped, not replaced).
    Add { items: Vec<IndexItem> },
    /// Remove items by identity. Missing keys are tolerated; the edit
    /// succeeds for the subset present.
    Remove { file_names: Vec<String> },
    /// Set the liked flag. Items already in the target state are left
    /// untouched (idempotent), as are missing keys.
    SetLiked { file_names: Vec<String>, liked: bool },
}

impl Index {
    /// Apply a field-level edit, recompute the denormalized counts, and
    /// return the exact compensating inverse.
    ///
    /// The inverse is computed from what actually changed, not from the
    /// request: removing `[a, b]` when only `a` exists yields an inverse
    /// that restores only `a`; liking an already-liked item yields an
    /// inverse that does not unlike it.
    ///
    /// Does **not** advance `last_updated`; timestamp policy belongs to
    /// the caller (the server store advances it inside the verified write
    /// path, the client cache advances it locally).
    pub fn apply(&mut self, edit: &IndexEdit) -> IndexEdit {
        let inverse = match edit {
            IndexEdit::Add { items } => {
                let mut appended = Vec::new();
                for item in items {
                    if !self.contains(&item.file_name) {
                        appended.push(item.file_name.clone());
                        self.images.push(item.clone());
                    }
                }
                IndexEdit::Remove {
                    file_names: appended,
                }
            }
            IndexEdit::Remove { file_names } => {
                let mut removed = Vec::new();
                self.images.retain(|item| {
                    if file_names.iter().any(|n| n == &item.file_name) {
                        removed.push(item.clone());
                        false
                    } else {
                        true
                    }
                });
                IndexEdit::Add { items: removed }
            }
            IndexEdit::SetLiked { file_names, liked } => {
                let mut flipped = Vec::new();
                for item in &mut self.images {
                    if item.is_liked != *liked
                        && file_names.iter().any(|n| n == &item.file_name)
                    {
                        item.is_liked = *liked;
                        flipped.push(item.file_name.clone());
                    }
                }
                IndexEdit::SetLiked {
                    file_names: flipped,
                    liked: !liked,
                }
            }
        };
        self.recompute_counts();
        inverse
    }
}
