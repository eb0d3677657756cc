//! Draft reconciliation for locally created posts and comments.
//!
//! A creation is either still [`Draft::Pending`] under the id the caller
//! generated, or [`Draft::Confirmed`] with the row the store returned.
//! [`reconcile`] is the only function that folds a draft into a cached
//! collection, so the rules can be tested without a store.

use uuid::Uuid;

use blam_shared::{Comment, Post};

/// Entities that can be reconciled by id.
pub trait Keyed {
    fn key(&self) -> Uuid;
}

impl Keyed for Post {
    fn key(&self) -> Uuid {
        self.id.0
    }
}

impl Keyed for Comment {
    fn key(&self) -> Uuid {
        self.id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft<T> {
    /// Not (or no longer expected to be) confirmed by the store.
    Pending(Uuid),
    /// Accepted by the store; carries the authoritative row.
    Confirmed(T),
}

/// Fold a settled draft into `collection` (newest first).
///
/// Any entry carrying the draft's local id is evicted. A confirmed row is
/// prepended after evicting any entry that already has its server id, so a
/// reload that raced the insert never leaves a duplicate.
pub fn reconcile<T: Keyed>(collection: Vec<T>, local_id: Uuid, draft: Draft<T>) -> Vec<T> {
    match draft {
        Draft::Pending(id) => collection
            .into_iter()
            .filter(|item| item.key() != local_id && item.key() != id)
            .collect(),
        Draft::Confirmed(row) => {
            let server_id = row.key();
            let mut out = Vec::with_capacity(collection.len() + 1);
            out.push(row);
            out.extend(
                collection
                    .into_iter()
                    .filter(|item| item.key() != local_id && item.key() != server_id),
            );
            out
        }
    }
}
