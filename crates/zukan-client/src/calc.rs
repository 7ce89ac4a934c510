//! Pure candidate builders for full-document replaces.
//!
//! Bulk edits (uploads, multi-field changes) are computed entirely on
//! the client from the last cached index and shipped wholesale to the
//! overwrite endpoint. These functions build that candidate: base copy
//! plus change-set, counts recomputed, timestamp advanced. They never
//! touch the cache; the caller submits the candidate and commits the
//! server's *echoed* copy, which is authoritative, not the candidate.

use zukan_types::{Index, IndexEdit, IndexItem};

/// Candidate index after an upload batch: new items appended (existing
/// keys dropped), counts and timestamp updated.
pub fn calculate_upload_increment(base: &Index, new_items: &[IndexItem]) -> Index {
    build(base, IndexEdit::Add {
        items: new_items.to_vec(),
    })
}

/// Candidate index after a delete batch; missing keys are tolerated.
pub fn calculate_delete_decrement(base: &Index, file_names: &[String]) -> Index {
    build(base, IndexEdit::Remove {
        file_names: file_names.to_vec(),
    })
}

/// Candidate index after a like/unlike batch; items already in the
/// target state are untouched.
pub fn calculate_batch_like_toggle(base: &Index, file_names: &[String], liked: bool) -> Index {
    build(base, IndexEdit::SetLiked {
        file_names: file_names.to_vec(),
        liked,
    })
}

fn build(base: &Index, edit: IndexEdit) -> Index {
    let mut candidate = base.clone();
    candidate.apply(&edit);
    candidate.touch();
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base() -> Index {
        let mut index = Index::empty();
        index.images.push(IndexItem::new("a.jpg", 100, Utc::now()));
        index.images.push(IndexItem::new("b.jpg", 200, Utc::now()));
        index.recompute_counts();
        index
    }

    #[test]
    fn test_upload_increment() {
        let base = base();
        let candidate = calculate_upload_increment(
            &base,
            &[
                IndexItem::new("c.jpg", 300, Utc::now()),
                IndexItem::new("a.jpg", 100, Utc::now()), // already present
            ],
        );

        assert_eq!(candidate.total_count, 3);
        assert!(candidate.last_updated > base.last_updated);
        candidate.validate().unwrap();
        // Purity: the base is untouched.
        assert_eq!(base.total_count, 2);
    }

    #[test]
    fn test_delete_decrement() {
        let base = base();
        let candidate =
            calculate_delete_decrement(&base, &["a.jpg".to_string(), "ghost.jpg".to_string()]);

        assert_eq!(candidate.total_count, 1);
        assert!(candidate.contains("b.jpg"));
        candidate.validate().unwrap();
    }

    #[test]
    fn test_batch_like_toggle() {
        let base = base();
        let candidate = calculate_batch_like_toggle(
            &base,
            &["a.jpg".to_string(), "b.jpg".to_string()],
            true,
        );

        assert_eq!(candidate.liked_count, 2);
        candidate.validate().unwrap();
        assert_eq!(base.liked_count, 0);
    }
}
