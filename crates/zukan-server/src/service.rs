//! The catalog service handlers.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use zukan_store::{IndexStore, ObjectStore, StoreConfig};
use zukan_types::wire::{
    BatchDeleteRequest, BatchDeleteResponse, BatchLikeRequest, BatchLikeResponse,
    FetchIndexRequest, FetchIndexResponse, OverwriteRequest, OverwriteResponse,
};

use crate::error::ServiceError;

/// Reply of a conditional index fetch.
///
/// `NotModified` carries no payload; the transport layer turns it into
/// its native unmodified signal (e.g. a 304).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReply {
    NotModified,
    Fresh {
        body: FetchIndexResponse,
        freshness_token: String,
    },
}

/// Request-scoped catalog handlers.
///
/// Owns the index store and the raw-object handle the batch-delete path
/// needs. Constructed once per process and shared behind an `Arc`; every
/// handler call is independent.
pub struct GalleryService<S> {
    objects: Arc<S>,
    index: IndexStore<S>,
}

impl<S: ObjectStore> GalleryService<S> {
    pub fn new(objects: Arc<S>, config: StoreConfig) -> Self {
        let index = IndexStore::new(objects.clone(), config);
        Self { objects, index }
    }

    /// Direct access to the index store (rebuild jobs, diagnostics).
    pub fn index_store(&self) -> &IndexStore<S> {
        &self.index
    }

    /// Fetch the index, conditionally.
    ///
    /// `rebuild` forces full re-derivation from the object listing and
    /// always returns a payload. Otherwise a matching `if_none_match`
    /// token short-circuits to `NotModified`.
    pub async fn fetch_index(&self, req: FetchIndexRequest) -> Result<FetchReply, ServiceError> {
        let index = if req.rebuild {
            self.index.rebuild().await?
        } else {
            self.index.get().await?
        };

        if !req.rebuild {
            if let Some(token) = &req.if_none_match {
                if index.matches_token(token) {
                    return Ok(FetchReply::NotModified);
                }
            }
        }

        Ok(FetchReply::Fresh {
            freshness_token: index.freshness_token(),
            body: FetchIndexResponse {
                success: true,
                data: index,
            },
        })
    }

    /// Unconditional full rebuild.
    pub async fn rebuild_index(&self) -> Result<FetchIndexResponse, ServiceError> {
        let index = self.index.rebuild().await?;
        Ok(FetchIndexResponse {
            success: true,
            data: index,
        })
    }

    /// Full-document replace from a trusted caller.
    ///
    /// The replacement is validated structurally and persisted through
    /// the verified-write path; no semantic diff against the previous
    /// document is made. When the request carries `base_last_updated`,
    /// a server copy that has advanced past it rejects the replace
    /// instead of losing the intervening update.
    pub async fn overwrite_index(
        &self,
        req: OverwriteRequest,
    ) -> Result<OverwriteResponse, ServiceError> {
        let started = Instant::now();

        if let Some(base) = req.base_last_updated {
            let current = self.index.get().await?;
            if current.last_updated > base {
                warn!(
                    operation = %req.operation,
                    %base,
                    current = %current.last_updated,
                    "rejecting stale full-index replace"
                );
                return Err(ServiceError::StaleWrite {
                    base,
                    current: current.last_updated,
                });
            }
        }

        info!(
            operation = %req.operation,
            items = req.json.total_count,
            "full index replace"
        );
        let (new_json, mut stats) = self.index.replace(req.json).await?;
        stats.total_time_ms = started.elapsed().as_millis() as u64;

        Ok(OverwriteResponse {
            success: true,
            new_json,
            clear_cache: true,
            stats,
        })
    }

    /// Delete objects, their derived thumbnails, and their index entries.
    ///
    /// Keys absent from the index are tolerated; the index update
    /// succeeds for the subset present.
    pub async fn batch_delete(
        &self,
        req: BatchDeleteRequest,
    ) -> Result<BatchDeleteResponse, ServiceError> {
        for file_name in &req.file_names {
            self.objects.delete_object(file_name).await?;
            let thumb = self.index.config().thumbnail_key(file_name);
            self.objects.delete_object(&thumb).await?;
        }
        let index = self.index.remove(&req.file_names).await?;

        info!(
            requested = req.file_names.len(),
            remaining = index.total_count,
            "batch delete"
        );
        Ok(BatchDeleteResponse {
            success: true,
            message: format!("deleted {} objects", req.file_names.len()),
        })
    }

    /// Toggle the liked flag for a batch of keys.
    pub async fn batch_toggle_likes(
        &self,
        req: BatchLikeRequest,
    ) -> Result<BatchLikeResponse, ServiceError> {
        let index = self.index.toggle_likes(&req.file_names, req.liked).await?;

        Ok(BatchLikeResponse {
            success: true,
            message: format!(
                "{} {} objects",
                if req.liked { "liked" } else { "unliked" },
                req.file_names.len()
            ),
            new_index: index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use zukan_store::MemoryObjectStore;
    use zukan_types::{ErrorResponse, Index, IndexItem};

    fn service() -> (Arc<MemoryObjectStore>, GalleryService<MemoryObjectStore>) {
        let objects = Arc::new(MemoryObjectStore::new());
        let config = StoreConfig {
            verify_backoff: std::time::Duration::from_millis(1),
            ..StoreConfig::default()
        };
        (objects.clone(), GalleryService::new(objects, config))
    }

    fn item(name: &str) -> IndexItem {
        IndexItem::new(name, 100, Utc::now())
    }

    async fn seed_index(service: &GalleryService<MemoryObjectStore>, names: &[&str]) -> Index {
        service
            .index_store()
            .add(names.iter().map(|n| item(n)).collect())
            .await
            .unwrap()
    }

    // ── Conditional fetch ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_fetch_conditional_not_modified() {
        let (_, service) = service();
        seed_index(&service, &["a.jpg"]).await;

        let reply = service
            .fetch_index(FetchIndexRequest::default())
            .await
            .unwrap();
        let FetchReply::Fresh {
            freshness_token, ..
        } = reply
        else {
            panic!("expected fresh payload");
        };

        // Same token again → not modified.
        let reply = service
            .fetch_index(FetchIndexRequest {
                rebuild: false,
                if_none_match: Some(freshness_token.clone()),
            })
            .await
            .unwrap();
        assert_eq!(reply, FetchReply::NotModified);

        // Mutation invalidates the token.
        seed_index(&service, &["b.jpg"]).await;
        let reply = service
            .fetch_index(FetchIndexRequest {
                rebuild: false,
                if_none_match: Some(freshness_token),
            })
            .await
            .unwrap();
        assert!(matches!(reply, FetchReply::Fresh { .. }));
    }

    #[tokio::test]
    async fn test_fetch_with_rebuild_flag_rederives() {
        let (objects, service) = service();
        objects.insert_with_metadata(
            "a.jpg",
            vec![0u8; 32],
            "image/jpeg",
            Default::default(),
            Utc::now(),
        );
        seed_index(&service, &["a.jpg"]).await;

        // An object uploaded outside the index's knowledge.
        objects.insert_with_metadata(
            "new.jpg",
            vec![0u8; 64],
            "image/jpeg",
            Default::default(),
            Utc::now(),
        );

        let reply = service
            .fetch_index(FetchIndexRequest {
                rebuild: true,
                if_none_match: None,
            })
            .await
            .unwrap();
        let FetchReply::Fresh { body, .. } = reply else {
            panic!("rebuild always returns a payload");
        };
        assert_eq!(body.data.total_count, 2);
        assert!(body.data.contains("new.jpg"));
    }

    // ── Overwrite ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_overwrite_round_trip() {
        let (_, service) = service();
        let base = seed_index(&service, &["a.jpg"]).await;

        let mut candidate = base.clone();
        candidate.images.push(item("b.jpg"));
        candidate.recompute_counts();

        let resp = service
            .overwrite_index(OverwriteRequest {
                json: candidate,
                operation: "bulk-upload".to_string(),
                base_last_updated: Some(base.last_updated),
            })
            .await
            .unwrap();

        assert!(resp.success);
        assert!(resp.clear_cache);
        assert_eq!(resp.new_json.total_count, 2);
        assert!(resp.stats.verify_attempts >= 1);

        // The echoed copy is what the store now serves.
        let served = service.index_store().get().await.unwrap();
        assert_eq!(served, resp.new_json);
    }

    #[tokio::test]
    async fn test_overwrite_rejects_stale_base() {
        let (_, service) = service();
        let base = seed_index(&service, &["a.jpg"]).await;

        // The server moves on after the caller captured its base.
        seed_index(&service, &["b.jpg"]).await;

        let err = service
            .overwrite_index(OverwriteRequest {
                json: base.clone(),
                operation: "stale".to_string(),
                base_last_updated: Some(base.last_updated),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StaleWrite { .. }));

        // The error arm serializes to the shared failure shape.
        let body = ErrorResponse::from(&err);
        assert!(!body.success);
        assert!(body.error.contains("refusing replace"));
    }

    #[tokio::test]
    async fn test_overwrite_without_base_keeps_last_write_wins() {
        let (_, service) = service();
        let base = seed_index(&service, &["a.jpg"]).await;
        seed_index(&service, &["b.jpg"]).await;

        // Legacy caller: no precondition, the replace goes through even
        // though it was computed from a stale base.
        let resp = service
            .overwrite_index(OverwriteRequest {
                json: base,
                operation: "legacy".to_string(),
                base_last_updated: None,
            })
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.new_json.total_count, 1);
    }

    // ── Batches ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_batch_delete_removes_object_thumbnail_and_entry() {
        let (objects, service) = service();
        for key in ["a.jpg", "thumbs/a.jpg", "b.jpg"] {
            objects
                .put_object(key, vec![1], "image/jpeg")
                .await
                .unwrap();
        }
        seed_index(&service, &["a.jpg", "b.jpg"]).await;

        let resp = service
            .batch_delete(BatchDeleteRequest {
                file_names: vec!["a.jpg".to_string()],
            })
            .await
            .unwrap();
        assert!(resp.success);

        assert_eq!(objects.get_object("a.jpg").await.unwrap(), None);
        assert_eq!(objects.get_object("thumbs/a.jpg").await.unwrap(), None);
        let index = service.index_store().get().await.unwrap();
        assert_eq!(index.total_count, 1);
        assert!(index.contains("b.jpg"));
    }

    #[tokio::test]
    async fn test_batch_delete_tolerates_unknown_keys() {
        let (_, service) = service();
        seed_index(&service, &["a.jpg"]).await;

        let resp = service
            .batch_delete(BatchDeleteRequest {
                file_names: vec!["a.jpg".to_string(), "ghost.jpg".to_string()],
            })
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(
            service.index_store().get().await.unwrap().total_count,
            0
        );
    }

    #[tokio::test]
    async fn test_batch_toggle_likes_returns_new_index() {
        let (_, service) = service();
        seed_index(&service, &["a.jpg", "b.jpg"]).await;

        let resp = service
            .batch_toggle_likes(BatchLikeRequest {
                file_names: vec!["a.jpg".to_string(), "b.jpg".to_string()],
                liked: true,
            })
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.new_index.liked_count, 2);

        let resp = service
            .batch_toggle_likes(BatchLikeRequest {
                file_names: vec!["a.jpg".to_string()],
                liked: false,
            })
            .await
            .unwrap();
        assert_eq!(resp.new_index.liked_count, 1);
    }
}
