// src/services/photo_service.rs
// DOCUMENTATION: Photo submission and moderation pipeline
// PURPOSE: Lease an object key, accept the upload, record the photo and
// apply moderation decisions with their cache and IndexNow side effects
//
// Flow:
// 1. issue_lease   -> key reserved in the KV store for `upload_lease_ttl_secs`
// 2. upload_object -> bytes stored in blob storage under the leased key
// 3. finalize      -> lease consumed, object verified, pending row written
// 4. approve / reject / archive by an admin

use crate::config::Config;
use crate::db::{FarmRepository, PhotoRepository};
use crate::errors::FarmError;
use crate::models::{
    ApprovalOutcome, Farm, FinalizeUploadRequest, ModerationRequest, NewPhoto, PhotoResponse,
    PhotoStatus, UploadLease, UploadLeaseRequest, UploadLeaseResponse,
};
use crate::services::farm_service::{farm_path, invalidate_farm};
use crate::services::photo_policy::{object_key_for, validate_upload, MAX_APPROVED_PHOTOS_PER_FARM};
use crate::services::{BlobClient, EmailClient, EmailMessage, IndexNowClient, KvStore};
use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shared clients the moderation side effects need
pub struct PhotoDeps<'a> {
    pub pool: &'a PgPool,
    pub kv: &'a KvStore,
    pub indexnow: &'a Arc<IndexNowClient>,
}

/// Build a lease for an active farm
fn build_lease(
    farm: &Farm,
    req: &UploadLeaseRequest,
    max_bytes: u64,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<UploadLease, FarmError> {
    if !farm.is_public() {
        return Err(FarmError::NotFound(format!("farm {}", farm.slug)));
    }

    let ext = validate_upload(&req.content_type, req.size_bytes, max_bytes)?;
    let photo_id = Uuid::new_v4();
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| FarmError::InternalError(format!("invalid lease ttl: {}", e)))?;

    Ok(UploadLease {
        lease_id: Uuid::new_v4(),
        photo_id,
        farm_id: farm.id,
        farm_slug: farm.slug.clone(),
        object_key: object_key_for(farm.id, photo_id, ext),
        content_type: req.content_type.trim().to_ascii_lowercase(),
        size_bytes: req.size_bytes,
        expires_at: now + ttl,
    })
}

/// Declared Content-Type, when sent, must be the leased one
fn check_upload_content_type(lease: &UploadLease, content_type: Option<&str>) -> Result<(), FarmError> {
    let Some(raw) = content_type else {
        return Ok(());
    };
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if essence != lease.content_type {
        return Err(FarmError::ValidationError(format!(
            "content type {} does not match the leased {}",
            essence, lease.content_type
        )));
    }
    Ok(())
}

/// Body must be non-empty and within what was leased
fn check_upload_body(lease: &UploadLease, len: usize, max_bytes: u64) -> Result<(), FarmError> {
    let len = len as u64;
    if len == 0 {
        return Err(FarmError::ValidationError("empty upload".to_string()));
    }
    if len > lease.size_bytes || len > max_bytes {
        return Err(FarmError::PayloadTooLarge(format!(
            "{} bytes exceeds the leased {} bytes",
            len, lease.size_bytes
        )));
    }
    Ok(())
}

fn lease_not_found(lease_id: Uuid) -> FarmError {
    FarmError::NotFound(format!("upload lease {} (expired or already used)", lease_id))
}

pub struct PhotoService;

impl PhotoService {
    /// Reserve an object key for one upload
    pub async fn issue_lease(
        pool: &PgPool,
        kv: &KvStore,
        config: &Config,
        req: UploadLeaseRequest,
    ) -> Result<UploadLeaseResponse, FarmError> {
        let farm = FarmRepository::get_public_by_slug(pool, req.farm_slug.trim()).await?;
        let ttl = Duration::from_secs(config.upload_lease_ttl_secs);
        let lease = build_lease(&farm, &req, config.max_upload_bytes, ttl, Utc::now())?;

        kv.set_json_with_ttl(KvStore::lease_key(&lease.lease_id), &lease, ttl)
            .await
            .map_err(|e| FarmError::InternalError(format!("Could not store lease: {}", e)))?;

        log::info!(
            "Issued upload lease {} for farm {} ({} bytes, {})",
            lease.lease_id,
            farm.slug,
            lease.size_bytes,
            lease.content_type
        );

        Ok(UploadLeaseResponse {
            lease_id: lease.lease_id,
            object_key: lease.object_key,
            upload_url: format!("/photos/uploads/{}", lease.lease_id),
            finalize_url: format!("/photos/uploads/{}/finalize", lease.lease_id),
            expires_at: lease.expires_at,
        })
    }

    /// Store the uploaded bytes under the leased key
    pub async fn upload_object(
        kv: &KvStore,
        blob: &BlobClient,
        config: &Config,
        lease_id: Uuid,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<(), FarmError> {
        let lease: UploadLease = kv
            .get_json(&KvStore::lease_key(&lease_id))
            .await
            .ok_or_else(|| lease_not_found(lease_id))?;

        check_upload_content_type(&lease, content_type)?;
        check_upload_body(&lease, body.len(), config.max_upload_bytes)?;
        blob.put_object(&lease.object_key, &lease.content_type, body).await
    }

    /// Consume the lease and queue the photo for moderation
    /// DOCUMENTATION: The lease is taken atomically, so a second finalize
    /// of the same lease is `NotFound`. If the object is missing or the row
    /// cannot be written the lease is put back so the client can retry
    /// before expiry.
    pub async fn finalize(
        pool: &PgPool,
        kv: &KvStore,
        blob: &BlobClient,
        email: &Arc<EmailClient>,
        lease_id: Uuid,
        req: FinalizeUploadRequest,
    ) -> Result<PhotoResponse, FarmError> {
        let key = KvStore::lease_key(&lease_id);
        let lease: UploadLease = kv.take_json(&key).await.ok_or_else(|| lease_not_found(lease_id))?;

        let photo = Self::holding_lease(kv, &lease, async {
            if !blob.verify_object(&lease.object_key).await? {
                return Err(FarmError::ValidationError(format!(
                    "no uploaded object found for lease {}",
                    lease_id
                )));
            }

            PhotoRepository::insert_pending(
                pool,
                &NewPhoto {
                    id: lease.photo_id,
                    farm_id: lease.farm_id,
                    object_key: lease.object_key.clone(),
                    url: blob.public_url(&lease.object_key),
                    content_type: lease.content_type.clone(),
                    size_bytes: lease.size_bytes as i64,
                    caption: req.caption.filter(|c| !c.trim().is_empty()),
                    author_name: req.author_name,
                    author_email: req.author_email,
                },
            )
            .await
        })
        .await?;

        email.send_in_background(EmailMessage::photo_pending(
            email.admin_email(),
            &lease.farm_slug,
            &photo.id,
        ));

        log::info!("Photo {} for farm {} is awaiting moderation", photo.id, lease.farm_slug);
        Ok(photo.to_response())
    }

    /// Run a finalize step on a taken lease, restoring the lease if it fails
    async fn holding_lease<T, F>(kv: &KvStore, lease: &UploadLease, step: F) -> Result<T, FarmError>
    where
        F: Future<Output = Result<T, FarmError>>,
    {
        let result = step.await;
        if let Err(e) = &result {
            log::warn!("Finalize of lease {} failed, lease restored: {}", lease.lease_id, e);
            Self::restore_lease(kv, lease).await;
        }
        result
    }

    async fn restore_lease(kv: &KvStore, lease: &UploadLease) {
        let remaining = (lease.expires_at - Utc::now()).to_std().unwrap_or_default();
        if remaining.is_zero() {
            return;
        }
        if let Err(e) = kv
            .set_json_with_ttl(KvStore::lease_key(&lease.lease_id), lease, remaining)
            .await
        {
            log::warn!("Could not restore lease {}: {}", lease.lease_id, e);
        }
    }

    /// Approved photos of an active farm, newest first
    pub async fn list_for_farm(pool: &PgPool, slug: &str) -> Result<Vec<PhotoResponse>, FarmError> {
        let farm = FarmRepository::get_public_by_slug(pool, slug).await?;
        let photos = PhotoRepository::list_approved_for_farm(pool, farm.id).await?;
        Ok(photos.iter().map(|p| p.to_response()).collect())
    }

    /// Moderation queue, oldest first
    pub async fn list_pending(pool: &PgPool, limit: i64) -> Result<Vec<PhotoResponse>, FarmError> {
        let photos = PhotoRepository::list_pending(pool, limit.clamp(1, 500)).await?;
        Ok(photos.iter().map(|p| p.to_response()).collect())
    }

    /// Approve with FIFO eviction at the per-farm cap
    pub async fn approve(deps: PhotoDeps<'_>, id: Uuid, req: ModerationRequest) -> Result<ApprovalOutcome, FarmError> {
        let (photo, evicted) = PhotoRepository::approve(
            deps.pool,
            id,
            &req.reviewed_by,
            req.notes.as_deref(),
            MAX_APPROVED_PHOTOS_PER_FARM,
        )
        .await?;

        Self::after_visible_change(&deps, photo.farm_id).await;

        Ok(ApprovalOutcome {
            photo: photo.to_response(),
            evicted,
        })
    }

    pub async fn reject(pool: &PgPool, id: Uuid, req: ModerationRequest) -> Result<PhotoResponse, FarmError> {
        let photo = PhotoRepository::transition(
            pool,
            id,
            PhotoStatus::Rejected,
            &req.reviewed_by,
            req.notes.as_deref(),
        )
        .await?;
        Ok(photo.to_response())
    }

    /// Take an approved photo off the farm page
    pub async fn archive(deps: PhotoDeps<'_>, id: Uuid, req: ModerationRequest) -> Result<PhotoResponse, FarmError> {
        let photo = PhotoRepository::transition(
            deps.pool,
            id,
            PhotoStatus::Archived,
            &req.reviewed_by,
            req.notes.as_deref(),
        )
        .await?;

        Self::after_visible_change(&deps, photo.farm_id).await;
        Ok(photo.to_response())
    }

    /// Cache invalidation and IndexNow after the public photo set changed
    async fn after_visible_change(deps: &PhotoDeps<'_>, farm_id: Uuid) {
        match FarmRepository::get_by_id(deps.pool, farm_id).await {
            Ok(farm) => {
                invalidate_farm(deps.kv, &farm.slug).await;
                if farm.is_public() {
                    deps.indexnow.notify_in_background(vec![farm_path(&farm.slug)]);
                }
            }
            Err(e) => log::warn!("Photo change for farm {} not propagated: {}", farm_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FarmStatus;

    fn farm(status: FarmStatus) -> Farm {
        Farm {
            id: Uuid::new_v4(),
            slug: "hollow-farm".into(),
            name: "Hollow Farm".into(),
            description: None,
            address: "Hollow Lane".into(),
            city: None,
            county: "Shropshire".into(),
            postcode: "SY8 1AA".into(),
            latitude: 52.37,
            longitude: -2.72,
            phone: None,
            email: None,
            website: None,
            opening_hours: None,
            offerings: vec![],
            verified: false,
            status,
            owner_email: None,
            google_place_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            distance_km: None,
        }
    }

    fn lease_request(content_type: &str, size_bytes: u64) -> UploadLeaseRequest {
        UploadLeaseRequest {
            farm_slug: "hollow-farm".into(),
            content_type: content_type.into(),
            size_bytes,
        }
    }

    #[test]
    fn test_build_lease() {
        let farm = farm(FarmStatus::Active);
        let now = Utc::now();
        let lease = build_lease(
            &farm,
            &lease_request("IMAGE/PNG", 512),
            1024,
            Duration::from_secs(900),
            now,
        )
        .unwrap();

        assert_eq!(lease.farm_id, farm.id);
        assert_eq!(lease.content_type, "image/png");
        assert_eq!(
            lease.object_key,
            format!("farm-photos/{}/{}.png", farm.id, lease.photo_id)
        );
        assert_eq!(lease.expires_at, now + chrono::Duration::seconds(900));
    }

    #[test]
    fn test_build_lease_rejects_hidden_farm_and_bad_uploads() {
        let ttl = Duration::from_secs(60);
        let now = Utc::now();

        let pending = farm(FarmStatus::Pending);
        assert!(matches!(
            build_lease(&pending, &lease_request("image/png", 10), 1024, ttl, now),
            Err(FarmError::NotFound(_))
        ));

        let active = farm(FarmStatus::Active);
        assert!(matches!(
            build_lease(&active, &lease_request("image/gif", 10), 1024, ttl, now),
            Err(FarmError::ValidationError(_))
        ));
        assert!(matches!(
            build_lease(&active, &lease_request("image/jpeg", 4096), 1024, ttl, now),
            Err(FarmError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_check_upload_body() {
        let lease = build_lease(
            &farm(FarmStatus::Active),
            &lease_request("image/jpeg", 100),
            1024,
            Duration::from_secs(60),
            Utc::now(),
        )
        .unwrap();

        assert!(check_upload_body(&lease, 100, 1024).is_ok());
        assert!(matches!(
            check_upload_body(&lease, 101, 1024),
            Err(FarmError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            check_upload_body(&lease, 0, 1024),
            Err(FarmError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_lease_can_only_be_taken_once() {
        let kv = KvStore::new(60);
        let lease = build_lease(
            &farm(FarmStatus::Active),
            &lease_request("image/webp", 10),
            1024,
            Duration::from_secs(60),
            Utc::now(),
        )
        .unwrap();
        let key = KvStore::lease_key(&lease.lease_id);
        kv.set_json_with_ttl(key.clone(), &lease, Duration::from_secs(60))
            .await
            .unwrap();

        let first: Option<UploadLease> = kv.take_json(&key).await;
        let second: Option<UploadLease> = kv.take_json(&key).await;
        assert_eq!(first, Some(lease));
        assert!(second.is_none());
    }

    #[test]
    fn test_check_upload_content_type() {
        let lease = build_lease(
            &farm(FarmStatus::Active),
            &lease_request("image/jpeg", 100),
            1024,
            Duration::from_secs(60),
            Utc::now(),
        )
        .unwrap();

        assert!(check_upload_content_type(&lease, None).is_ok());
        assert!(check_upload_content_type(&lease, Some("image/jpeg")).is_ok());
        assert!(check_upload_content_type(&lease, Some("Image/JPEG; charset=binary")).is_ok());
        assert!(matches!(
            check_upload_content_type(&lease, Some("image/png")),
            Err(FarmError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_finalize_step_keeps_the_lease() {
        let kv = KvStore::new(60);
        let lease = build_lease(
            &farm(FarmStatus::Active),
            &lease_request("image/jpeg", 10),
            1024,
            Duration::from_secs(60),
            Utc::now(),
        )
        .unwrap();
        let key = KvStore::lease_key(&lease.lease_id);
        kv.set_json_with_ttl(key.clone(), &lease, Duration::from_secs(60))
            .await
            .unwrap();

        let taken: UploadLease = kv.take_json(&key).await.unwrap();
        let result: Result<(), FarmError> = PhotoService::holding_lease(&kv, &taken, async {
            Err(FarmError::DatabaseError("pool timed out".into()))
        })
        .await;
        assert!(matches!(result, Err(FarmError::DatabaseError(_))));

        let again: Option<UploadLease> = kv.take_json(&key).await;
        assert_eq!(again, Some(lease));

        let ok = PhotoService::holding_lease(&kv, &taken, async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
        assert!(kv.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_restore_lease_puts_it_back() {
        let kv = KvStore::new(60);
        let lease = build_lease(
            &farm(FarmStatus::Active),
            &lease_request("image/webp", 10),
            1024,
            Duration::from_secs(60),
            Utc::now(),
        )
        .unwrap();

        PhotoService::restore_lease(&kv, &lease).await;
        let restored: Option<UploadLease> = kv.get_json(&KvStore::lease_key(&lease.lease_id)).await;
        assert_eq!(restored, Some(lease));
    }
}
