// src/db/photo_repository.rs
// DOCUMENTATION: Photo database operations
// PURPOSE: Persist uploads and apply moderation decisions atomically

use crate::db::db_error;
use crate::errors::FarmError;
use crate::models::{NewPhoto, Photo, PhotoRow, PhotoStatus};
use crate::services::photo_policy::{ensure_transition, plan_eviction, ApprovedSlot};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const PHOTO_COLUMNS: &str = r#"
    id, farm_id, object_key, url, content_type, size_bytes, caption,
    author_name, author_email, status, submitted_at, approved_at,
    reviewed_by, review_notes, replaced_by, updated_at
"#;

pub struct PhotoRepository;

impl PhotoRepository {
    /// Record a finalized upload as pending
    pub async fn insert_pending(pool: &PgPool, photo: &NewPhoto) -> Result<Photo, FarmError> {
        let row = sqlx::query_as::<_, PhotoRow>(&format!(
            r#"
            INSERT INTO farm_photos (
                id, farm_id, object_key, url, content_type, size_bytes,
                caption, author_name, author_email, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending')
            RETURNING {}
            "#,
            PHOTO_COLUMNS
        ))
        .bind(photo.id)
        .bind(photo.farm_id)
        .bind(&photo.object_key)
        .bind(&photo.url)
        .bind(&photo.content_type)
        .bind(photo.size_bytes)
        .bind(&photo.caption)
        .bind(&photo.author_name)
        .bind(&photo.author_email)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                FarmError::AlreadyExists(format!("photo {}", photo.id))
            }
            e => {
                log::error!("Failed to create photo {}: {}", photo.id, e);
                FarmError::DatabaseError(format!("Create photo failed: {}", e))
            }
        })?;

        Ok(row.into_photo())
    }

    /// Approved photos for a farm, newest first
    pub async fn list_approved_for_farm(pool: &PgPool, farm_id: Uuid) -> Result<Vec<Photo>, FarmError> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            r#"
            SELECT {} FROM farm_photos
            WHERE farm_id = $1 AND status = 'approved'
            ORDER BY approved_at DESC NULLS LAST
            "#,
            PHOTO_COLUMNS
        ))
        .bind(farm_id)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to fetch photos for farm {}: {}", farm_id, e);
            FarmError::DatabaseError(format!("Fetch photos failed: {}", e))
        })?;

        Ok(rows.into_iter().map(PhotoRow::into_photo).collect())
    }

    /// Moderation queue, oldest first
    pub async fn list_pending(pool: &PgPool, limit: i64) -> Result<Vec<Photo>, FarmError> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            r#"
            SELECT {} FROM farm_photos
            WHERE status = 'pending'
            ORDER BY submitted_at ASC
            LIMIT $1
            "#,
            PHOTO_COLUMNS
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(db_error("Pending photo query failed"))?;

        Ok(rows.into_iter().map(PhotoRow::into_photo).collect())
    }

    /// Lock a photo row and check the requested transition
    async fn lock_for_transition(
        conn: &mut PgConnection,
        id: Uuid,
        to: PhotoStatus,
    ) -> Result<Photo, FarmError> {
        let photo = sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {} FROM farm_photos WHERE id = $1 FOR UPDATE",
            PHOTO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Photo lock failed"))?
        .ok_or_else(|| FarmError::NotFound(format!("photo {}", id)))?
        .into_photo();

        ensure_transition(id, photo.status, to)?;
        Ok(photo)
    }

    async fn set_reviewed_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: PhotoStatus,
        reviewed_by: &str,
        notes: Option<&str>,
    ) -> Result<Photo, FarmError> {
        let approved_at = if status == PhotoStatus::Approved {
            Some(Utc::now())
        } else {
            None
        };

        let row = sqlx::query_as::<_, PhotoRow>(&format!(
            r#"
            UPDATE farm_photos SET
                status = $2,
                approved_at = COALESCE($3, approved_at),
                reviewed_by = $4,
                review_notes = COALESCE($5, review_notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PHOTO_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(approved_at)
        .bind(reviewed_by)
        .bind(notes)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("Photo status update failed"))?;

        Ok(row.into_photo())
    }

    /// Approve a pending photo, evicting the oldest approvals over the cap
    /// DOCUMENTATION: One transaction. The farm row is locked first so
    /// concurrent approvals for the same farm are serialized and the farm
    /// never shows more than `cap` approved photos. Evicted photos become
    /// `replaced` and point at the new photo. Returns (photo, evicted ids).
    pub async fn approve(
        pool: &PgPool,
        id: Uuid,
        reviewed_by: &str,
        notes: Option<&str>,
        cap: usize,
    ) -> Result<(Photo, Vec<Uuid>), FarmError> {
        let mut tx = pool.begin().await.map_err(db_error("Begin transaction failed"))?;

        let pending = Self::lock_for_transition(&mut tx, id, PhotoStatus::Approved).await?;

        sqlx::query("SELECT id FROM farms WHERE id = $1 FOR UPDATE")
            .bind(pending.farm_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Farm lock failed"))?;

        let approved: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, COALESCE(approved_at, submitted_at)
            FROM farm_photos
            WHERE farm_id = $1 AND status = 'approved'
            ORDER BY 2 ASC
            FOR UPDATE
            "#,
        )
        .bind(pending.farm_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Approved photo query failed"))?;

        let slots: Vec<ApprovedSlot> = approved
            .into_iter()
            .map(|(id, approved_at)| ApprovedSlot { id, approved_at })
            .collect();
        let evicted = plan_eviction(&slots, cap);

        if !evicted.is_empty() {
            sqlx::query(
                r#"
                UPDATE farm_photos SET
                    status = 'replaced',
                    replaced_by = $2,
                    updated_at = NOW()
                WHERE id = ANY($1)
                "#,
            )
            .bind(&evicted)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Photo eviction failed"))?;
        }

        let photo =
            Self::set_reviewed_status(&mut tx, id, PhotoStatus::Approved, reviewed_by, notes).await?;

        tx.commit().await.map_err(db_error("Commit failed"))?;

        log::info!(
            "Approved photo {} for farm {} ({} evicted)",
            id,
            photo.farm_id,
            evicted.len()
        );

        Ok((photo, evicted))
    }

    /// Reject a pending photo or archive an approved one
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        to: PhotoStatus,
        reviewed_by: &str,
        notes: Option<&str>,
    ) -> Result<Photo, FarmError> {
        let mut tx = pool.begin().await.map_err(db_error("Begin transaction failed"))?;

        Self::lock_for_transition(&mut tx, id, to).await?;
        let photo = Self::set_reviewed_status(&mut tx, id, to, reviewed_by, notes).await?;

        tx.commit().await.map_err(db_error("Commit failed"))?;

        log::info!("Photo {} is now {}", id, to);
        Ok(photo)
    }

    /// Photo counts per status
    pub async fn status_counts(pool: &PgPool) -> Result<Vec<(String, i64)>, FarmError> {
        sqlx::query_as("SELECT status, COUNT(*) FROM farm_photos GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await
            .map_err(db_error("Photo status counts failed"))
    }
}
