// src/db/claim_repository.rs
// DOCUMENTATION: Ownership claim database operations
// PURPOSE: Record claims and apply approvals to the claimed farm

use crate::db::{db_error, FarmRepository, FARM_COLUMNS};
use crate::errors::FarmError;
use crate::models::{Claim, ClaimRow, CreateClaimRequest, Farm, FarmRow, ReviewStatus};
use sqlx::PgPool;
use uuid::Uuid;

const CLAIM_COLUMNS: &str = r#"
    id, farm_id, claimant_name, claimant_email, role, phone, message,
    status, reviewed_by, review_notes, reviewed_at, created_at
"#;

pub struct ClaimRepository;

impl ClaimRepository {
    /// Open a claim; one pending claim per farm and email
    pub async fn create(pool: &PgPool, farm_id: Uuid, req: &CreateClaimRequest) -> Result<Claim, FarmError> {
        let row = sqlx::query_as::<_, ClaimRow>(&format!(
            r#"
            INSERT INTO claims (farm_id, claimant_name, claimant_email, role, phone, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        ))
        .bind(farm_id)
        .bind(req.claimant_name.trim())
        .bind(req.claimant_email.trim())
        .bind(&req.role)
        .bind(&req.phone)
        .bind(&req.message)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => FarmError::AlreadyExists(
                format!("a claim from {} is already pending", req.claimant_email),
            ),
            e => {
                log::error!("Failed to create claim for farm {}: {}", farm_id, e);
                FarmError::DatabaseError(format!("Create claim failed: {}", e))
            }
        })?;

        Ok(row.into_claim())
    }

    /// Review queue, oldest first
    pub async fn list(pool: &PgPool, status: Option<ReviewStatus>) -> Result<Vec<Claim>, FarmError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            r#"
            SELECT {} FROM claims
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at ASC
            "#,
            CLAIM_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
        .map_err(db_error("Claim list failed"))?;

        Ok(rows.into_iter().map(ClaimRow::into_claim).collect())
    }

    /// Approve or reject a pending claim
    /// DOCUMENTATION: Approval sets the farm owner, marks the farm verified
    /// and rejects the farm's other pending claims. Returns the claim, the
    /// farm and the superseded claims.
    pub async fn review(
        pool: &PgPool,
        id: Uuid,
        decision: ReviewStatus,
        reviewed_by: &str,
        notes: Option<&str>,
    ) -> Result<(Claim, Farm, Vec<Claim>), FarmError> {
        let mut tx = pool.begin().await.map_err(db_error("Begin transaction failed"))?;

        // Farm row first, then claims: approvals for one farm run one at a time
        let farm_id: Uuid = sqlx::query_scalar("SELECT farm_id FROM claims WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Claim lookup failed"))?
            .ok_or_else(|| FarmError::NotFound(format!("claim {}", id)))?;

        sqlx::query("SELECT id FROM farms WHERE id = $1 FOR UPDATE")
            .bind(farm_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Farm lock failed"))?;

        let current = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {} FROM claims WHERE id = $1 FOR UPDATE",
            CLAIM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Claim lock failed"))?
        .ok_or_else(|| FarmError::NotFound(format!("claim {}", id)))?
        .into_claim();

        if !current.status.can_transition_to(decision) {
            return Err(FarmError::Conflict(format!(
                "claim {} is already {}",
                id, current.status
            )));
        }

        let row = sqlx::query_as::<_, ClaimRow>(&format!(
            r#"
            UPDATE claims SET
                status = $2, reviewed_by = $3, review_notes = $4, reviewed_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        ))
        .bind(id)
        .bind(decision.as_str())
        .bind(reviewed_by)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Claim review failed"))?;

        let (farm, superseded) = if decision == ReviewStatus::Approved {
            let farm = FarmRepository::set_owner(&mut tx, current.farm_id, &current.claimant_email).await?;

            let superseded = sqlx::query_as::<_, ClaimRow>(&format!(
                r#"
                UPDATE claims SET
                    status = 'rejected',
                    reviewed_by = $3,
                    review_notes = 'superseded by an approved claim',
                    reviewed_at = NOW()
                WHERE farm_id = $1 AND id <> $2 AND status = 'pending'
                RETURNING {}
                "#,
                CLAIM_COLUMNS
            ))
            .bind(current.farm_id)
            .bind(id)
            .bind(reviewed_by)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error("Superseding claims failed"))?;

            (farm, superseded.into_iter().map(ClaimRow::into_claim).collect::<Vec<_>>())
        } else {
            let farm = sqlx::query_as::<_, FarmRow>(&format!(
                "SELECT {} FROM farms f WHERE f.id = $1",
                FARM_COLUMNS
            ))
            .bind(current.farm_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("Farm lookup failed"))?
            .into_farm();
            (farm, Vec::new())
        };

        tx.commit().await.map_err(db_error("Commit failed"))?;

        log::info!(
            "Claim {} {} by {} ({} superseded)",
            id,
            decision,
            reviewed_by,
            superseded.len()
        );
        Ok((row.into_claim(), farm, superseded))
    }

    pub async fn status_counts(pool: &PgPool) -> Result<Vec<(String, i64)>, FarmError> {
        sqlx::query_as("SELECT status, COUNT(*) FROM claims GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await
            .map_err(db_error("Claim status counts failed"))
    }
}
