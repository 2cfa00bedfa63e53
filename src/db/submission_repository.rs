// src/db/submission_repository.rs
// DOCUMENTATION: Submission database operations
// PURPOSE: Create pending farms with their submission and record reviews

use crate::db::{db_error, CategoryRepository, FarmRepository};
use crate::errors::FarmError;
use crate::models::{
    Farm, FarmStatus, NewFarm, ReviewStatus, Submission, SubmissionRow,
};
use sqlx::PgPool;
use uuid::Uuid;

const SUBMISSION_COLUMNS: &str = r#"
    id, farm_id, submitter_name, submitter_email, notes, status,
    reviewed_by, review_notes, reviewed_at, created_at, updated_at
"#;

/// Who submitted a farm and why
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub submitter_name: String,
    pub submitter_email: String,
    pub notes: Option<String>,
}

pub struct SubmissionRepository;

impl SubmissionRepository {
    /// Insert a pending farm, its categories and the submission together
    /// DOCUMENTATION: Rejects a duplicate (same normalized name and postcode,
    /// not rejected) with `AlreadyExists`. The slug is made unique here.
    pub async fn create_with_farm(
        pool: &PgPool,
        farm: NewFarm,
        categories: &[String],
        submission: &NewSubmission,
    ) -> Result<(Submission, Farm), FarmError> {
        let mut tx = pool.begin().await.map_err(db_error("Begin transaction failed"))?;

        if let Some(existing) = FarmRepository::find_duplicate(&mut tx, &farm.name, &farm.postcode).await? {
            return Err(FarmError::AlreadyExists(format!(
                "{} at {} is already listed as {}",
                farm.name, farm.postcode, existing.slug
            )));
        }

        let slug = FarmRepository::next_free_slug(&mut tx, &farm.slug).await?;
        let farm = FarmRepository::insert(&mut tx, &NewFarm { slug, ..farm }).await?;
        CategoryRepository::link(&mut tx, farm.id, categories).await?;

        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            INSERT INTO submissions (farm_id, submitter_name, submitter_email, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        ))
        .bind(farm.id)
        .bind(&submission.submitter_name)
        .bind(&submission.submitter_email)
        .bind(&submission.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Create submission failed"))?;

        tx.commit().await.map_err(db_error("Commit failed"))?;

        log::info!("Created submission {} for farm {}", row.id, farm.slug);
        Ok((row.into_submission(), farm))
    }

    /// Review queue, oldest first
    pub async fn list(pool: &PgPool, status: Option<ReviewStatus>) -> Result<Vec<Submission>, FarmError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            SELECT {} FROM submissions
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at ASC
            "#,
            SUBMISSION_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
        .map_err(db_error("Submission list failed"))?;

        Ok(rows.into_iter().map(SubmissionRow::into_submission).collect())
    }

    /// Approve or reject a pending submission
    /// DOCUMENTATION: Approval activates the farm, rejection marks it
    /// rejected. Both rows change in one transaction.
    pub async fn review(
        pool: &PgPool,
        id: Uuid,
        decision: ReviewStatus,
        reviewed_by: &str,
        notes: Option<&str>,
    ) -> Result<(Submission, Farm), FarmError> {
        let mut tx = pool.begin().await.map_err(db_error("Begin transaction failed"))?;

        let current = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {} FROM submissions WHERE id = $1 FOR UPDATE",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Submission lock failed"))?
        .ok_or_else(|| FarmError::NotFound(format!("submission {}", id)))?
        .into_submission();

        if !current.status.can_transition_to(decision) {
            return Err(FarmError::Conflict(format!(
                "submission {} is already {}",
                id, current.status
            )));
        }

        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            UPDATE submissions SET
                status = $2,
                reviewed_by = $3,
                review_notes = $4,
                reviewed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .bind(decision.as_str())
        .bind(reviewed_by)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Submission review failed"))?;

        let farm_status = match decision {
            ReviewStatus::Approved => FarmStatus::Active,
            _ => FarmStatus::Rejected,
        };
        let farm = FarmRepository::set_status(&mut tx, current.farm_id, farm_status).await?;

        tx.commit().await.map_err(db_error("Commit failed"))?;

        log::info!("Submission {} {} by {}", id, decision, reviewed_by);
        Ok((row.into_submission(), farm))
    }

    pub async fn status_counts(pool: &PgPool) -> Result<Vec<(String, i64)>, FarmError> {
        sqlx::query_as("SELECT status, COUNT(*) FROM submissions GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await
            .map_err(db_error("Submission status counts failed"))
    }
}
