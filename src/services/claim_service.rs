// src/services/claim_service.rs
// DOCUMENTATION: Ownership claim workflow
// PURPOSE: Let owners claim an existing listing and apply admin decisions

use crate::db::{ClaimRepository, FarmRepository};
use crate::errors::FarmError;
use crate::models::{Claim, CreateClaimRequest, ReviewRequest, ReviewStatus};
use crate::services::farm_service::{farm_path, invalidate_farm};
use crate::services::{EmailClient, EmailMessage, IndexNowClient, KvStore};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct ClaimService;

impl ClaimService {
    /// Open a claim on an active farm
    pub async fn create(
        pool: &PgPool,
        email: &Arc<EmailClient>,
        slug: &str,
        req: CreateClaimRequest,
    ) -> Result<Claim, FarmError> {
        let farm = FarmRepository::get_public_by_slug(pool, slug).await?;
        let claim = ClaimRepository::create(pool, farm.id, &req).await?;

        email.send_in_background(EmailMessage::claim_received(
            email.admin_email(),
            &farm.name,
            &claim.claimant_name,
        ));

        log::info!("Claim {} opened for farm {}", claim.id, farm.slug);
        Ok(claim)
    }

    pub async fn list(pool: &PgPool, status: Option<ReviewStatus>) -> Result<Vec<Claim>, FarmError> {
        ClaimRepository::list(pool, status).await
    }

    /// Approve or reject a pending claim
    pub async fn review(
        pool: &PgPool,
        kv: &KvStore,
        email: &Arc<EmailClient>,
        indexnow: &Arc<IndexNowClient>,
        id: Uuid,
        decision: ReviewStatus,
        req: ReviewRequest,
    ) -> Result<Claim, FarmError> {
        let (claim, farm, superseded) = ClaimRepository::review(
            pool,
            id,
            decision,
            req.reviewed_by.trim(),
            req.notes.as_deref(),
        )
        .await?;

        let approved = decision == ReviewStatus::Approved;
        if approved {
            invalidate_farm(kv, &farm.slug).await;
            indexnow.notify_in_background(vec![farm_path(&farm.slug)]);

            for other in &superseded {
                email.send_in_background(EmailMessage::claim_decision(
                    &other.claimant_email,
                    &farm.name,
                    false,
                ));
            }
        }

        email.send_in_background(EmailMessage::claim_decision(
            &claim.claimant_email,
            &farm.name,
            approved,
        ));

        Ok(claim)
    }
}
