// src/services/submission_service.rs
// DOCUMENTATION: Farm submission workflow
// PURPOSE: Turn a visitor's proposal into a pending farm and apply the
// admin's decision

use crate::config::Config;
use crate::db::{NewSubmission, SubmissionRepository};
use crate::errors::FarmError;
use crate::models::{
    CreateSubmissionRequest, FarmStatus, NewFarm, ReviewRequest, ReviewStatus, Submission,
    SubmissionReceipt,
};
use crate::services::farm_service::farm_path;
use crate::services::postcode_client::{is_valid_format, normalize_postcode};
use crate::services::slug::farm_slug;
use crate::services::{EmailClient, EmailMessage, IndexNowClient, PostcodeClient};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pending farm built from a submission once coordinates are known
fn pending_farm(req: &CreateSubmissionRequest, postcode: String, latitude: f64, longitude: f64) -> NewFarm {
    let name = req.name.trim().to_string();
    let city = trimmed(req.city.clone());
    let county = req.county.trim().to_string();

    NewFarm {
        slug: farm_slug(&name, city.as_deref(), &county),
        name,
        description: trimmed(req.description.clone()),
        address: req.address.trim().to_string(),
        city,
        county,
        postcode,
        latitude,
        longitude,
        phone: trimmed(req.phone.clone()),
        email: trimmed(req.email.clone()),
        website: trimmed(req.website.clone()),
        opening_hours: req.opening_hours.clone(),
        offerings: req
            .offerings
            .iter()
            .map(|o| o.trim().to_lowercase())
            .filter(|o| !o.is_empty())
            .collect(),
        verified: false,
        status: FarmStatus::Pending,
        google_place_id: None,
    }
}

pub struct SubmissionService;

impl SubmissionService {
    /// Accept a new farm proposal
    pub async fn submit(
        pool: &PgPool,
        postcodes: &PostcodeClient,
        email: &Arc<EmailClient>,
        req: CreateSubmissionRequest,
    ) -> Result<SubmissionReceipt, FarmError> {
        let postcode = normalize_postcode(&req.postcode);
        if !is_valid_format(&postcode) {
            return Err(FarmError::ValidationError(format!(
                "{} is not a valid UK postcode",
                req.postcode.trim()
            )));
        }

        let (latitude, longitude) = match (req.latitude, req.longitude) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => postcodes
                .validate(&postcode)
                .await?
                .and_then(|info| info.coordinates())
                .ok_or_else(|| {
                    FarmError::ValidationError(format!(
                        "could not find coordinates for postcode {}",
                        postcode
                    ))
                })?,
        };

        let farm = pending_farm(&req, postcode, latitude, longitude);
        let submitter = NewSubmission {
            submitter_name: req.submitter_name.trim().to_string(),
            submitter_email: req.submitter_email.trim().to_string(),
            notes: trimmed(req.notes.clone()),
        };

        let (submission, farm) =
            SubmissionRepository::create_with_farm(pool, farm, &req.categories, &submitter).await?;

        email.send_in_background(EmailMessage::new_submission(
            email.admin_email(),
            &farm.name,
            &submission.submitter_name,
        ));

        Ok(SubmissionReceipt {
            submission_id: submission.id,
            farm_slug: farm.slug,
            status: submission.status,
        })
    }

    pub async fn list(pool: &PgPool, status: Option<ReviewStatus>) -> Result<Vec<Submission>, FarmError> {
        SubmissionRepository::list(pool, status).await
    }

    /// Approve or reject; the submitter hears about it either way
    pub async fn review(
        pool: &PgPool,
        config: &Config,
        email: &Arc<EmailClient>,
        indexnow: &Arc<IndexNowClient>,
        id: Uuid,
        decision: ReviewStatus,
        req: ReviewRequest,
    ) -> Result<Submission, FarmError> {
        let (submission, farm) = SubmissionRepository::review(
            pool,
            id,
            decision,
            req.reviewed_by.trim(),
            req.notes.as_deref(),
        )
        .await?;

        let approved = decision == ReviewStatus::Approved;
        if approved {
            indexnow.notify_in_background(vec![farm_path(&farm.slug)]);
        }

        email.send_in_background(EmailMessage::submission_decision(
            &submission.submitter_email,
            &farm.name,
            approved,
            &config.farm_url(&farm.slug),
            req.notes.as_deref(),
        ));

        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateSubmissionRequest {
        CreateSubmissionRequest {
            name: "  Hollow Farm Shop ".into(),
            description: Some("   ".into()),
            address: "Hollow Lane".into(),
            city: Some("Ludlow".into()),
            county: "Shropshire".into(),
            postcode: "sy81aa".into(),
            latitude: None,
            longitude: None,
            phone: Some(" 01584 000000 ".into()),
            email: None,
            website: None,
            opening_hours: None,
            offerings: vec![" Eggs ".into(), "".into()],
            categories: vec!["eggs".into()],
            submitter_name: "Sam".into(),
            submitter_email: "sam@example.com".into(),
            notes: None,
        }
    }

    #[test]
    fn test_pending_farm_cleans_input() {
        let farm = pending_farm(&request(), "SY8 1AA".into(), 52.37, -2.72);

        assert_eq!(farm.name, "Hollow Farm Shop");
        assert_eq!(farm.slug, "hollow-farm-shop-ludlow");
        assert_eq!(farm.description, None);
        assert_eq!(farm.phone.as_deref(), Some("01584 000000"));
        assert_eq!(farm.offerings, vec!["eggs"]);
        assert_eq!(farm.status, FarmStatus::Pending);
        assert!(!farm.verified);
    }
}
