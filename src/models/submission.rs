// src/models/submission.rs
// DOCUMENTATION: Farm submissions and ownership claims
// PURPOSE: Review workflow records with audit fields

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Review state shared by submissions and claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

pub type SubmissionStatus = ReviewStatus;
pub type ClaimStatus = ReviewStatus;

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    /// Decisions are final: only pending records can be reviewed
    pub fn can_transition_to(&self, next: ReviewStatus) -> bool {
        matches!(
            (self, next),
            (ReviewStatus::Pending, ReviewStatus::Approved)
                | (ReviewStatus::Pending, ReviewStatus::Rejected)
        )
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(format!("unknown review status: {}", other)),
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_status(id: Uuid, raw: &str) -> ReviewStatus {
    raw.parse().unwrap_or_else(|e| {
        log::warn!("Record {} has {}; treating as pending", id, e);
        ReviewStatus::Pending
    })
}

/// Raw row from the submissions table
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub submitter_name: String,
    pub submitter_email: String,
    pub notes: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending farm awaiting admin review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub submitter_name: String,
    pub submitter_email: String,
    pub notes: Option<String>,
    pub status: SubmissionStatus,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    pub fn into_submission(self) -> Submission {
        let status = parse_status(self.id, &self.status);
        Submission {
            id: self.id,
            farm_id: self.farm_id,
            submitter_name: self.submitter_name,
            submitter_email: self.submitter_email,
            notes: self.notes,
            status,
            reviewed_by: self.reviewed_by,
            review_notes: self.review_notes,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Request DTO for POST /submissions
/// DOCUMENTATION: A visitor proposing a new farm shop listing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSubmissionRequest {
    #[validate(length(min = 2, max = 255))]
    pub name: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(length(min = 3, max = 500))]
    pub address: String,

    #[validate(length(max = 100))]
    pub city: Option<String>,

    #[validate(length(min = 2, max = 100))]
    pub county: String,

    #[validate(length(min = 5, max = 10))]
    pub postcode: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(url)]
    pub website: Option<String>,

    pub opening_hours: Option<serde_json::Value>,

    #[serde(default)]
    pub offerings: Vec<String>,

    /// Category slugs to link
    #[serde(default)]
    pub categories: Vec<String>,

    #[validate(length(min = 1, max = 100))]
    pub submitter_name: String,

    #[validate(email)]
    pub submitter_email: String,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Returned to the submitter
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub farm_slug: String,
    pub status: SubmissionStatus,
}

/// Body of admin review actions on submissions and claims
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1, max = 100))]
    pub reviewed_by: String,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Filter for admin review queues
#[derive(Debug, Default, Deserialize)]
pub struct ReviewQueueQuery {
    pub status: Option<ReviewStatus>,
}

/// Raw row from the claims table
#[derive(Debug, Clone, FromRow)]
pub struct ClaimRow {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub claimant_name: String,
    pub claimant_email: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A farm owner asserting ownership of an existing listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub claimant_name: String,
    pub claimant_email: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub status: ClaimStatus,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ClaimRow {
    pub fn into_claim(self) -> Claim {
        let status = parse_status(self.id, &self.status);
        Claim {
            id: self.id,
            farm_id: self.farm_id,
            claimant_name: self.claimant_name,
            claimant_email: self.claimant_email,
            role: self.role,
            phone: self.phone,
            message: self.message,
            status,
            reviewed_by: self.reviewed_by,
            review_notes: self.review_notes,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
        }
    }
}

/// Request DTO for POST /farms/{slug}/claims
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateClaimRequest {
    #[validate(length(min = 1, max = 100))]
    pub claimant_name: String,

    #[validate(email)]
    pub claimant_email: String,

    /// e.g. "owner", "manager"
    #[validate(length(max = 100))]
    pub role: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_can_be_reviewed() {
        assert!(ReviewStatus::Pending.can_transition_to(ReviewStatus::Approved));
        assert!(ReviewStatus::Pending.can_transition_to(ReviewStatus::Rejected));
        assert!(!ReviewStatus::Pending.can_transition_to(ReviewStatus::Pending));
        assert!(!ReviewStatus::Approved.can_transition_to(ReviewStatus::Rejected));
        assert!(!ReviewStatus::Rejected.can_transition_to(ReviewStatus::Approved));
    }

    #[test]
    fn test_submission_validation() {
        let req = CreateSubmissionRequest {
            name: "Hollow Farm Shop".into(),
            description: None,
            address: "Hollow Lane".into(),
            city: Some("Ludlow".into()),
            county: "Shropshire".into(),
            postcode: "SY8 1AA".into(),
            latitude: Some(52.37),
            longitude: Some(-2.72),
            phone: None,
            email: None,
            website: Some("https://hollowfarm.co.uk".into()),
            opening_hours: None,
            offerings: vec!["eggs".into()],
            categories: vec![],
            submitter_name: "Sam".into(),
            submitter_email: "sam@example.com".into(),
            notes: None,
        };
        assert!(req.validate().is_ok());

        let bad = CreateSubmissionRequest {
            submitter_email: "not-an-email".into(),
            latitude: Some(123.0),
            ..req
        };
        assert!(bad.validate().is_err());
    }
}
