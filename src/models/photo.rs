// src/models/photo.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Moderation state of a user-submitted photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    /// Uploaded and waiting in the moderation queue
    Pending,
    /// Visible on the farm page (at most 5 per farm)
    Approved,
    Rejected,
    /// Evicted by a newer approval when the farm was at its cap
    Replaced,
    /// Removed by an admin after approval
    Archived,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Pending => "pending",
            PhotoStatus::Approved => "approved",
            PhotoStatus::Rejected => "rejected",
            PhotoStatus::Replaced => "replaced",
            PhotoStatus::Archived => "archived",
        }
    }
}

impl FromStr for PhotoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PhotoStatus::Pending),
            "approved" => Ok(PhotoStatus::Approved),
            "rejected" => Ok(PhotoStatus::Rejected),
            "replaced" => Ok(PhotoStatus::Replaced),
            "archived" => Ok(PhotoStatus::Archived),
            other => Err(format!("unknown photo status: {}", other)),
        }
    }
}

impl fmt::Display for PhotoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw row from the farm_photos table
#[derive(Debug, Clone, FromRow)]
pub struct PhotoRow {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub object_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub caption: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub replaced_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl PhotoRow {
    pub fn into_photo(self) -> Photo {
        let status = self.status.parse().unwrap_or_else(|e| {
            log::warn!("Photo {} has {}; treating as pending", self.id, e);
            PhotoStatus::Pending
        });

        Photo {
            id: self.id,
            farm_id: self.farm_id,
            object_key: self.object_key,
            url: self.url,
            content_type: self.content_type,
            size_bytes: self.size_bytes,
            caption: self.caption,
            author_name: self.author_name,
            author_email: self.author_email,
            status,
            submitted_at: self.submitted_at,
            approved_at: self.approved_at,
            reviewed_by: self.reviewed_by,
            review_notes: self.review_notes,
            replaced_by: self.replaced_by,
            updated_at: self.updated_at,
        }
    }
}

/// Farm photo submitted by a visitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub farm_id: Uuid,
    /// Key of the object in blob storage
    pub object_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub caption: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub status: PhotoStatus,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    /// Photo whose approval evicted this one
    pub replaced_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Photo DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub author_name: Option<String>,
    pub status: PhotoStatus,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Photo {
    /// Convert database photo into API response DTO
    pub fn to_response(&self) -> PhotoResponse {
        PhotoResponse {
            id: self.id,
            url: self.url.clone(),
            caption: self.caption.clone(),
            author_name: self.author_name.clone(),
            status: self.status,
            submitted_at: self.submitted_at,
            approved_at: self.approved_at,
        }
    }
}

/// Fields persisted when an upload is finalized
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub object_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub caption: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

/// Request body for POST /photos/uploads
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadLeaseRequest {
    #[validate(length(min = 1, max = 255))]
    pub farm_slug: String,

    #[validate(length(min = 1, max = 100))]
    pub content_type: String,

    #[validate(range(min = 1))]
    pub size_bytes: u64,
}

/// Reservation of an object key, held in the key-value store until
/// finalized or expired
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadLease {
    pub lease_id: Uuid,
    /// Id the photo row will get on finalize
    pub photo_id: Uuid,
    pub farm_id: Uuid,
    pub farm_slug: String,
    pub object_key: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub expires_at: DateTime<Utc>,
}

/// Response for POST /photos/uploads
#[derive(Debug, Clone, Serialize)]
pub struct UploadLeaseResponse {
    pub lease_id: Uuid,
    pub object_key: String,
    /// Where the client PUTs the binary
    pub upload_url: String,
    pub finalize_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Request body for POST /photos/uploads/{lease_id}/finalize
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FinalizeUploadRequest {
    #[validate(length(max = 500))]
    pub caption: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub author_name: Option<String>,

    #[validate(email)]
    pub author_email: Option<String>,
}

/// Body of admin moderation actions
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ModerationRequest {
    #[validate(length(min = 1, max = 100))]
    pub reviewed_by: String,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Outcome of an approval, including photos pushed out by the cap
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub photo: PhotoResponse,
    pub evicted: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&PhotoStatus::Replaced).unwrap();
        assert_eq!(json, "\"replaced\"");
        assert_eq!("archived".parse::<PhotoStatus>(), Ok(PhotoStatus::Archived));
    }
}
