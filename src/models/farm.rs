// src/models/farm.rs
// DOCUMENTATION: Core data structures for farm listings
// PURPOSE: Defines all serialization/deserialization models for API and database

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::{CategoryResponse, PhotoResponse};

/// Lifecycle of a listing
/// DOCUMENTATION: Only `Active` farms are visible on the public site.
/// `Pending` farms come from submissions awaiting review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FarmStatus {
    Active,
    Pending,
    Rejected,
}

impl FarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FarmStatus::Active => "active",
            FarmStatus::Pending => "pending",
            FarmStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for FarmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(FarmStatus::Active),
            "pending" => Ok(FarmStatus::Pending),
            "rejected" => Ok(FarmStatus::Rejected),
            other => Err(format!("unknown farm status: {}", other)),
        }
    }
}

impl fmt::Display for FarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw row from the farms table
/// DOCUMENTATION: Status is stored as text and converted in `into_farm`
#[derive(Debug, Clone, FromRow)]
pub struct FarmRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub county: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<Value>,
    pub offerings: Vec<String>,
    pub verified: bool,
    pub status: String,
    pub owner_email: Option<String>,
    pub google_place_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only present on proximity searches
    #[sqlx(default)]
    pub distance_km: Option<f64>,
}

impl FarmRow {
    pub fn into_farm(self) -> Farm {
        let status = self.status.parse().unwrap_or_else(|e| {
            log::warn!("Farm {} has {}; treating as pending", self.id, e);
            FarmStatus::Pending
        });

        Farm {
            id: self.id,
            slug: self.slug,
            name: self.name,
            description: self.description,
            address: self.address,
            city: self.city,
            county: self.county,
            postcode: self.postcode,
            latitude: self.latitude,
            longitude: self.longitude,
            phone: self.phone,
            email: self.email,
            website: self.website,
            opening_hours: self.opening_hours,
            offerings: self.offerings,
            verified: self.verified,
            status,
            owner_email: self.owner_email,
            google_place_id: self.google_place_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            distance_km: self.distance_km,
        }
    }
}

/// Represents a complete farm record
/// DOCUMENTATION: Maps to the farms table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Farm {
    pub id: Uuid,

    /// URL-safe unique identifier used in public routes
    pub slug: String,

    pub name: String,
    pub description: Option<String>,

    /// Street address
    pub address: String,
    pub city: Option<String>,
    pub county: String,

    /// Normalized UK postcode ("SW1A 1AA")
    pub postcode: String,

    pub latitude: f64,
    pub longitude: f64,

    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,

    /// Opening hours by day, free-form JSON
    pub opening_hours: Option<Value>,

    /// What the shop sells (e.g. "eggs", "pick your own")
    pub offerings: Vec<String>,

    /// Set once an owner claim has been approved
    pub verified: bool,

    pub status: FarmStatus,

    /// Contact of the approved owner, never exposed publicly
    pub owner_email: Option<String>,

    /// Google Places id from the import pipeline (used for deduplication)
    pub google_place_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub distance_km: Option<f64>,
}

/// Response DTO for API responses
/// DOCUMENTATION: Public view of a farm, hides owner and import metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmResponse {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub county: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<Value>,
    pub offerings: Vec<String>,
    pub verified: bool,
    pub status: FarmStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl Farm {
    /// Convert database farm into API response DTO
    pub fn to_response(&self) -> FarmResponse {
        FarmResponse {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            county: self.county.clone(),
            postcode: self.postcode.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            phone: self.phone.clone(),
            email: self.email.clone(),
            website: self.website.clone(),
            opening_hours: self.opening_hours.clone(),
            offerings: self.offerings.clone(),
            verified: self.verified,
            status: self.status,
            distance_km: self.distance_km.map(|d| (d * 100.0).round() / 100.0),
            updated_at: self.updated_at,
        }
    }

    pub fn is_public(&self) -> bool {
        self.status == FarmStatus::Active
    }
}

/// Detailed response DTO
/// DOCUMENTATION: Used for GET /farms/{slug}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmDetailResponse {
    #[serde(flatten)]
    pub farm: FarmResponse,
    pub categories: Vec<CategoryResponse>,
    pub photos: Vec<PhotoResponse>,
}

/// Fields needed to insert a farm
/// DOCUMENTATION: Built by the submission and import services, never
/// deserialized straight from a request
#[derive(Debug, Clone)]
pub struct NewFarm {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub county: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<Value>,
    pub offerings: Vec<String>,
    pub verified: bool,
    pub status: FarmStatus,
    pub google_place_id: Option<String>,
}

/// Request DTO for updating an existing farm
/// DOCUMENTATION: PUT /admin/farms/{id}. Only provided fields are updated.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateFarmRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,

    pub city: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub county: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub phone: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(url)]
    pub website: Option<String>,

    pub opening_hours: Option<Value>,

    pub offerings: Option<Vec<String>>,

    pub verified: Option<bool>,

    pub status: Option<FarmStatus>,
}

/// Body of POST /admin/farms/descriptions
/// DOCUMENTATION: Keys are farm ids or slugs, values the new descriptions
#[derive(Debug, Default, Deserialize)]
pub struct ApplyDescriptionsRequest {
    pub descriptions: BTreeMap<String, String>,
}

/// Outcome of a description batch
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ApplyDescriptionsReport {
    pub received: usize,
    pub updated: usize,
    /// Keys whose description was empty or too long
    pub skipped: Vec<String>,
    pub not_found: Vec<String>,
}

/// A farm waiting for a written description
#[derive(Debug, Clone, Serialize)]
pub struct DescriptionCandidate {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub county: String,
    pub website: Option<String>,
}

impl From<&Farm> for DescriptionCandidate {
    fn from(farm: &Farm) -> Self {
        Self {
            id: farm.id,
            slug: farm.slug.clone(),
            name: farm.name.clone(),
            county: farm.county.clone(),
            website: farm.website.clone(),
        }
    }
}

/// Search query parameters
/// DOCUMENTATION: Parsed from the query string of GET /farms
#[derive(Debug, Default, Deserialize)]
pub struct FarmSearchQuery {
    /// Free text matched against name and description
    pub q: Option<String>,

    pub county: Option<String>,

    /// Category slug
    pub category: Option<String>,

    /// Centre of a proximity search
    pub lat: Option<f64>,
    pub lng: Option<f64>,

    /// Search radius in kilometers (default 25 when a centre is given)
    pub radius_km: Option<f64>,

    pub verified: Option<bool>,

    /// Page number (1-based)
    pub page: Option<i64>,

    /// Results per page (max 100)
    pub limit: Option<i64>,
}

impl FarmSearchQuery {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;
    pub const DEFAULT_RADIUS_KM: f64 = 25.0;

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// 1-based page, capped so the offset always fits in an i64
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, i64::MAX / Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Whether rows remain after the current page
    pub fn has_more(&self, total_count: i64) -> bool {
        total_count > self.page().saturating_mul(self.limit())
    }

    /// Centre and radius when a proximity search was requested
    pub fn proximity(&self) -> Option<(f64, f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some((
                lat,
                lng,
                self.radius_km.unwrap_or(Self::DEFAULT_RADIUS_KM).max(0.1),
            )),
            _ => None,
        }
    }
}

/// Paginated search response
#[derive(Debug, Serialize)]
pub struct FarmSearchResponse {
    pub data: Vec<FarmResponse>,
    pub total_count: i64,
    pub page: i64,
    pub limit: i64,
    pub has_more: bool,
}

/// Query for GET /farms/map
#[derive(Debug, Default, Deserialize)]
pub struct MapQuery {
    /// "west,south,east,north" in degrees
    pub bbox: Option<String>,
}

/// Active farm count for one county
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CountyCount {
    pub county: String,
    pub farm_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_text() {
        for status in [FarmStatus::Active, FarmStatus::Pending, FarmStatus::Rejected] {
            assert_eq!(status.as_str().parse::<FarmStatus>(), Ok(status));
        }
        assert!("archived".parse::<FarmStatus>().is_err());
    }

    #[test]
    fn test_search_pagination_bounds() {
        let query = FarmSearchQuery {
            page: Some(0),
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 100);
        assert_eq!(query.offset(), 0);

        let query = FarmSearchQuery {
            page: Some(3),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(query.offset(), 20);
        assert!(query.has_more(31));
        assert!(!query.has_more(30));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let query = FarmSearchQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(query.page(), i64::MAX / FarmSearchQuery::MAX_LIMIT);
        assert!(query.offset() >= 0);
        assert!(!query.has_more(1_000));

        let query = FarmSearchQuery {
            page: Some(i64::MAX),
            limit: Some(FarmSearchQuery::MAX_LIMIT),
            ..Default::default()
        };
        assert!(query.offset() > 0);
        assert!(!query.has_more(i64::MAX));
    }

    #[test]
    fn test_proximity_requires_both_coordinates() {
        let query = FarmSearchQuery {
            lat: Some(51.5),
            ..Default::default()
        };
        assert!(query.proximity().is_none());

        let query = FarmSearchQuery {
            lat: Some(51.5),
            lng: Some(-0.1),
            ..Default::default()
        };
        assert_eq!(query.proximity(), Some((51.5, -0.1, 25.0)));
    }
}
