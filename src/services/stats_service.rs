// src/services/stats_service.rs
// DOCUMENTATION: Admin dashboard numbers
// PURPOSE: Status breakdowns of every moderated table plus description coverage

use crate::db::{ClaimRepository, FarmRepository, PhotoRepository, SubmissionRepository};
use crate::errors::FarmError;
use crate::services::coverage::DescriptionCoverage;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub farms: BTreeMap<String, i64>,
    pub photos: BTreeMap<String, i64>,
    pub submissions: BTreeMap<String, i64>,
    pub claims: BTreeMap<String, i64>,
    pub pending_submissions: i64,
    pub pending_claims: i64,
    pub description_coverage: DescriptionCoverage,
}

fn by_status(rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    rows.into_iter().collect()
}

fn pending(counts: &BTreeMap<String, i64>) -> i64 {
    counts.get("pending").copied().unwrap_or(0)
}

pub struct StatsService;

impl StatsService {
    pub async fn collect(pool: &PgPool) -> Result<AdminStats, FarmError> {
        let farms = by_status(FarmRepository::status_counts(pool).await?);
        let photos = by_status(PhotoRepository::status_counts(pool).await?);
        let submissions = by_status(SubmissionRepository::status_counts(pool).await?);
        let claims = by_status(ClaimRepository::status_counts(pool).await?);
        let (total, with_description, needs_description) =
            FarmRepository::description_counts(pool).await?;

        Ok(AdminStats {
            pending_submissions: pending(&submissions),
            pending_claims: pending(&claims),
            farms,
            photos,
            submissions,
            claims,
            description_coverage: DescriptionCoverage::new(total, with_description, needs_description),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_defaults_to_zero() {
        let counts = by_status(vec![("approved".into(), 3)]);
        assert_eq!(pending(&counts), 0);

        let counts = by_status(vec![("pending".into(), 2), ("rejected".into(), 1)]);
        assert_eq!(pending(&counts), 2);
    }
}
