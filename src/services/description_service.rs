// src/services/description_service.rs
// DOCUMENTATION: Written descriptions for farm pages
// PURPOSE: List farms still missing a description and apply batches of
// descriptions produced offline

use crate::db::FarmRepository;
use crate::errors::FarmError;
use crate::models::{ApplyDescriptionsReport, ApplyDescriptionsRequest, DescriptionCandidate};
use crate::services::coverage::needs_description;
use crate::services::farm_service::{farm_path, invalidate_farm};
use crate::services::{IndexNowClient, KvStore};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Same ceiling as the admin farm edit
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Trimmed description, or `None` when it cannot be stored
fn clean_description(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_DESCRIPTION_CHARS {
        None
    } else {
        Some(trimmed)
    }
}

pub struct DescriptionService;

impl DescriptionService {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    /// Active farms a writer should describe next
    pub async fn candidates(pool: &PgPool, limit: Option<i64>) -> Result<Vec<DescriptionCandidate>, FarmError> {
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT);
        let farms = FarmRepository::list_needing_description(pool, limit).await?;

        Ok(farms
            .iter()
            .filter(|f| needs_description(f.website.as_deref(), f.description.as_deref()))
            .map(DescriptionCandidate::from)
            .collect())
    }

    /// Store a batch of descriptions keyed by farm id or slug
    /// DOCUMENTATION: Cached pages of updated farms are dropped and public
    /// ones are sent to IndexNow in one call
    pub async fn apply(
        pool: &PgPool,
        kv: &KvStore,
        indexnow: &Arc<IndexNowClient>,
        req: ApplyDescriptionsRequest,
    ) -> Result<ApplyDescriptionsReport, FarmError> {
        let mut report = ApplyDescriptionsReport {
            received: req.descriptions.len(),
            ..Default::default()
        };
        let mut changed = Vec::new();

        for (key, raw) in &req.descriptions {
            let Some(description) = clean_description(raw) else {
                report.skipped.push(key.clone());
                continue;
            };

            let key = key.trim();
            let id = Uuid::parse_str(key).ok();
            match FarmRepository::set_description(pool, id, key, description).await? {
                Some(farm) => {
                    report.updated += 1;
                    invalidate_farm(kv, &farm.slug).await;
                    if farm.is_public() {
                        changed.push(farm_path(&farm.slug));
                    }
                }
                None => report.not_found.push(key.to_string()),
            }
        }

        indexnow.notify_in_background(changed);

        log::info!(
            "Applied {} of {} descriptions ({} skipped, {} not found)",
            report.updated,
            report.received,
            report.skipped.len(),
            report.not_found.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_description() {
        assert_eq!(clean_description("  Family farm shop.  "), Some("Family farm shop."));
        assert_eq!(clean_description("   "), None);

        let long = "a".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert_eq!(clean_description(&long), None);
        let max = "é".repeat(MAX_DESCRIPTION_CHARS);
        assert!(clean_description(&max).is_some());
    }

    #[test]
    fn test_request_shape() {
        let req: ApplyDescriptionsRequest = serde_json::from_str(
            r#"{"descriptions": {"hollow-farm-ludlow": "Eggs and veg", "8f0e7a52-3c39-4c5e-9a4f-1d2b3c4d5e6f": "Pick your own"}}"#,
        )
        .unwrap();
        assert_eq!(req.descriptions.len(), 2);
        assert!(req
            .descriptions
            .keys()
            .any(|k| Uuid::parse_str(k).is_ok()));
    }
}
