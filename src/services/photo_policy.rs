// src/services/photo_policy.rs
// DOCUMENTATION: Rules of the photo moderation pipeline
// PURPOSE: State transitions, the per-farm cap and upload checks, kept
// free of I/O so the transactional code stays small

use crate::errors::FarmError;
use crate::models::PhotoStatus;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Approved photos shown per farm
pub const MAX_APPROVED_PHOTOS_PER_FARM: usize = 5;

/// Content types accepted for upload, with their object key extension
pub const ALLOWED_CONTENT_TYPES: [(&str, &str); 3] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

impl PhotoStatus {
    /// pending -> approved | rejected, approved -> replaced | archived.
    /// Everything else is terminal.
    pub fn can_transition_to(&self, next: PhotoStatus) -> bool {
        matches!(
            (self, next),
            (PhotoStatus::Pending, PhotoStatus::Approved)
                | (PhotoStatus::Pending, PhotoStatus::Rejected)
                | (PhotoStatus::Approved, PhotoStatus::Replaced)
                | (PhotoStatus::Approved, PhotoStatus::Archived)
        )
    }
}

/// Fail with `Conflict` unless `from -> to` is allowed
pub fn ensure_transition(photo_id: Uuid, from: PhotoStatus, to: PhotoStatus) -> Result<(), FarmError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(FarmError::Conflict(format!(
            "photo {} cannot move from {} to {}",
            photo_id, from, to
        )))
    }
}

/// An approved photo as seen by the eviction planner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApprovedSlot {
    pub id: Uuid,
    pub approved_at: DateTime<Utc>,
}

/// Photos to evict so one more approval keeps the farm within `cap`
/// DOCUMENTATION: Oldest approvals go first. `approved` may come in any
/// order; ties on approved_at are broken by id for determinism.
pub fn plan_eviction(approved: &[ApprovedSlot], cap: usize) -> Vec<Uuid> {
    let cap = cap.max(1);
    let excess = (approved.len() + 1).saturating_sub(cap);
    if excess == 0 {
        return Vec::new();
    }

    let mut ordered = approved.to_vec();
    ordered.sort_by(|a, b| a.approved_at.cmp(&b.approved_at).then(a.id.cmp(&b.id)));
    ordered.into_iter().take(excess).map(|slot| slot.id).collect()
}

/// Extension for an accepted content type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let normalized = content_type.trim().to_ascii_lowercase();
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(ct, _)| *ct == normalized)
        .map(|(_, ext)| *ext)
}

/// Check a declared upload before a lease is issued
pub fn validate_upload(content_type: &str, size_bytes: u64, max_bytes: u64) -> Result<&'static str, FarmError> {
    let ext = extension_for(content_type).ok_or_else(|| {
        FarmError::ValidationError(format!(
            "unsupported content type {}; expected one of jpeg, png, webp",
            content_type
        ))
    })?;

    if size_bytes == 0 {
        return Err(FarmError::ValidationError("empty upload".to_string()));
    }

    if size_bytes > max_bytes {
        return Err(FarmError::PayloadTooLarge(format!(
            "{} bytes exceeds the {} byte limit",
            size_bytes, max_bytes
        )));
    }

    Ok(ext)
}

/// Storage key reserved for a photo
pub fn object_key_for(farm_id: Uuid, photo_id: Uuid, ext: &str) -> String {
    format!("farm-photos/{}/{}.{}", farm_id, photo_id, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slots(n: usize) -> Vec<ApprovedSlot> {
        let base = Utc::now();
        (0..n)
            .map(|i| ApprovedSlot {
                id: Uuid::new_v4(),
                approved_at: base + Duration::minutes(i as i64),
            })
            .collect()
    }

    #[test]
    fn test_no_eviction_below_cap() {
        assert!(plan_eviction(&slots(0), MAX_APPROVED_PHOTOS_PER_FARM).is_empty());
        assert!(plan_eviction(&slots(4), MAX_APPROVED_PHOTOS_PER_FARM).is_empty());
    }

    #[test]
    fn test_evicts_oldest_at_cap() {
        let approved = slots(5);
        let evicted = plan_eviction(&approved, MAX_APPROVED_PHOTOS_PER_FARM);
        assert_eq!(evicted, vec![approved[0].id]);
    }

    #[test]
    fn test_eviction_ignores_input_order() {
        let mut approved = slots(5);
        let oldest = approved[0].id;
        approved.reverse();
        assert_eq!(plan_eviction(&approved, 5), vec![oldest]);
    }

    #[test]
    fn test_over_cap_evicts_down_to_cap() {
        // A farm left over the cap (e.g. by a lowered limit) is trimmed
        let approved = slots(7);
        let evicted = plan_eviction(&approved, 5);
        assert_eq!(evicted, vec![approved[0].id, approved[1].id, approved[2].id]);
        assert_eq!(approved.len() + 1 - evicted.len(), 5);
    }

    #[test]
    fn test_transitions() {
        use PhotoStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Replaced));
        assert!(Approved.can_transition_to(Archived));

        assert!(!Pending.can_transition_to(Archived));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Replaced.can_transition_to(Approved));
        assert!(!Archived.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Approved));

        assert!(matches!(
            ensure_transition(Uuid::nil(), Rejected, Approved),
            Err(FarmError::Conflict(_))
        ));
    }

    #[test]
    fn test_validate_upload() {
        assert_eq!(validate_upload("image/JPEG", 1000, 5000).unwrap(), "jpg");
        assert_eq!(validate_upload("image/webp", 5000, 5000).unwrap(), "webp");
        assert!(matches!(
            validate_upload("image/gif", 10, 5000),
            Err(FarmError::ValidationError(_))
        ));
        assert!(matches!(
            validate_upload("image/png", 5001, 5000),
            Err(FarmError::PayloadTooLarge(_))
        ));
        assert!(validate_upload("image/png", 0, 5000).is_err());
    }

    #[test]
    fn test_object_key() {
        let farm = Uuid::nil();
        let photo = Uuid::nil();
        assert_eq!(
            object_key_for(farm, photo, "png"),
            format!("farm-photos/{}/{}.png", farm, photo)
        );
    }
}
