// src/db/mod.rs
// DOCUMENTATION: Database module organization
// PURPOSE: Re-export repositories and shared error mapping

use crate::errors::FarmError;

pub mod category_repository;
pub mod claim_repository;
pub mod farm_repository;
pub mod photo_repository;
pub mod submission_repository;

pub use category_repository::*;
pub use claim_repository::*;
pub use farm_repository::*;
pub use photo_repository::*;
pub use submission_repository::*;

/// Postgres deadlock_detected and serialization_failure
const LOCK_CONFLICT_CODES: [&str; 2] = ["40P01", "40001"];

fn is_lock_conflict(code: Option<&str>) -> bool {
    code.map_or(false, |c| LOCK_CONFLICT_CODES.contains(&c))
}

/// Log a sqlx error and map it to `FarmError::DatabaseError`
/// DOCUMENTATION: Transactions aborted by a lock conflict map to `Conflict`
/// so the caller can retry
pub fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> FarmError {
    move |e| {
        let code = match &e {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };
        if is_lock_conflict(code.as_deref()) {
            log::warn!("{}: {}", context, e);
            return FarmError::Conflict(format!("{}: concurrent update, retry", context));
        }
        log::error!("{}: {}", context, e);
        FarmError::DatabaseError(format!("{}: {}", context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_conflicts_map_to_conflict() {
        assert!(is_lock_conflict(Some("40P01")));
        assert!(is_lock_conflict(Some("40001")));
        assert!(!is_lock_conflict(Some("23505")));
        assert!(!is_lock_conflict(None));

        match db_error("Claim review failed")(sqlx::Error::RowNotFound) {
            FarmError::DatabaseError(msg) => assert!(msg.starts_with("Claim review failed")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
