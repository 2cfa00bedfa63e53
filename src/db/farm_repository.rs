// src/db/farm_repository.rs
// DOCUMENTATION: Farm database operations
// PURPOSE: Queries behind the directory, the map, submissions and imports

use crate::db::db_error;
use crate::errors::FarmError;
use crate::models::{
    CountyCount, Farm, FarmRow, FarmSearchQuery, FarmStatus, NewFarm, UpdateFarmRequest,
};
use crate::services::geo::EARTH_RADIUS_KM;
use crate::services::slug::{normalize_name, pick_free_slug};
use geo_types::Rect;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

/// Column list shared by every farm query (table alias `f`)
pub const FARM_COLUMNS: &str = r#"
    f.id, f.slug, f.name, f.description, f.address, f.city, f.county,
    f.postcode, f.latitude, f.longitude, f.phone, f.email, f.website,
    f.opening_hours, f.offerings, f.verified, f.status, f.owner_email,
    f.google_place_id, f.created_at, f.updated_at
"#;

/// Farm row plus whether an upsert inserted it
#[derive(Debug, FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    farm: FarmRow,
    inserted: bool,
}

/// Escape LIKE wildcards in user input
fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Great-circle distance from a bound point to the row, in km
fn push_distance(qb: &mut QueryBuilder<'_, Postgres>, lat: f64, lng: f64) {
    qb.push("(")
        .push(EARTH_RADIUS_KM)
        .push(" * 2.0 * ASIN(SQRT(POWER(SIN(RADIANS(f.latitude - ")
        .push_bind(lat)
        .push(") / 2.0), 2) + COS(RADIANS(")
        .push_bind(lat)
        .push(")) * COS(RADIANS(f.latitude)) * POWER(SIN(RADIANS(f.longitude - ")
        .push_bind(lng)
        .push(") / 2.0), 2))))");
}

/// WHERE clause of a directory search
fn push_search_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &FarmSearchQuery) {
    qb.push(" WHERE f.status = ").push_bind(FarmStatus::Active.as_str());

    if let Some(q) = query.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = like_pattern(q);
        qb.push(" AND (f.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR f.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(county) = query.county.as_deref().filter(|c| !c.trim().is_empty()) {
        qb.push(" AND lower(f.county) = lower(")
            .push_bind(county.trim().to_string())
            .push(")");
    }

    if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        qb.push(
            " AND EXISTS (SELECT 1 FROM farm_categories fc \
             JOIN categories c ON c.id = fc.category_id \
             WHERE fc.farm_id = f.id AND c.slug = ",
        )
        .push_bind(category.trim().to_string())
        .push(")");
    }

    if let Some(verified) = query.verified {
        qb.push(" AND f.verified = ").push_bind(verified);
    }

    if let Some((lat, lng, radius_km)) = query.proximity() {
        // Cheap bounding box first so the index on (latitude, longitude) helps
        let dlat = radius_km / 111.0;
        let dlng = radius_km / (111.0 * lat.to_radians().cos().abs().max(0.01));
        qb.push(" AND f.latitude BETWEEN ")
            .push_bind(lat - dlat)
            .push(" AND ")
            .push_bind(lat + dlat)
            .push(" AND f.longitude BETWEEN ")
            .push_bind(lng - dlng)
            .push(" AND ")
            .push_bind(lng + dlng)
            .push(" AND ");
        push_distance(qb, lat, lng);
        qb.push(" <= ").push_bind(radius_km);
    }
}

pub struct FarmRepository;

impl FarmRepository {
    /// Get farm by id, any status
    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Farm, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            "SELECT {} FROM farms f WHERE f.id = $1",
            FARM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to fetch farm {}: {}", id, e);
            FarmError::DatabaseError(e.to_string())
        })?
        .ok_or_else(|| FarmError::NotFound(format!("farm {}", id)))?;

        Ok(row.into_farm())
    }

    /// Get farm by slug, any status
    pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<Farm, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            "SELECT {} FROM farms f WHERE f.slug = $1",
            FARM_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to fetch farm {}: {}", slug, e);
            FarmError::DatabaseError(e.to_string())
        })?
        .ok_or_else(|| FarmError::NotFound(format!("farm {}", slug)))?;

        Ok(row.into_farm())
    }

    /// Existing farm imported from the given Google place
    pub async fn get_by_place_id(pool: &PgPool, place_id: &str) -> Result<Option<Farm>, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            "SELECT {} FROM farms f WHERE f.google_place_id = $1",
            FARM_COLUMNS
        ))
        .bind(place_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("Place id lookup failed"))?;

        Ok(row.map(FarmRow::into_farm))
    }

    /// Get an active farm by slug; pending and rejected farms are hidden
    pub async fn get_public_by_slug(pool: &PgPool, slug: &str) -> Result<Farm, FarmError> {
        let farm = Self::get_by_slug(pool, slug).await?;
        if farm.is_public() {
            Ok(farm)
        } else {
            Err(FarmError::NotFound(format!("farm {}", slug)))
        }
    }

    /// Lowest free slug for `base` (base, base-2, base-3...)
    pub async fn next_free_slug(conn: &mut PgConnection, base: &str) -> Result<String, FarmError> {
        let taken: Vec<(String,)> =
            sqlx::query_as("SELECT slug FROM farms WHERE slug = $1 OR slug LIKE $2")
                .bind(base)
                .bind(format!("{}-%", base))
                .fetch_all(&mut *conn)
                .await
                .map_err(db_error("Slug lookup failed"))?;

        let taken: HashSet<String> = taken.into_iter().map(|(s,)| s).collect();
        Ok(pick_free_slug(base, &taken))
    }

    /// Non-rejected farm with the same normalized name and postcode
    pub async fn find_duplicate(
        conn: &mut PgConnection,
        name: &str,
        postcode: &str,
    ) -> Result<Option<Farm>, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            "SELECT {} FROM farms f
             WHERE f.name_key = $1 AND f.postcode = $2 AND f.status <> 'rejected'
             LIMIT 1",
            FARM_COLUMNS
        ))
        .bind(normalize_name(name))
        .bind(postcode)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Duplicate lookup failed"))?;

        Ok(row.map(FarmRow::into_farm))
    }

    /// Insert a farm inside the caller's transaction
    pub async fn insert(conn: &mut PgConnection, farm: &NewFarm) -> Result<Farm, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            r#"
            INSERT INTO farms AS f (
                slug, name, name_key, description, address, city, county, postcode,
                latitude, longitude, phone, email, website, opening_hours,
                offerings, verified, status, google_place_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {}
            "#,
            FARM_COLUMNS
        ))
        .bind(&farm.slug)
        .bind(&farm.name)
        .bind(normalize_name(&farm.name))
        .bind(&farm.description)
        .bind(&farm.address)
        .bind(&farm.city)
        .bind(&farm.county)
        .bind(&farm.postcode)
        .bind(farm.latitude)
        .bind(farm.longitude)
        .bind(&farm.phone)
        .bind(&farm.email)
        .bind(&farm.website)
        .bind(&farm.opening_hours)
        .bind(&farm.offerings)
        .bind(farm.verified)
        .bind(farm.status.as_str())
        .bind(&farm.google_place_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                FarmError::AlreadyExists(format!("farm {}", farm.slug))
            }
            e => {
                log::error!("Failed to insert farm {}: {}", farm.slug, e);
                FarmError::DatabaseError(format!("Insert farm failed: {}", e))
            }
        })?;

        Ok(row.into_farm())
    }

    /// Create or refresh a farm from the import pipeline
    /// DOCUMENTATION: Matches on google_place_id when present, otherwise on
    /// slug. Moderation state (status, verified, owner) is never downgraded.
    /// Returns (farm, created).
    pub async fn upsert_import(pool: &PgPool, farm: &NewFarm) -> Result<(Farm, bool), FarmError> {
        let conflict_target = if farm.google_place_id.is_some() {
            "google_place_id"
        } else {
            "slug"
        };

        let sql = format!(
            r#"
            INSERT INTO farms AS f (
                slug, name, name_key, description, address, city, county, postcode,
                latitude, longitude, phone, email, website, opening_hours,
                offerings, verified, status, google_place_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT ({}) DO UPDATE SET
                name = EXCLUDED.name,
                name_key = EXCLUDED.name_key,
                description = COALESCE(EXCLUDED.description, f.description),
                address = EXCLUDED.address,
                city = COALESCE(EXCLUDED.city, f.city),
                county = EXCLUDED.county,
                postcode = EXCLUDED.postcode,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                phone = COALESCE(EXCLUDED.phone, f.phone),
                email = COALESCE(EXCLUDED.email, f.email),
                website = COALESCE(EXCLUDED.website, f.website),
                opening_hours = COALESCE(EXCLUDED.opening_hours, f.opening_hours),
                offerings = CASE WHEN cardinality(EXCLUDED.offerings) > 0
                                 THEN EXCLUDED.offerings ELSE f.offerings END,
                verified = f.verified OR EXCLUDED.verified,
                updated_at = NOW()
            RETURNING {}, (xmax = 0) AS inserted
            "#,
            conflict_target, FARM_COLUMNS
        );

        let row = sqlx::query_as::<_, UpsertRow>(&sql)
            .bind(&farm.slug)
            .bind(&farm.name)
            .bind(normalize_name(&farm.name))
            .bind(&farm.description)
            .bind(&farm.address)
            .bind(&farm.city)
            .bind(&farm.county)
            .bind(&farm.postcode)
            .bind(farm.latitude)
            .bind(farm.longitude)
            .bind(&farm.phone)
            .bind(&farm.email)
            .bind(&farm.website)
            .bind(&farm.opening_hours)
            .bind(&farm.offerings)
            .bind(farm.verified)
            .bind(farm.status.as_str())
            .bind(&farm.google_place_id)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                log::error!("Failed to upsert farm {}: {}", farm.slug, e);
                FarmError::DatabaseError(format!("Upsert farm failed: {}", e))
            })?;

        Ok((row.farm.into_farm(), row.inserted))
    }

    /// Search active farms with filters
    /// DOCUMENTATION: Used for GET /farms. Returns (results, total_count).
    /// Proximity searches are ordered by distance, others by name.
    pub async fn search(pool: &PgPool, query: &FarmSearchQuery) -> Result<(Vec<Farm>, i64), FarmError> {
        let limit = query.limit();
        let offset = query.offset();

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM farms f");
        push_search_filters(&mut count_qb, query);
        let (total,): (i64,) = count_qb
            .build_query_as()
            .fetch_one(pool)
            .await
            .map_err(|e| {
                log::error!("Count query error: {}", e);
                FarmError::DatabaseError(e.to_string())
            })?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(FARM_COLUMNS).push(", ");
        match query.proximity() {
            Some((lat, lng, _)) => {
                push_distance(&mut qb, lat, lng);
            }
            None => {
                qb.push("NULL::float8");
            }
        }
        qb.push(" AS distance_km FROM farms f");
        push_search_filters(&mut qb, query);

        if query.proximity().is_some() {
            qb.push(" ORDER BY distance_km ASC, f.name ASC");
        } else {
            qb.push(" ORDER BY f.name ASC");
        }
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);

        let rows: Vec<FarmRow> = qb.build_query_as().fetch_all(pool).await.map_err(|e| {
            log::error!("Search query error: {}", e);
            FarmError::DatabaseError(e.to_string())
        })?;

        let farms: Vec<Farm> = rows.into_iter().map(FarmRow::into_farm).collect();

        log::info!(
            "Search completed: {} results, {} total (page {})",
            farms.len(),
            total,
            query.page()
        );

        Ok((farms, total))
    }

    /// Active farms for the map, optionally inside a bounding box
    pub async fn list_for_map(pool: &PgPool, bbox: Option<Rect<f64>>) -> Result<Vec<Farm>, FarmError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(FARM_COLUMNS)
            .push(" FROM farms f WHERE f.status = ")
            .push_bind(FarmStatus::Active.as_str());

        if let Some(rect) = bbox {
            qb.push(" AND f.longitude BETWEEN ")
                .push_bind(rect.min().x)
                .push(" AND ")
                .push_bind(rect.max().x)
                .push(" AND f.latitude BETWEEN ")
                .push_bind(rect.min().y)
                .push(" AND ")
                .push_bind(rect.max().y);
        }
        qb.push(" ORDER BY f.name");

        let rows: Vec<FarmRow> = qb.build_query_as().fetch_all(pool).await.map_err(|e| {
            log::error!("Map query error: {}", e);
            FarmError::DatabaseError(e.to_string())
        })?;

        Ok(rows.into_iter().map(FarmRow::into_farm).collect())
    }

    /// Partial update
    /// DOCUMENTATION: Only provided fields are modified
    pub async fn update(pool: &PgPool, id: Uuid, req: &UpdateFarmRequest) -> Result<Farm, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            r#"
            UPDATE farms AS f SET
                name = COALESCE($2, f.name),
                name_key = COALESCE($3, f.name_key),
                description = COALESCE($4, f.description),
                address = COALESCE($5, f.address),
                city = COALESCE($6, f.city),
                county = COALESCE($7, f.county),
                phone = COALESCE($8, f.phone),
                email = COALESCE($9, f.email),
                website = COALESCE($10, f.website),
                opening_hours = COALESCE($11, f.opening_hours),
                offerings = COALESCE($12, f.offerings),
                verified = COALESCE($13, f.verified),
                status = COALESCE($14, f.status),
                updated_at = NOW()
            WHERE f.id = $1
            RETURNING {}
            "#,
            FARM_COLUMNS
        ))
        .bind(id)
        .bind(&req.name)
        .bind(req.name.as_deref().map(normalize_name))
        .bind(&req.description)
        .bind(&req.address)
        .bind(&req.city)
        .bind(&req.county)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.website)
        .bind(&req.opening_hours)
        .bind(&req.offerings)
        .bind(req.verified)
        .bind(req.status.map(|s| s.as_str()))
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to update farm {}: {}", id, e);
            FarmError::DatabaseError(format!("Update farm failed: {}", e))
        })?
        .ok_or_else(|| FarmError::NotFound(format!("farm {}", id)))?;

        Ok(row.into_farm())
    }

    /// Set lifecycle status inside the caller's transaction
    pub async fn set_status(conn: &mut PgConnection, id: Uuid, status: FarmStatus) -> Result<Farm, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            "UPDATE farms AS f SET status = $2, updated_at = NOW() WHERE f.id = $1 RETURNING {}",
            FARM_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Update farm status failed"))?
        .ok_or_else(|| FarmError::NotFound(format!("farm {}", id)))?;

        Ok(row.into_farm())
    }

    /// Record the approved owner and mark the listing verified
    pub async fn set_owner(conn: &mut PgConnection, id: Uuid, owner_email: &str) -> Result<Farm, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            "UPDATE farms AS f SET owner_email = $2, verified = TRUE, updated_at = NOW()
             WHERE f.id = $1 RETURNING {}",
            FARM_COLUMNS
        ))
        .bind(id)
        .bind(owner_email)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Update farm owner failed"))?
        .ok_or_else(|| FarmError::NotFound(format!("farm {}", id)))?;

        Ok(row.into_farm())
    }

    /// Active farm counts per county
    pub async fn county_counts(pool: &PgPool) -> Result<Vec<CountyCount>, FarmError> {
        sqlx::query_as::<_, CountyCount>(
            r#"
            SELECT county, COUNT(*) AS farm_count
            FROM farms
            WHERE status = 'active'
            GROUP BY county
            ORDER BY county
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(|e| {
            log::error!("County count query error: {}", e);
            FarmError::DatabaseError(e.to_string())
        })
    }

    /// Active farms with no description and a usable website, by name
    /// DOCUMENTATION: Same filter as `description_counts`
    pub async fn list_needing_description(pool: &PgPool, limit: i64) -> Result<Vec<Farm>, FarmError> {
        let rows = sqlx::query_as::<_, FarmRow>(&format!(
            r#"
            SELECT {} FROM farms f
            WHERE f.status = 'active'
              AND (f.description IS NULL OR btrim(f.description) = '')
              AND f.website IS NOT NULL AND btrim(f.website) <> ''
              AND f.website !~* '(facebook|instagram|twitter)'
            ORDER BY f.name
            LIMIT $1
            "#,
            FARM_COLUMNS
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(db_error("Needs-description query failed"))?;

        Ok(rows.into_iter().map(FarmRow::into_farm).collect())
    }

    /// Replace the description of the farm with this id or slug
    pub async fn set_description(
        pool: &PgPool,
        id: Option<Uuid>,
        slug: &str,
        description: &str,
    ) -> Result<Option<Farm>, FarmError> {
        let row = sqlx::query_as::<_, FarmRow>(&format!(
            r#"
            UPDATE farms AS f SET description = $3, updated_at = NOW()
            WHERE f.id = $1 OR f.slug = $2
            RETURNING {}
            "#,
            FARM_COLUMNS
        ))
        .bind(id)
        .bind(slug)
        .bind(description)
        .fetch_optional(pool)
        .await
        .map_err(db_error("Update farm description failed"))?;

        Ok(row.map(FarmRow::into_farm))
    }

    /// Farm counts per status
    pub async fn status_counts(pool: &PgPool) -> Result<Vec<(String, i64)>, FarmError> {
        sqlx::query_as("SELECT status, COUNT(*) FROM farms GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await
            .map_err(db_error("Farm status counts failed"))
    }

    /// (total, with_description, needs_description) over active farms
    /// DOCUMENTATION: Mirrors services::coverage::needs_description
    pub async fn description_counts(pool: &PgPool) -> Result<(i64, i64, i64), FarmError> {
        sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE description IS NOT NULL AND btrim(description) <> ''),
                COUNT(*) FILTER (
                    WHERE (description IS NULL OR btrim(description) = '')
                      AND website IS NOT NULL AND btrim(website) <> ''
                      AND website !~* '(facebook|instagram|twitter)'
                )
            FROM farms
            WHERE status = 'active'
            "#,
        )
        .fetch_one(pool)
        .await
        .map_err(db_error("Description coverage query failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" eggs "), "%eggs%");
        assert_eq!(like_pattern("100%_organic"), "%100\\%\\_organic%");
    }

    #[test]
    fn test_search_sql_binds_user_input() {
        let query = FarmSearchQuery {
            q: Some("O'Brien's".into()),
            county: Some("Kent".into()),
            category: Some("pick-your-own".into()),
            lat: Some(51.2),
            lng: Some(0.9),
            ..Default::default()
        };

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM farms f");
        push_search_filters(&mut qb, &query);
        let sql = qb.sql();

        assert!(!sql.contains("O'Brien"));
        assert!(!sql.contains("Kent"));
        assert!(sql.contains("f.name ILIKE $2"));
        assert!(sql.contains("c.slug = $5"));
        assert!(sql.contains("ASIN(SQRT("));
    }
}
