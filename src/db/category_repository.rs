// src/db/category_repository.rs
// DOCUMENTATION: Category taxonomy queries
// PURPOSE: List categories, resolve slugs and link farms to categories

use crate::db::db_error;
use crate::errors::FarmError;
use crate::models::{Category, CategoryWithCount};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct CategoryRepository;

impl CategoryRepository {
    /// All categories with their number of active farms
    pub async fn list_with_counts(pool: &PgPool) -> Result<Vec<CategoryWithCount>, FarmError> {
        sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.id, c.slug, c.name, c.description, c.parent_id,
                   COUNT(f.id) AS farm_count
            FROM categories c
            LEFT JOIN farm_categories fc ON fc.category_id = c.id
            LEFT JOIN farms f ON f.id = fc.farm_id AND f.status = 'active'
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to list categories: {}", e);
            FarmError::DatabaseError(e.to_string())
        })
    }

    pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<Category, FarmError> {
        sqlx::query_as::<_, Category>(
            "SELECT id, slug, name, description, parent_id FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(db_error("Category lookup failed"))?
        .ok_or_else(|| FarmError::NotFound(format!("category {}", slug)))
    }

    /// Categories linked to one farm
    pub async fn for_farm(pool: &PgPool, farm_id: Uuid) -> Result<Vec<Category>, FarmError> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.slug, c.name, c.description, c.parent_id
            FROM categories c
            JOIN farm_categories fc ON fc.category_id = c.id
            WHERE fc.farm_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(farm_id)
        .fetch_all(pool)
        .await
        .map_err(db_error("Farm categories lookup failed"))
    }

    /// Link a farm to categories by slug
    /// DOCUMENTATION: Unknown slugs are ignored. Returns the number of new links.
    pub async fn link(conn: &mut PgConnection, farm_id: Uuid, slugs: &[String]) -> Result<u64, FarmError> {
        if slugs.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO farm_categories (farm_id, category_id)
            SELECT $1, id FROM categories WHERE slug = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(farm_id)
        .bind(slugs)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Linking farm categories failed"))?;

        if result.rows_affected() < slugs.len() as u64 {
            log::debug!(
                "Farm {} linked to {} of {} requested categories",
                farm_id,
                result.rows_affected(),
                slugs.len()
            );
        }

        Ok(result.rows_affected())
    }
}
