// src/services/farm_service.rs
// DOCUMENTATION: Business logic for the farm directory
// PURPOSE: Intermediary between handlers and repositories, owns caching of
// farm pages and the change notifications that follow edits

use crate::db::{CategoryRepository, FarmRepository, PhotoRepository};
use crate::errors::FarmError;
use crate::models::{
    CategoryResponse, CategoryWithCount, CountyCount, FarmDetailResponse, FarmResponse,
    FarmSearchQuery, FarmSearchResponse, MapQuery, UpdateFarmRequest,
};
use crate::services::geo::{farms_to_feature_collection, parse_bbox};
use crate::services::{IndexNowClient, KvStore};
use geojson::FeatureCollection;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Public path of a farm page
pub fn farm_path(slug: &str) -> String {
    format!("/shop/{}", slug)
}

/// Drop the cached detail page of a farm
pub async fn invalidate_farm(kv: &KvStore, slug: &str) {
    kv.bump_generation(&KvStore::farm_generation_key(slug)).await;
    if kv.remove(&KvStore::farm_key(slug)).await {
        log::debug!("Invalidated cached farm {}", slug);
    }
}

pub struct FarmService;

impl FarmService {
    /// Farm page: farm, categories and approved photos
    /// DOCUMENTATION: Served from the key-value store when cached. Only
    /// active farms are visible.
    pub async fn get_detail(pool: &PgPool, kv: &KvStore, slug: &str) -> Result<FarmDetailResponse, FarmError> {
        let key = KvStore::farm_key(slug);
        if let Some(cached) = kv.get_json::<FarmDetailResponse>(&key).await {
            return Ok(cached);
        }

        let gen_key = KvStore::farm_generation_key(slug);
        let generation = kv.generation(&gen_key).await;

        let farm = FarmRepository::get_public_by_slug(pool, slug).await?;
        let categories = CategoryRepository::for_farm(pool, farm.id).await?;
        let photos = PhotoRepository::list_approved_for_farm(pool, farm.id).await?;

        let detail = FarmDetailResponse {
            farm: farm.to_response(),
            categories: categories.iter().map(|c| c.to_response()).collect(),
            photos: photos.iter().map(|p| p.to_response()).collect(),
        };

        match kv.set_json_if_generation(key, &detail, &gen_key, generation).await {
            Ok(true) => {}
            Ok(false) => log::debug!("Farm {} changed while loading, not cached", slug),
            Err(e) => log::warn!("Could not cache farm {}: {}", slug, e),
        }

        Ok(detail)
    }

    /// Search active farms
    pub async fn search(pool: &PgPool, query: FarmSearchQuery) -> Result<FarmSearchResponse, FarmError> {
        if let Some((lat, lng, _)) = query.proximity() {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(FarmError::InvalidInput(format!(
                    "invalid coordinates {},{}",
                    lat, lng
                )));
            }
        }

        let (farms, total_count) = FarmRepository::search(pool, &query).await?;

        let limit = query.limit();
        let page = query.page();

        Ok(FarmSearchResponse {
            data: farms.iter().map(|f| f.to_response()).collect(),
            total_count,
            page,
            limit,
            has_more: query.has_more(total_count),
        })
    }

    /// GeoJSON of active farms for the map
    pub async fn map(pool: &PgPool, query: &MapQuery) -> Result<FeatureCollection, FarmError> {
        let bbox = match query.bbox.as_deref().filter(|b| !b.trim().is_empty()) {
            Some(raw) => Some(parse_bbox(raw)?),
            None => None,
        };

        let farms = FarmRepository::list_for_map(pool, bbox).await?;
        log::debug!("Map request returned {} farms", farms.len());
        Ok(farms_to_feature_collection(&farms))
    }

    pub async fn counties(pool: &PgPool) -> Result<Vec<CountyCount>, FarmError> {
        FarmRepository::county_counts(pool).await
    }

    pub async fn categories(pool: &PgPool) -> Result<Vec<CategoryWithCount>, FarmError> {
        CategoryRepository::list_with_counts(pool).await
    }

    /// Active farms in one category, paginated like search
    pub async fn farms_in_category(
        pool: &PgPool,
        slug: &str,
        mut query: FarmSearchQuery,
    ) -> Result<(CategoryResponse, FarmSearchResponse), FarmError> {
        let category = CategoryRepository::get_by_slug(pool, slug).await?;
        query.category = Some(category.slug.clone());
        let farms = Self::search(pool, query).await?;
        Ok((category.to_response(), farms))
    }

    /// Admin edit of a farm
    /// DOCUMENTATION: Clears the cached page under both the old and new
    /// slug and notifies IndexNow when the farm is public
    pub async fn update(
        pool: &PgPool,
        kv: &KvStore,
        indexnow: &Arc<IndexNowClient>,
        id: Uuid,
        req: UpdateFarmRequest,
    ) -> Result<FarmResponse, FarmError> {
        let before = FarmRepository::get_by_id(pool, id).await?;
        let farm = FarmRepository::update(pool, id, &req).await?;

        invalidate_farm(kv, &before.slug).await;
        if before.slug != farm.slug {
            invalidate_farm(kv, &farm.slug).await;
        }

        if farm.is_public() || before.is_public() {
            indexnow.notify_in_background(vec![farm_path(&farm.slug)]);
        }

        log::info!("Updated farm {} ({})", farm.slug, farm.id);
        Ok(farm.to_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farm_path() {
        assert_eq!(farm_path("hollow-farm-ludlow"), "/shop/hollow-farm-ludlow");
    }

    #[tokio::test]
    async fn test_invalidate_farm_only_touches_that_farm() {
        let kv = KvStore::new(60);
        kv.set(KvStore::farm_key("a"), "{}".into()).await;
        kv.set(KvStore::farm_key("b"), "{}".into()).await;

        invalidate_farm(&kv, "a").await;

        assert!(kv.get(&KvStore::farm_key("a")).await.is_none());
        assert!(kv.get(&KvStore::farm_key("b")).await.is_some());
        assert_eq!(kv.generation(&KvStore::farm_generation_key("a")).await, 1);
        assert_eq!(kv.generation(&KvStore::farm_generation_key("b")).await, 0);
    }
}
