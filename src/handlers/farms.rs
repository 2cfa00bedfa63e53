// src/handlers/farms.rs
// DOCUMENTATION: HTTP handlers for the farm directory
// PURPOSE: Parse requests, call services, return responses

use crate::errors::FarmError;
use crate::models::{CreateClaimRequest, FarmSearchQuery, MapQuery};
use crate::services::{
    ClaimService, EmailClient, FarmService, FormRateLimiter, KvStore, PhotoService,
};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use sqlx::PgPool;
use std::sync::Arc;
use validator::Validate;

/// GET /farms
/// Search active farms (text, county, category, radius, verified)
pub async fn search_farms(
    pool: web::Data<PgPool>,
    query: web::Query<FarmSearchQuery>,
) -> Result<impl Responder, FarmError> {
    let result = FarmService::search(pool.get_ref(), query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /farms/map
/// GeoJSON FeatureCollection for the interactive map
pub async fn farm_map(
    pool: web::Data<PgPool>,
    query: web::Query<MapQuery>,
) -> Result<impl Responder, FarmError> {
    let collection = FarmService::map(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/geo+json")
        .json(collection))
}

/// GET /farms/{slug}
/// Farm page with categories and approved photos
pub async fn get_farm(
    pool: web::Data<PgPool>,
    kv: web::Data<Arc<KvStore>>,
    path: web::Path<String>,
) -> Result<impl Responder, FarmError> {
    let slug = path.into_inner();
    let farm = FarmService::get_detail(pool.get_ref(), kv.get_ref(), &slug).await?;
    Ok(HttpResponse::Ok().json(farm))
}

/// GET /farms/{slug}/photos
pub async fn farm_photos(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
) -> Result<impl Responder, FarmError> {
    let photos = PhotoService::list_for_farm(pool.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(photos))
}

/// POST /farms/{slug}/claims
/// Claim ownership of a listing
pub async fn create_claim(
    pool: web::Data<PgPool>,
    email: web::Data<Arc<EmailClient>>,
    limiter: web::Data<Arc<FormRateLimiter>>,
    http: HttpRequest,
    path: web::Path<String>,
    req: web::Json<CreateClaimRequest>,
) -> Result<impl Responder, FarmError> {
    limiter.check_request(&http)?;

    if let Err(e) = req.validate() {
        return Err(FarmError::ValidationError(e.to_string()));
    }

    let claim = ClaimService::create(
        pool.get_ref(),
        email.get_ref(),
        &path.into_inner(),
        req.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "claim_id": claim.id,
        "status": claim.status,
    })))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/farms")
            .route("", web::get().to(search_farms))
            .route("/map", web::get().to(farm_map))
            .route("/{slug}", web::get().to(get_farm))
            .route("/{slug}/photos", web::get().to(farm_photos))
            .route("/{slug}/claims", web::post().to(create_claim)),
    );
}
