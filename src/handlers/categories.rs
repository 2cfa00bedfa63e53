// src/handlers/categories.rs
// DOCUMENTATION: Taxonomy and county listings
// PURPOSE: Browse the directory by category or county

use crate::errors::FarmError;
use crate::models::FarmSearchQuery;
use crate::services::FarmService;
use actix_web::{web, HttpResponse, Responder};
use sqlx::PgPool;

/// GET /categories
/// All categories with active farm counts
pub async fn list_categories(pool: web::Data<PgPool>) -> Result<impl Responder, FarmError> {
    let categories = FarmService::categories(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(categories))
}

/// GET /categories/{slug}/farms
/// Paginated like GET /farms
pub async fn category_farms(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
    query: web::Query<FarmSearchQuery>,
) -> Result<impl Responder, FarmError> {
    let (category, farms) =
        FarmService::farms_in_category(pool.get_ref(), &path.into_inner(), query.into_inner())
            .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "category": category,
        "farms": farms,
    })))
}

/// GET /counties
pub async fn list_counties(pool: web::Data<PgPool>) -> Result<impl Responder, FarmError> {
    let counties = FarmService::counties(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(counties))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/counties", web::get().to(list_counties))
        .service(
            web::scope("/categories")
                .route("", web::get().to(list_categories))
                .route("/{slug}/farms", web::get().to(category_farms)),
        );
}
