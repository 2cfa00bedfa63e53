// src/handlers/produce.rs
// DOCUMENTATION: Seasonal produce guide
// PURPOSE: What is in season across UK farms, month by month

use crate::errors::FarmError;
use crate::models::SeasonQuery;
use crate::services::ProduceService;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

/// GET /produce
pub async fn list_produce() -> impl Responder {
    HttpResponse::Ok().json(ProduceService::all())
}

/// GET /produce/in-season?month=1..12
/// Defaults to the current month
pub async fn in_season(query: web::Query<SeasonQuery>) -> Result<impl Responder, FarmError> {
    let (month, produce) = ProduceService::in_season(query.month)?;
    Ok(HttpResponse::Ok().json(json!({
        "month": month,
        "produce": produce,
    })))
}

/// GET /produce/{slug}
pub async fn get_produce(path: web::Path<String>) -> Result<impl Responder, FarmError> {
    let produce = ProduceService::get(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(produce))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/produce")
            .route("", web::get().to(list_produce))
            .route("/in-season", web::get().to(in_season))
            .route("/{slug}", web::get().to(get_produce)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_in_season_for_month() {
        let app = test::init_service(App::new().configure(config)).await;
        let req = test::TestRequest::get()
            .uri("/produce/in-season?month=7")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["month"], 7);
        let items = body["produce"].as_array().unwrap();
        assert!(!items.is_empty());
        assert!(items.iter().all(|p| p["months"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!(7))));
    }

    #[actix_web::test]
    async fn test_invalid_month_and_unknown_slug() {
        let app = test::init_service(App::new().configure(config)).await;

        let req = test::TestRequest::get()
            .uri("/produce/in-season?month=13")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/produce/durian").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
