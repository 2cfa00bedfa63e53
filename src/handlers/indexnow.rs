// src/handlers/indexnow.rs
// DOCUMENTATION: IndexNow key file
// PURPOSE: Prove ownership of the site to search engines

use crate::errors::FarmError;
use crate::services::indexnow_client::KEY_FILE_PATH;
use crate::services::IndexNowClient;
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

/// GET /indexnow-key.txt
pub async fn key_file(indexnow: web::Data<Arc<IndexNowClient>>) -> Result<impl Responder, FarmError> {
    if indexnow.key().is_empty() {
        return Err(FarmError::NotFound("indexnow key".to_string()));
    }

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(indexnow.key().to_string()))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route(KEY_FILE_PATH, web::get().to(key_file));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_serves_key() {
        let mut config = test_config();
        config.indexnow_key = "abc123".into();
        let client = Arc::new(IndexNowClient::from_config(&config));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(client))
                .configure(super::config),
        )
        .await;
        let req = test::TestRequest::get().uri("/indexnow-key.txt").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"abc123"));
    }

    #[actix_web::test]
    async fn test_missing_key_is_not_found() {
        let client = Arc::new(IndexNowClient::from_config(&test_config()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(client))
                .configure(super::config),
        )
        .await;
        let req = test::TestRequest::get().uri("/indexnow-key.txt").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
