// src/handlers/photos.rs
// DOCUMENTATION: Public photo upload flow
// PURPOSE: Lease, upload and finalize a visitor's farm photo

use crate::config::Config;
use crate::errors::FarmError;
use crate::models::{FinalizeUploadRequest, UploadLeaseRequest};
use crate::services::{BlobClient, EmailClient, FormRateLimiter, KvStore, PhotoService};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// POST /photos/uploads
/// Reserve an object key for one upload
pub async fn create_lease(
    pool: web::Data<PgPool>,
    kv: web::Data<Arc<KvStore>>,
    config: web::Data<Config>,
    limiter: web::Data<Arc<FormRateLimiter>>,
    http: HttpRequest,
    req: web::Json<UploadLeaseRequest>,
) -> Result<impl Responder, FarmError> {
    limiter.check_request(&http)?;

    if let Err(e) = req.validate() {
        return Err(FarmError::ValidationError(e.to_string()));
    }

    let lease =
        PhotoService::issue_lease(pool.get_ref(), kv.get_ref(), &config, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(lease))
}

/// PUT /photos/uploads/{lease_id}
/// Raw image bytes; Content-Type, when sent, must match the lease
pub async fn upload(
    kv: web::Data<Arc<KvStore>>,
    blob: web::Data<Arc<BlobClient>>,
    config: web::Data<Config>,
    path: web::Path<Uuid>,
    http: HttpRequest,
    body: web::Bytes,
) -> Result<impl Responder, FarmError> {
    let lease_id = path.into_inner();
    let content_type = http
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok());
    PhotoService::upload_object(kv.get_ref(), blob.get_ref(), &config, lease_id, content_type, body)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /photos/uploads/{lease_id}/finalize
/// Queue the uploaded photo for moderation
pub async fn finalize(
    pool: web::Data<PgPool>,
    kv: web::Data<Arc<KvStore>>,
    blob: web::Data<Arc<BlobClient>>,
    email: web::Data<Arc<EmailClient>>,
    path: web::Path<Uuid>,
    req: Option<web::Json<FinalizeUploadRequest>>,
) -> Result<impl Responder, FarmError> {
    let req = req.map(|r| r.into_inner()).unwrap_or_default();
    if let Err(e) = req.validate() {
        return Err(FarmError::ValidationError(e.to_string()));
    }

    let photo = PhotoService::finalize(
        pool.get_ref(),
        kv.get_ref(),
        blob.get_ref(),
        email.get_ref(),
        path.into_inner(),
        req,
    )
    .await?;

    Ok(HttpResponse::Created().json(photo))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/photos/uploads")
            .route("", web::post().to(create_lease))
            .route("/{lease_id}", web::put().to(upload))
            .route("/{lease_id}/finalize", web::post().to(finalize)),
    );
}
