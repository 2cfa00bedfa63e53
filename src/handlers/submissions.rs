// src/handlers/submissions.rs
// DOCUMENTATION: Public farm submission form
// PURPOSE: Accept proposals for new farm shop listings

use crate::errors::FarmError;
use crate::models::CreateSubmissionRequest;
use crate::services::{EmailClient, FormRateLimiter, PostcodeClient, SubmissionService};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use sqlx::PgPool;
use std::sync::Arc;
use validator::Validate;

/// POST /submissions
pub async fn create_submission(
    pool: web::Data<PgPool>,
    postcodes: web::Data<Arc<PostcodeClient>>,
    email: web::Data<Arc<EmailClient>>,
    limiter: web::Data<Arc<FormRateLimiter>>,
    http: HttpRequest,
    req: web::Json<CreateSubmissionRequest>,
) -> Result<impl Responder, FarmError> {
    limiter.check_request(&http)?;

    if let Err(e) = req.validate() {
        return Err(FarmError::ValidationError(e.to_string()));
    }

    let receipt = SubmissionService::submit(
        pool.get_ref(),
        postcodes.get_ref(),
        email.get_ref(),
        req.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Created().json(receipt))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/submissions", web::post().to(create_submission));
}
