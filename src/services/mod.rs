// src/services/mod.rs
// DOCUMENTATION: Services module organization
// PURPOSE: Re-export service components

pub mod blob_client;
pub mod claim_service;
pub mod coverage;
pub mod description_service;
pub mod email_client;
pub mod farm_service;
pub mod geo;
pub mod import_service;
pub mod indexnow_client;
pub mod kv_store;
pub mod photo_policy;
pub mod photo_service;
pub mod postcode_client;
pub mod produce_service;
pub mod rate_limit;
pub mod retry;
pub mod slug;
pub mod stats_service;
pub mod submission_service;

pub use blob_client::BlobClient;
pub use claim_service::ClaimService;
pub use description_service::DescriptionService;
pub use email_client::{EmailClient, EmailMessage};
pub use farm_service::FarmService;
pub use import_service::{ImportRequest, ImportService};
pub use indexnow_client::IndexNowClient;
pub use kv_store::{start_cleanup_task, KvStore};
pub use photo_service::{PhotoDeps, PhotoService};
pub use postcode_client::PostcodeClient;
pub use produce_service::ProduceService;
pub use rate_limit::FormRateLimiter;
pub use stats_service::StatsService;
pub use submission_service::SubmissionService;
