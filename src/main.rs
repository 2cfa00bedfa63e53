// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Initialize config, database, shared clients and start HTTP server

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod services;

use actix_web::{middleware::Logger, web, App, HttpServer};
use config::Config;
use dotenv::dotenv;
use services::{
    start_cleanup_task, BlobClient, EmailClient, FormRateLimiter, IndexNowClient, KvStore,
    PostcodeClient,
};
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        let log_level = if !config.log_level.is_empty() {
            &config.log_level
        } else {
            "info,actix_web=info,sqlx=warn"
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    // validate() logs warnings, so it runs once the logger exists
    if let Err(e) = config.validate() {
        log::error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    log::info!("Starting farm-companion...");
    log::info!("Environment: {}", config.environment);
    log::info!(
        "Server Address: {}:{}",
        config.server_address,
        config.server_port
    );

    // 4. Initialize database connection pool
    let pool = match config::init_db_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    // 5. Shared state: KV store, form limiter and outbound clients
    let kv = Arc::new(KvStore::new(config.cache_ttl_secs));
    let limiter = Arc::new(FormRateLimiter::per_hour(config.form_rate_per_hour));
    let blob = Arc::new(BlobClient::from_config(&config));
    let email = Arc::new(EmailClient::from_config(&config));
    let indexnow = Arc::new(IndexNowClient::from_config(&config));
    let postcodes = Arc::new(PostcodeClient::new(config.postcodes_api_url.clone()));
    log::info!("Initialized KV store (TTL: {}s)", config.cache_ttl_secs);

    start_cleanup_task(kv.clone(), limiter.clone(), 300);
    log::info!("Started KV cleanup task (interval: 5 minutes)");

    // 6. Start HTTP server
    let server_addr = format!("{}:{}", config.server_address, config.server_port);
    let config_clone = config.clone();
    let upload_limit = config.max_upload_bytes as usize;

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config_clone.clone()))
            .app_data(web::Data::new(kv.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .app_data(web::Data::new(blob.clone()))
            .app_data(web::Data::new(email.clone()))
            .app_data(web::Data::new(indexnow.clone()))
            .app_data(web::Data::new(postcodes.clone()))
            // Photo bodies arrive as raw bytes
            .app_data(web::PayloadConfig::new(upload_limit))
            // Middleware
            .wrap(Logger::default())
            .wrap(actix_web::middleware::Compress::default())
            // Routes
            .configure(handlers::health_config)
            .configure(handlers::indexnow_config)
            .configure(handlers::farms_config)
            .configure(handlers::categories_config)
            .configure(handlers::produce_config)
            .configure(handlers::photos_config)
            .configure(handlers::submissions_config)
            .configure(handlers::admin_config)
    })
    .bind(&server_addr)?
    .run()
    .await
}
