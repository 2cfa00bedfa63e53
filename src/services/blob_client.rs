// src/services/blob_client.rs
// DOCUMENTATION: Blob storage HTTP client
// PURPOSE: Store uploaded photos and confirm objects exist before they are recorded

use crate::config::Config;
use crate::errors::FarmError;
use crate::services::retry::{retry_async, RetryPolicy};
use actix_web::web::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

/// Blob storage client
/// DOCUMENTATION: Objects live at `{api_url}/{key}` and are served from
/// `{public_url}/{key}`
pub struct BlobClient {
    client: Client,
    api_url: String,
    public_url: String,
    token: String,
}

impl BlobClient {
    pub fn new(api_url: String, public_url: String, token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            api_url,
            public_url,
            token,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.blob_api_url.clone(),
            config.blob_public_url.clone(),
            config.blob_token.clone(),
        )
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.api_url, key)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    /// Upload an object, overwriting any previous content under the key
    pub async fn put_object(&self, key: &str, content_type: &str, body: Bytes) -> Result<(), FarmError> {
        let size = body.len();
        let response = self
            .authorize(self.client.put(self.object_url(key)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                log::error!("Blob upload of {} failed: {}", key, e);
                FarmError::ExternalApiError(format!("Blob upload failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("Blob storage rejected {} with {}: {}", key, status, body);
            return Err(FarmError::ExternalApiError(format!(
                "Blob storage returned {}",
                status
            )));
        }

        log::info!("Stored blob {} ({} bytes)", key, size);
        Ok(())
    }

    /// HEAD the object: 2xx is present, 404 is absent, anything else is an error
    pub async fn object_exists(&self, key: &str) -> Result<bool, FarmError> {
        let response = self
            .authorize(self.client.head(self.object_url(key)))
            .send()
            .await
            .map_err(|e| {
                log::warn!("Blob HEAD for {} failed: {}", key, e);
                FarmError::ExternalApiError(format!("Blob HEAD failed: {}", e))
            })?;

        classify_head(response.status())
    }

    /// `object_exists` with short retries for flaky storage
    pub async fn verify_object(&self, key: &str) -> Result<bool, FarmError> {
        retry_async(RetryPolicy::QUICK, "blob existence check", move || self.object_exists(key)).await
    }
}

fn classify_head(status: StatusCode) -> Result<bool, FarmError> {
    match status {
        s if s.is_success() => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FarmError::InternalError(
            "blob storage credentials rejected".to_string(),
        )),
        s => Err(FarmError::ExternalApiError(format!("Blob storage returned {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let blob = BlobClient::new(
            "https://blob.example/api".into(),
            "https://cdn.example".into(),
            String::new(),
        );
        assert_eq!(
            blob.public_url("farm-photos/a/b.jpg"),
            "https://cdn.example/farm-photos/a/b.jpg"
        );
        assert_eq!(
            blob.object_url("farm-photos/a/b.jpg"),
            "https://blob.example/api/farm-photos/a/b.jpg"
        );
    }

    #[test]
    fn test_classify_head() {
        assert!(classify_head(StatusCode::OK).unwrap());
        assert!(!classify_head(StatusCode::NOT_FOUND).unwrap());
        assert!(classify_head(StatusCode::SERVICE_UNAVAILABLE).unwrap_err().is_retryable());
        assert!(!classify_head(StatusCode::FORBIDDEN).unwrap_err().is_retryable());
    }
}
