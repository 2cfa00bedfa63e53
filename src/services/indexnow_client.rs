// src/services/indexnow_client.rs
// DOCUMENTATION: IndexNow content-change notifier
// PURPOSE: Tell search engines which public pages changed

use crate::config::Config;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Protocol limit on URLs per submission
pub const MAX_URLS_PER_SUBMISSION: usize = 10_000;

/// Path the key file is served from
pub const KEY_FILE_PATH: &str = "/indexnow-key.txt";

/// JSON body posted to IndexNow endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexNowPayload {
    pub host: String,
    pub key: String,
    pub key_location: String,
    pub url_list: Vec<String>,
}

/// Result of notifying one endpoint
#[derive(Debug, Clone, Serialize)]
pub struct IndexNowOutcome {
    pub endpoint: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub error: Option<String>,
}

/// IndexNow client
/// DOCUMENTATION: Endpoints are called one after another with no retry.
/// Notification is best-effort and never fails the caller.
pub struct IndexNowClient {
    client: Client,
    endpoints: Vec<String>,
    site_url: String,
    host: String,
    key: String,
}

impl IndexNowClient {
    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            endpoints: config.indexnow_endpoints.clone(),
            site_url: config.site_url.clone(),
            host: config.site_host(),
            key: config.indexnow_key.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.key.is_empty() && !self.endpoints.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn absolute(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/{}", self.site_url, path_or_url.trim_start_matches('/'))
        }
    }

    /// Build the request body; `None` when there is nothing to send
    /// DOCUMENTATION: URLs are made absolute, deduplicated in order, and
    /// anything on another host is dropped
    pub fn build_payload(&self, paths: &[String]) -> Option<IndexNowPayload> {
        let mut seen = HashSet::new();
        let own_prefix = format!("{}/", self.site_url);

        let url_list: Vec<String> = paths
            .iter()
            .map(|p| self.absolute(p))
            .filter(|u| u.starts_with(&own_prefix) || *u == self.site_url)
            .filter(|u| seen.insert(u.clone()))
            .take(MAX_URLS_PER_SUBMISSION)
            .collect();

        if url_list.is_empty() {
            return None;
        }

        Some(IndexNowPayload {
            host: self.host.clone(),
            key: self.key.clone(),
            key_location: format!("{}{}", self.site_url, KEY_FILE_PATH),
            url_list,
        })
    }

    /// Notify every endpoint in turn
    pub async fn notify(&self, paths: &[String]) -> Vec<IndexNowOutcome> {
        if !self.is_enabled() {
            log::debug!("IndexNow disabled, skipping {} urls", paths.len());
            return Vec::new();
        }

        let Some(payload) = self.build_payload(paths) else {
            return Vec::new();
        };

        let mut outcomes = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let outcome = match self.client.post(endpoint).json(&payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    // 200 and 202 both mean the submission was received
                    let ok = status.is_success();
                    if ok {
                        log::info!(
                            "IndexNow {} accepted {} urls ({})",
                            endpoint,
                            payload.url_list.len(),
                            status
                        );
                    } else {
                        log::warn!("IndexNow {} responded {}", endpoint, status);
                    }
                    IndexNowOutcome {
                        endpoint: endpoint.clone(),
                        status: Some(status.as_u16()),
                        ok,
                        error: None,
                    }
                }
                Err(e) => {
                    log::warn!("IndexNow {} request failed: {}", endpoint, e);
                    IndexNowOutcome {
                        endpoint: endpoint.clone(),
                        status: None,
                        ok: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Fire-and-forget notification
    pub fn notify_in_background(self: &Arc<Self>, paths: Vec<String>) {
        if !self.is_enabled() || paths.is_empty() {
            return;
        }

        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.notify(&paths).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn client_with_key() -> IndexNowClient {
        let mut config = test_config();
        config.indexnow_key = "abc123".into();
        config.indexnow_endpoints = vec!["https://api.indexnow.org/indexnow".into()];
        IndexNowClient::from_config(&config)
    }

    #[test]
    fn test_payload_shape() {
        let client = client_with_key();
        let payload = client
            .build_payload(&["/shop/hollow-farm".to_string()])
            .unwrap();

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["host"], "www.farmcompanion.co.uk");
        assert_eq!(json["key"], "abc123");
        assert_eq!(
            json["keyLocation"],
            "https://www.farmcompanion.co.uk/indexnow-key.txt"
        );
        assert_eq!(
            json["urlList"][0],
            "https://www.farmcompanion.co.uk/shop/hollow-farm"
        );
    }

    #[test]
    fn test_payload_dedupes_and_filters_foreign_hosts() {
        let client = client_with_key();
        let payload = client
            .build_payload(&[
                "/shop/a".to_string(),
                "https://www.farmcompanion.co.uk/shop/a".to_string(),
                "https://elsewhere.example/shop/b".to_string(),
                "map".to_string(),
            ])
            .unwrap();

        assert_eq!(
            payload.url_list,
            vec![
                "https://www.farmcompanion.co.uk/shop/a",
                "https://www.farmcompanion.co.uk/map",
            ]
        );
        assert!(client.build_payload(&[]).is_none());
    }

    #[test]
    fn test_payload_caps_url_list() {
        let client = client_with_key();
        let paths: Vec<String> = (0..MAX_URLS_PER_SUBMISSION + 250)
            .map(|i| format!("/shop/farm-{}", i))
            .collect();

        let payload = client.build_payload(&paths).unwrap();
        assert_eq!(payload.url_list.len(), 10_000);
        assert_eq!(payload.url_list[0], "https://www.farmcompanion.co.uk/shop/farm-0");
        assert_eq!(
            payload.url_list.last().map(String::as_str),
            Some("https://www.farmcompanion.co.uk/shop/farm-9999")
        );
    }

    #[tokio::test]
    async fn test_disabled_without_key() {
        let client = IndexNowClient::from_config(&test_config());
        assert!(!client.is_enabled());
        assert!(client.notify(&["/shop/a".to_string()]).await.is_empty());
    }
}
