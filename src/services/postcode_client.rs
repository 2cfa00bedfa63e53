// src/services/postcode_client.rs
// DOCUMENTATION: UK postcode normalization and postcodes.io client
// PURPOSE: Clean submitted postcodes and resolve them to coordinates

use crate::errors::FarmError;
use crate::services::retry::{retry_async, RetryPolicy};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// postcodes.io accepts at most 100 postcodes per bulk request
pub const BULK_BATCH_SIZE: usize = 100;
const BULK_PAUSE: Duration = Duration::from_millis(100);

static POSTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z]{1,2}[0-9][A-Z0-9]?)([0-9][A-Z]{2})$").expect("static postcode regex")
});

/// Canonical "OUTWARD INWARD" form
/// DOCUMENTATION: Input that does not look like a postcode still gets a
/// space before its last three characters when it is long enough
pub fn normalize_postcode(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if let Some(caps) = POSTCODE_RE.captures(&compact) {
        return format!("{} {}", &caps[1], &caps[2]);
    }

    if compact.len() >= 5 && compact.is_ascii() {
        let (outward, inward) = compact.split_at(compact.len() - 3);
        return format!("{} {}", outward, inward);
    }

    raw.trim().to_uppercase()
}

pub fn is_valid_format(raw: &str) -> bool {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    POSTCODE_RE.is_match(&compact)
}

/// Location data for one postcode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostcodeInfo {
    pub postcode: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub admin_district: Option<String>,
    pub admin_county: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl PostcodeInfo {
    /// Best county-level name: admin county, else district, else region
    pub fn county(&self) -> Option<&str> {
        self.admin_county
            .as_deref()
            .or(self.admin_district.as_deref())
            .or(self.region.as_deref())
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    result: Option<PostcodeInfo>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    result: Option<Vec<PostcodeInfo>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    query: String,
    result: Option<PostcodeInfo>,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    result: Vec<BulkItem>,
}

#[derive(Serialize)]
struct BulkRequest<'a> {
    postcodes: &'a [String],
}

/// Outcome of validating one postcode in bulk
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub query: String,
    pub info: Option<PostcodeInfo>,
}

/// postcodes.io client
pub struct PostcodeClient {
    client: Client,
    base_url: String,
}

impl PostcodeClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self { client, base_url }
    }

    /// Look up one postcode; `Ok(None)` when postcodes.io does not know it
    pub async fn validate(&self, postcode: &str) -> Result<Option<PostcodeInfo>, FarmError> {
        let normalized = normalize_postcode(postcode);
        if !is_valid_format(&normalized) {
            return Ok(None);
        }

        let url = format!("{}/postcodes/{}", self.base_url, normalized.replace(' ', ""));
        let (client, url) = (&self.client, &url);

        retry_async(RetryPolicy::QUICK, "postcode lookup", || async move {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| PostcodeClient::transport_error("lookup", e))?;

            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => {
                    let body: LookupResponse = response.json().await.map_err(|e| {
                        FarmError::ExternalApiError(format!("Parse error: {}", e))
                    })?;
                    Ok(body.result)
                }
                status => Err(PostcodeClient::status_error(status)),
            }
        })
        .await
    }

    /// Validate many postcodes, in batches of 100
    pub async fn bulk_validate(&self, postcodes: &[String]) -> Result<Vec<BulkResult>, FarmError> {
        let url = format!("{}/postcodes", self.base_url);
        let (client, url) = (&self.client, &url);
        let mut results = Vec::with_capacity(postcodes.len());

        for (idx, batch) in postcodes.chunks(BULK_BATCH_SIZE).enumerate() {
            if idx > 0 {
                tokio::time::sleep(BULK_PAUSE).await;
            }

            let normalized: Vec<String> = batch.iter().map(|p| normalize_postcode(p)).collect();
            let normalized = &normalized;
            let body = retry_async(RetryPolicy::API, "bulk postcode lookup", || async move {
                let response = client
                    .post(url)
                    .json(&BulkRequest { postcodes: normalized })
                    .send()
                    .await
                    .map_err(|e| PostcodeClient::transport_error("bulk lookup", e))?;

                if !response.status().is_success() {
                    return Err(PostcodeClient::status_error(response.status()));
                }

                response
                    .json::<BulkResponse>()
                    .await
                    .map_err(|e| FarmError::ExternalApiError(format!("Parse error: {}", e)))
            })
            .await?;

            log::debug!(
                "Bulk postcode batch {}: {} queried, {} resolved",
                idx + 1,
                batch.len(),
                body.result.iter().filter(|r| r.result.is_some()).count()
            );

            results.extend(body.result.into_iter().map(|item| BulkResult {
                query: item.query,
                info: item.result,
            }));
        }

        Ok(results)
    }

    /// Nearest postcode to a coordinate
    pub async fn nearest_postcode(&self, lat: f64, lng: f64) -> Result<Option<PostcodeInfo>, FarmError> {
        let url = format!("{}/postcodes", self.base_url);
        let params = [
            ("lon", lng.to_string()),
            ("lat", lat.to_string()),
            ("limit", "1".to_string()),
        ];
        let (client, url, params) = (&self.client, &url, &params);

        retry_async(RetryPolicy::QUICK, "reverse postcode lookup", || async move {
            let response = client
                .get(url)
                .query(params)
                .send()
                .await
                .map_err(|e| PostcodeClient::transport_error("reverse lookup", e))?;

            if !response.status().is_success() {
                return Err(PostcodeClient::status_error(response.status()));
            }

            let body: ListResponse = response
                .json()
                .await
                .map_err(|e| FarmError::ExternalApiError(format!("Parse error: {}", e)))?;
            Ok(body.result.and_then(|r| r.into_iter().next()))
        })
        .await
    }

    fn transport_error(what: &str, e: reqwest::Error) -> FarmError {
        log::error!("postcodes.io {} request failed: {}", what, e);
        FarmError::ExternalApiError(format!("Request failed: {}", e))
    }

    fn status_error(status: StatusCode) -> FarmError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            FarmError::ServiceUnavailable("postcodes.io rate limited".to_string())
        } else if status.is_server_error() {
            FarmError::ExternalApiError(format!("postcodes.io returned {}", status))
        } else {
            FarmError::InvalidInput(format!("postcodes.io rejected request: {}", status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_postcode() {
        assert_eq!(normalize_postcode("sw1a1aa"), "SW1A 1AA");
        assert_eq!(normalize_postcode("  sy8  1aa "), "SY8 1AA");
        assert_eq!(normalize_postcode("M11AE"), "M1 1AE");
        assert_eq!(normalize_postcode("EC1A 1BB"), "EC1A 1BB");
    }

    #[test]
    fn test_normalize_non_matching_input() {
        // Not a valid shape, still split before the last three
        assert_eq!(normalize_postcode("ABCDEF"), "ABC DEF");
        assert_eq!(normalize_postcode(" ab1 "), "AB1");
        assert_eq!(normalize_postcode(""), "");
    }

    #[test]
    fn test_is_valid_format() {
        assert!(is_valid_format("SW1A 1AA"));
        assert!(is_valid_format("m1 1ae"));
        assert!(!is_valid_format("12345"));
        assert!(!is_valid_format("SW1A"));
    }

    #[test]
    fn test_postcode_info_county_fallback() {
        let info = PostcodeInfo {
            postcode: "SY8 1AA".into(),
            latitude: Some(52.37),
            longitude: Some(-2.72),
            admin_district: Some("Shropshire".into()),
            admin_county: None,
            region: Some("West Midlands".into()),
            country: Some("England".into()),
        };
        assert_eq!(info.county(), Some("Shropshire"));
        assert_eq!(info.coordinates(), Some((52.37, -2.72)));
    }

    #[test]
    fn test_status_errors_are_classified() {
        assert!(PostcodeClient::status_error(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(PostcodeClient::status_error(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!PostcodeClient::status_error(StatusCode::BAD_REQUEST).is_retryable());
    }
}
