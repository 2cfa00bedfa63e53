// src/bin/import_farms.rs
// DOCUMENTATION: Bulk farm import CLI
// PURPOSE: Push a curated farms JSON file to the admin import endpoint in batches
//
// Usage: import_farms [path] [--validate-postcodes]
// Env:   FARM_API_URL (default http://localhost:8080), ADMIN_TOKEN (required)

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::process;
use std::time::{Duration, Instant};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

const BATCH_SIZE: usize = 200;
const DEFAULT_PATH: &str = "farms.uk.json";

#[derive(Serialize)]
struct ImportPayload<'a> {
    farms: &'a [Value],
    validate_postcodes: bool,
}

#[derive(Deserialize, Debug, Default)]
struct ImportResponse {
    #[serde(default)]
    received: u32,
    #[serde(default)]
    created: u32,
    #[serde(default)]
    updated: u32,
    #[serde(default)]
    skipped: u32,
    #[serde(default)]
    failed: u32,
    #[serde(default)]
    needs_description: u32,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug)]
struct BatchResult {
    index: usize,
    success: bool,
    response: ImportResponse,
    duration_secs: f64,
}

/// The file is either a bare array of farms or `{ "farms": [...] }`
fn parse_farms(raw: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw).context("farms file is not valid JSON")? {
        Value::Array(farms) => Ok(farms),
        Value::Object(mut obj) => match obj.remove("farms") {
            Some(Value::Array(farms)) => Ok(farms),
            _ => bail!("expected a \"farms\" array"),
        },
        _ => bail!("expected an array of farms"),
    }
}

struct FarmImporter {
    base_url: String,
    admin_token: String,
    validate_postcodes: bool,
    client: Client,
    results: Vec<BatchResult>,
}

impl FarmImporter {
    fn new(base_url: String, admin_token: String, validate_postcodes: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            base_url,
            admin_token,
            validate_postcodes,
            client,
            results: Vec::new(),
        })
    }

    async fn check_service_health(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn import_batch(&self, farms: &[Value]) -> Result<ImportResponse> {
        let response = self
            .client
            .post(format!("{}/admin/import", self.base_url))
            .header("X-Admin-Token", &self.admin_token)
            .json(&ImportPayload {
                farms,
                validate_postcodes: self.validate_postcodes,
            })
            .send()
            .await
            .context("import request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {} - {}", status, body);
        }

        response
            .json::<ImportResponse>()
            .await
            .context("failed to parse import response")
    }

    async fn run(&mut self, farms: &[Value]) {
        println!("\n{}🔍 Checking service status...{}", CYAN, RESET);
        if !self.check_service_health().await {
            println!("{}❌ Service unavailable at {}{}", RED, self.base_url, RESET);
            process::exit(1);
        }
        println!("{}✅ Service available{}\n", GREEN, RESET);

        let batches: Vec<&[Value]> = farms.chunks(BATCH_SIZE).collect();
        println!(
            "{}🚜 Importing {} farms in {} batches{}\n",
            BOLD,
            farms.len(),
            batches.len(),
            RESET
        );

        for (i, batch) in batches.iter().enumerate() {
            let start = Instant::now();
            println!("{}[{}/{}] Sending {} farms...{}", CYAN, i + 1, batches.len(), batch.len(), RESET);

            let outcome = self.import_batch(batch).await;
            let duration_secs = start.elapsed().as_secs_f64();

            match outcome {
                Ok(resp) => {
                    println!(
                        "{}✅ {} created, {} updated, {} skipped, {} failed ({:.1}s){}",
                        GREEN, resp.created, resp.updated, resp.skipped, resp.failed, duration_secs, RESET
                    );
                    for err in resp.errors.iter().take(5) {
                        println!("{}   ⚠️  {}{}", YELLOW, err, RESET);
                    }
                    if resp.errors.len() > 5 {
                        println!("{}   ... and {} more{}", YELLOW, resp.errors.len() - 5, RESET);
                    }
                    self.results.push(BatchResult {
                        index: i + 1,
                        success: true,
                        response: resp,
                        duration_secs,
                    });
                }
                Err(e) => {
                    println!("{}❌ Batch {} failed: {:#}{}", RED, i + 1, e, RESET);
                    self.results.push(BatchResult {
                        index: i + 1,
                        success: false,
                        response: ImportResponse::default(),
                        duration_secs,
                    });
                }
            }
        }

        self.print_summary();
    }

    fn print_summary(&self) {
        println!("\n\n{}📋 Import Summary{}", BOLD, RESET);
        println!("────────────────────────────────────────────────────────────────");
        println!(
            "{:<8} {:<8} {:>8} {:>8} {:>8} {:>8} {:>10}",
            "Batch", "Status", "Sent", "New", "Updated", "Skipped", "Duration"
        );
        println!("────────────────────────────────────────────────────────────────");

        let mut totals = ImportResponse::default();
        let mut failed_batches = 0;

        for res in &self.results {
            let status_icon = if res.success { "✅" } else { "❌" };
            println!(
                "{:<8} {:<8} {:>8} {:>8} {:>8} {:>8} {:>9.1}s",
                res.index,
                status_icon,
                res.response.received,
                res.response.created,
                res.response.updated,
                res.response.skipped,
                res.duration_secs
            );

            if res.success {
                totals.received += res.response.received;
                totals.created += res.response.created;
                totals.updated += res.response.updated;
                totals.skipped += res.response.skipped;
                totals.failed += res.response.failed;
                totals.needs_description += res.response.needs_description;
            } else {
                failed_batches += 1;
            }
        }

        println!("────────────────────────────────────────────────────────────────");
        if failed_batches == 0 {
            println!("\n{}✨ Import completed{}", GREEN, RESET);
        } else {
            println!("\n{}⚠️  Import finished with {} failed batches{}", YELLOW, failed_batches, RESET);
        }
        println!("{}📊 Totals:{}", BOLD, RESET);
        println!("  • Received: {}", totals.received);
        println!("  • Created: {}{}{}", GREEN, totals.created, RESET);
        println!("  • Updated: {}", totals.updated);
        println!("  • Skipped: {}{}{}", YELLOW, totals.skipped, RESET);
        println!("  • Failed: {}{}{}", RED, totals.failed, RESET);
        println!("  • Missing descriptions: {}", totals.needs_description);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let admin_token = env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set in .env")?;
    let base_url = env::var("FARM_API_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string())
        .trim_end_matches('/')
        .to_string();

    let args: Vec<String> = env::args().skip(1).collect();
    let validate_postcodes = args.iter().any(|a| a == "--validate-postcodes");
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| DEFAULT_PATH.to_string());

    let raw = std::fs::read_to_string(&path).with_context(|| format!("cannot read {}", path))?;
    let farms = parse_farms(&raw)?;
    if farms.is_empty() {
        println!("{}Nothing to import in {}{}", YELLOW, path, RESET);
        return Ok(());
    }

    let mut importer = FarmImporter::new(base_url, admin_token, validate_postcodes)?;
    importer.run(&farms).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_farms_shapes() {
        assert_eq!(parse_farms(r#"[{"name":"A"},{"name":"B"}]"#).unwrap().len(), 2);
        assert_eq!(parse_farms(r#"{"farms":[{"name":"A"}]}"#).unwrap().len(), 1);
        assert!(parse_farms(r#"{"shops":[]}"#).is_err());
        assert!(parse_farms("42").is_err());
        assert!(parse_farms("not json").is_err());
    }
}
