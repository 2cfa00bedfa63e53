// src/services/email_client.rs
// DOCUMENTATION: Transactional email client
// PURPOSE: Tell admins about new work and tell visitors about decisions

use crate::config::Config;
use crate::errors::FarmError;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// One outgoing email
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            text: text.into(),
        }
    }

    pub fn new_submission(admin: &str, farm_name: &str, submitter: &str) -> Self {
        Self::new(
            admin,
            format!("New farm submission: {}", farm_name),
            format!(
                "{} submitted \"{}\". Review it in the admin queue.",
                submitter, farm_name
            ),
        )
    }

    pub fn submission_decision(to: &str, farm_name: &str, approved: bool, farm_url: &str, notes: Option<&str>) -> Self {
        let (subject, mut text) = if approved {
            (
                format!("{} is now listed", farm_name),
                format!("Thanks for your submission. {} is live at {}", farm_name, farm_url),
            )
        } else {
            (
                format!("Your submission for {}", farm_name),
                format!("We were unable to list {} at this time.", farm_name),
            )
        };
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            text.push_str(&format!("\n\nReviewer notes: {}", notes));
        }
        Self::new(to, subject, text)
    }

    pub fn photo_pending(admin: &str, farm_name: &str, photo_id: &uuid::Uuid) -> Self {
        Self::new(
            admin,
            format!("Photo awaiting moderation for {}", farm_name),
            format!("Photo {} was uploaded for {} and is waiting for review.", photo_id, farm_name),
        )
    }

    pub fn claim_received(admin: &str, farm_name: &str, claimant: &str) -> Self {
        Self::new(
            admin,
            format!("Ownership claim for {}", farm_name),
            format!("{} has claimed {}. Review it in the admin queue.", claimant, farm_name),
        )
    }

    pub fn claim_decision(to: &str, farm_name: &str, approved: bool) -> Self {
        if approved {
            Self::new(
                to,
                format!("Your claim for {} was approved", farm_name),
                format!("You are now the verified owner of {}.", farm_name),
            )
        } else {
            Self::new(
                to,
                format!("Your claim for {}", farm_name),
                format!("We could not verify your claim for {}.", farm_name),
            )
        }
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

/// Email API client
/// DOCUMENTATION: Disabled when no API key is configured; sends are then
/// logged and skipped
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
    admin_email: String,
}

impl EmailClient {
    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
            admin_email: config.admin_email.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), FarmError> {
        if !self.is_enabled() {
            log::info!("Email disabled, skipping \"{}\"", message.subject);
            return Ok(());
        }

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                text: &message.text,
            })
            .send()
            .await
            .map_err(|e| FarmError::ExternalApiError(format!("Email request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FarmError::ExternalApiError(format!(
                "Email API returned {}: {}",
                status, body
            )));
        }

        log::info!("Sent email \"{}\" to {}", message.subject, message.to.join(", "));
        Ok(())
    }

    /// Send without making the caller wait; failures are only logged
    pub fn send_in_background(self: &Arc<Self>, message: EmailMessage) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = client.send(&message).await {
                log::warn!("Could not send email \"{}\": {}", message.subject, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_decision_messages() {
        let approved = EmailMessage::submission_decision(
            "sam@example.com",
            "Hollow Farm",
            true,
            "https://www.farmcompanion.co.uk/shop/hollow-farm",
            Some("Lovely shop"),
        );
        assert_eq!(approved.to, vec!["sam@example.com"]);
        assert!(approved.text.contains("/shop/hollow-farm"));
        assert!(approved.text.contains("Reviewer notes: Lovely shop"));

        let rejected = EmailMessage::submission_decision("sam@example.com", "Hollow Farm", false, "", Some(" "));
        assert!(!rejected.text.contains("Reviewer notes"));
    }

    #[tokio::test]
    async fn test_disabled_client_skips_send() {
        let client = EmailClient::from_config(&test_config());
        assert!(!client.is_enabled());
        let msg = EmailMessage::claim_received("admin@example.com", "Hollow Farm", "Sam");
        assert!(client.send(&msg).await.is_ok());
    }
}
