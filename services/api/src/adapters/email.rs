//! services/api/src/adapters/email.rs
//!
//! This module contains the adapter for the Mailgun HTTP API. It implements
//! the `EmailService` port from the `core` crate. When the Mailgun settings
//! are not configured the adapter degrades to a logged no-op, so local
//! development works without credentials.

use async_trait::async_trait;
use tracing::{info, warn};

use casa_core::error::{CoreError, CoreResult};
use casa_core::ports::EmailService;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `EmailService` port using Mailgun.
#[derive(Clone)]
pub struct MailgunEmailAdapter {
    client: reqwest::Client,
    settings: Option<MailgunSettings>,
}

#[derive(Clone)]
struct MailgunSettings {
    api_key: String,
    domain: String,
    from_email: String,
}

impl MailgunEmailAdapter {
    /// Creates a new adapter. Missing settings disable sending entirely.
    pub fn new(
        api_key: Option<String>,
        domain: Option<String>,
        from_email: Option<String>,
    ) -> Self {
        let settings = match (api_key, domain, from_email) {
            (Some(api_key), Some(domain), Some(from_email)) => Some(MailgunSettings {
                api_key,
                domain,
                from_email,
            }),
            _ => {
                warn!("Mailgun settings are not fully configured - email sending is disabled");
                None
            }
        };
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    async fn send(&self, to_address: &str, subject: &str, html: &str) -> CoreResult<()> {
        let settings = match &self.settings {
            Some(s) => s,
            None => {
                info!("Email settings not configured - skipping send to {}", to_address);
                return Ok(());
            }
        };

        let url = format!("https://api.mailgun.net/v3/{}/messages", settings.domain);
        info!("Sending email to {}: {}", to_address, subject);

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&settings.api_key))
            .form(&[
                ("from", settings.from_email.as_str()),
                ("to", to_address),
                ("subject", subject),
                ("html", html),
            ])
            .send()
            .await
            .map_err(|e| CoreError::Infrastructure(format!("Mailgun request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CoreError::Infrastructure(format!(
                "Mailgun API error: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `EmailService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmailService for MailgunEmailAdapter {
    async fn send_invitation(
        &self,
        to_address: &str,
        project_name: &str,
        invitation_url: &str,
        invited_by_email: &str,
    ) -> CoreResult<()> {
        let subject = format!("Invitation to collaborate on {}", project_name);
        let html = format!(
            "<html><body>\
             <h2>Project Collaboration Invitation</h2>\
             <p>Hello!</p>\
             <p><strong>{}</strong> has invited you to collaborate on the housing \
             evaluation project \"<strong>{}</strong>\".</p>\
             <p><a href=\"{}\">Accept Invitation</a></p>\
             <p>Or copy and paste this URL into your browser:</p>\
             <p>{}</p>\
             <p>Best regards,<br>The Checklist Casa Team</p>\
             </body></html>",
            invited_by_email, project_name, invitation_url, invitation_url
        );
        self.send(to_address, &subject, &html).await
    }

    async fn send_visit_confirmation(
        &self,
        to_address: &str,
        visit_name: &str,
    ) -> CoreResult<()> {
        let subject = format!("Visit Logged: {}", visit_name);
        let html = format!(
            "<html><body>\
             <h2>Visit Confirmation</h2>\
             <p>Hello!</p>\
             <p>Your visit has been logged on Checklist Casa.</p>\
             <p><strong>Property:</strong> {}</p>\
             <p>You can now assess it against your project criteria.</p>\
             <p>Best regards,<br>The Checklist Casa Team</p>\
             </body></html>",
            visit_name
        );
        self.send(to_address, &subject, &html).await
    }
}
