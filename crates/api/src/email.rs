//! Outbound mail for the password-reset flow
//!
//! Fire-and-forget: delivery failures are logged, never propagated into
//! the request that triggered them. When no provider key is configured
//! the service logs the event and drops the mail, which keeps local
//! development working without a mail account.

use serde_json::json;

#[derive(Clone)]
pub struct MailService {
    api_key: Option<String>,
    from_address: String,
    client: reqwest::Client,
}

impl MailService {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            from_address: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@basalt.dev".to_string()),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Queue a password-reset mail carrying the reset token.
    pub fn send_password_reset(&self, destination: &str, token: &str) {
        let Some(api_key) = self.api_key.clone() else {
            tracing::info!(email = %destination, "Mail not configured, skipping reset email");
            return;
        };

        let client = self.client.clone();
        let from = self.from_address.clone();
        let to = destination.to_string();
        let token = token.to_string();

        tokio::spawn(async move {
            let body = json!({
                "from": from,
                "to": [to.clone()],
                "subject": "Reset your password",
                "text": format!(
                    "A password reset was requested for your account.\n\n\
                     Your reset token: {token}\n\n\
                     It expires shortly. If you did not request this, ignore this email."
                ),
            });

            let result = client
                .post("https://api.resend.com/emails")
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(email = %to, "Password reset email sent");
                }
                Ok(resp) => {
                    tracing::error!(email = %to, status = %resp.status(), "Reset email rejected by provider");
                }
                Err(e) => {
                    tracing::error!(email = %to, error = %e, "Failed to send reset email");
                }
            }
        });
    }
}
