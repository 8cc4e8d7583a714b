//! WhatsApp delivery through the Twilio Messages API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::traits::{Channel, SendMessage};
use crate::config::WhatsAppConfig;

/// Body length kept before the truncation marker.
pub const MAX_BODY_CHARS: usize = 1500;

const TRUNCATION_MARKER: &str = "\n\n... (message truncated)";

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Cut `text` to [`MAX_BODY_CHARS`] characters, marking the cut.
pub fn truncate_body(text: &str) -> String {
    match text.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

pub struct WhatsAppChannel {
    account_sid: String,
    auth_token: String,
    from: String,
    api_base: String,
    http: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("failed to build Twilio HTTP client")?;
        Ok(Self {
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: config.from.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn account_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}", self.api_base, self.account_sid)
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, message: &SendMessage) -> Result<()> {
        let body = truncate_body(&message.content);
        let resp = self
            .http
            .post(format!("{}/Messages.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("From", self.from.as_str()),
                ("To", message.recipient.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            bail!("Twilio message create failed: status={status}, body={raw}");
        }
        tracing::info!("WhatsApp message sent");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let resp = self
            .http
            .get(format!("{}.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await;
        match resp {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("Twilio health check failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(server: &MockServer) -> WhatsAppChannel {
        WhatsAppChannel::new(&WhatsAppConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from: "whatsapp:+14155238886".into(),
            to: "whatsapp:+15550001111".into(),
            api_base: server.uri(),
        })
        .unwrap()
    }

    #[test]
    fn truncation_keeps_short_bodies() {
        assert_eq!(truncate_body("hello"), "hello");
        let long = "ä".repeat(MAX_BODY_CHARS + 10);
        let cut = truncate_body(&long);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.chars().count(), MAX_BODY_CHARS + TRUNCATION_MARKER.chars().count());
    }

    #[tokio::test]
    async fn posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("Body=report"))
            .and(body_string_contains("To=whatsapp%3A%2B15550001111"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sid": "SM1"})))
            .expect(1)
            .mount(&server)
            .await;

        channel(&server)
            .send(&SendMessage::new("report", "whatsapp:+15550001111"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn twilio_error_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = channel(&server)
            .send(&SendMessage::new("x", "whatsapp:+1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
