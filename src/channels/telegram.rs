//! Telegram Bot API channel.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::traits::{Channel, SendMessage};
use crate::config::TelegramConfig;

/// Telegram rejects messages over 4096 characters; leave headroom.
pub const MAX_MESSAGE_CHARS: usize = 4000;

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Pause between chunks of one long message.
const CHUNK_DELAY: Duration = Duration::from_secs(1);

/// Split `text` into pieces of at most `max_chars` characters, never inside
/// a UTF-8 sequence.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn is_markdown_parse_error(body: &serde_json::Value) -> bool {
    body.get("description")
        .and_then(|d| d.as_str())
        .is_some_and(|d| d.contains("can't parse entities"))
}

pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    http: reqwest::Client,
    chunk_delay: Duration,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("failed to build Telegram HTTP client")?;
        Ok(Self {
            bot_token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            http,
            chunk_delay: CHUNK_DELAY,
        })
    }

    #[cfg(test)]
    fn without_chunk_delay(mut self) -> Self {
        self.chunk_delay = Duration::ZERO;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    async fn post_text(
        &self,
        chat_id: &str,
        text: &str,
        markdown: bool,
    ) -> Result<(reqwest::StatusCode, serde_json::Value)> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if markdown {
            body["parse_mode"] = serde_json::Value::from("Markdown");
        }
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<serde_json::Value>(&raw)
            .unwrap_or_else(|_| serde_json::json!({ "raw": raw }));
        Ok((status, parsed))
    }

    async fn send_chunk(&self, chat_id: &str, text: &str) -> Result<()> {
        let (status, response) = self.post_text(chat_id, text, true).await?;
        if status.is_success() {
            return Ok(());
        }
        // Tags and URLs in reports can break Markdown; resend as plain text.
        if is_markdown_parse_error(&response) {
            tracing::debug!("Telegram: Markdown rejected, resending as plain text");
            let (rs, rr) = self.post_text(chat_id, text, false).await?;
            if rs.is_success() {
                return Ok(());
            }
            bail!("Telegram sendMessage failed: status={rs}, body={rr}");
        }
        bail!("Telegram sendMessage failed: status={status}, body={response}");
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &SendMessage) -> Result<()> {
        let chunks = split_chunks(&message.content, MAX_MESSAGE_CHARS);
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            self.send_chunk(&message.recipient, chunk).await?;
        }
        tracing::info!(parts = chunks.len(), "Telegram message sent");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.http.get(self.method_url("getMe")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("Telegram health check failed: {e}");
                false
            }
        }
    }
}
