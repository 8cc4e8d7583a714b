use async_trait::async_trait;

/// An outbound text message for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub content: String,
    pub recipient: String,
}

impl SendMessage {
    pub fn new(content: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            recipient: recipient.into(),
        }
    }
}

/// A notification transport (Telegram, WhatsApp, ...).
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver a pre-formatted message, splitting or truncating as the
    /// transport requires.
    async fn send(&self, message: &SendMessage) -> anyhow::Result<()>;

    /// Whether the transport's credentials currently work.
    async fn health_check(&self) -> bool {
        true
    }
}
