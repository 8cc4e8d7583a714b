//! Notification channels and the report delivery policy.

pub mod telegram;
pub mod traits;
pub mod whatsapp;

pub use telegram::TelegramChannel;
pub use traits::{Channel, SendMessage};
pub use whatsapp::WhatsAppChannel;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, NotifyConfig};
use crate::report::{failure_alert, summary_message, CycleReport};

/// A channel paired with the recipient it delivers to.
#[derive(Clone)]
pub struct Destination {
    pub channel: Arc<dyn Channel>,
    pub recipient: String,
}

/// Build a destination for every configured channel.
pub fn build_destinations(config: &Config) -> Result<Vec<Destination>> {
    let mut destinations = Vec::new();
    if let Some(telegram) = &config.telegram {
        destinations.push(Destination {
            channel: Arc::new(TelegramChannel::new(telegram)?),
            recipient: telegram.chat_id.clone(),
        });
    }
    if let Some(whatsapp) = &config.whatsapp {
        destinations.push(Destination {
            channel: Arc::new(WhatsAppChannel::new(whatsapp)?),
            recipient: whatsapp.to.clone(),
        });
    }
    Ok(destinations)
}

/// Sends cycle reports to every destination according to [`NotifyConfig`].
///
/// Delivery failures are logged and never propagated.
#[derive(Clone)]
pub struct Notifier {
    destinations: Vec<Destination>,
    policy: NotifyConfig,
    interval_minutes: u64,
}

impl Notifier {
    pub fn new(destinations: Vec<Destination>, policy: NotifyConfig, interval_minutes: u64) -> Self {
        Self {
            destinations,
            policy,
            interval_minutes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Messages the policy selects for `report`, in send order.
    pub fn messages_for(&self, report: &CycleReport) -> Vec<String> {
        let mut messages = Vec::new();
        let quiet = self.policy.send_only_failures && !report.has_failures();
        if self.policy.send_summary && !quiet {
            messages.push(summary_message(report, Some(self.interval_minutes)));
        }
        if let Some(alert) = failure_alert(report) {
            messages.push(alert);
        }
        messages
    }

    /// Deliver `text` to every destination.
    pub async fn broadcast(&self, text: &str) {
        for destination in &self.destinations {
            let message = SendMessage::new(text, destination.recipient.clone());
            if let Err(e) = destination.channel.send(&message).await {
                tracing::warn!(
                    channel = destination.channel.name(),
                    "notification failed: {e:#}"
                );
            }
        }
    }

    pub async fn notify(&self, report: &CycleReport) {
        if self.destinations.is_empty() {
            tracing::debug!("no notification channels configured");
            return;
        }
        for message in self.messages_for(report) {
            self.broadcast(&message).await;
        }
    }

    /// Check every destination's credentials, returning `(name, healthy)`.
    pub async fn health_check(&self) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(self.destinations.len());
        for destination in &self.destinations {
            let healthy = destination.channel.health_check().await;
            results.push((destination.channel.name().to_string(), healthy));
        }
        results
    }
}
