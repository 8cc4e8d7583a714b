//! Canonical VPN account model and descriptor extraction.
//!
//! Raw configuration documents (sing-box/Xray/Clash-style JSON, bare lists of
//! connection URLs, plain-text subscriptions) are turned into an ordered
//! sequence of [`Account`] records that the prober can test.

pub mod descriptor;
pub mod document;
pub mod extractor;
pub mod normalize;

pub use descriptor::Descriptor;
pub use document::{parse_document, DocumentError};
pub use extractor::{extract, Extraction, ExtractionError};
pub use normalize::ensure_ws_path;

use std::fmt;

/// A single candidate endpoint extracted from a configuration document.
///
/// `raw` preserves the original descriptor (JSON object or URL string) so
/// downstream consumers can republish a working subset without data loss.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Account {
    pub tag: String,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub raw: serde_json::Value,
}

impl Account {
    /// `host:port`, with IPv6 literals bracketed.
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Whether the account has the fields a probe needs.
    pub fn is_probeable(&self) -> bool {
        !self.host.trim().is_empty() && self.port != 0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.tag, self.protocol, self.endpoint())
    }
}
