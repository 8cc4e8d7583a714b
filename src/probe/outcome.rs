use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal classification of one probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// TCP connect completed within the timeout.
    Reachable,
    /// Connect timed out, was refused, or failed to resolve.
    Unreachable,
    /// The account lacked the fields needed to attempt a connect.
    ParseError,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reachable => write!(f, "reachable"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::ParseError => write!(f, "parse_error"),
        }
    }
}

/// Why a connect attempt failed. The `Display` text becomes `Outcome::detail`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("dns failure: {0}")]
    DnsFailure(String),
    /// Shutdown was requested before this account's connect started.
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    /// Classify a connect error.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            std::io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Other(err.to_string()),
        }
    }
}

/// Reachability verdict for one account in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: ProbeStatus,
    /// Connect time in milliseconds; present only when reachable.
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Outcome {
    pub fn reachable(latency: Duration) -> Self {
        Self {
            status: ProbeStatus::Reachable,
            latency_ms: Some(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)),
            detail: None,
            country: None,
            provider: None,
        }
    }

    pub fn unreachable(err: &ProbeError) -> Self {
        Self {
            status: ProbeStatus::Unreachable,
            latency_ms: None,
            detail: Some(err.to_string()),
            country: None,
            provider: None,
        }
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::ParseError,
            latency_ms: None,
            detail: Some(detail.into()),
            country: None,
            provider: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.status == ProbeStatus::Reachable
    }
}
