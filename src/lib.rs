//! Periodic reachability checks for VPN account configurations.
//!
//! Each cycle lists account documents from a [`sources::ConfigSource`],
//! extracts canonical [`accounts::Account`]s, probes them with a bounded
//! worker pool, and aggregates per-source results into a
//! [`report::CycleReport`] that is published to notification channels, the
//! status listener, and Prometheus metrics.

pub mod accounts;
pub mod channels;
pub mod config;
pub mod cycle;
pub mod metrics;
pub mod probe;
pub mod report;
pub mod sources;
pub mod status;

pub use accounts::{extract, Account, Extraction, ExtractionError};
pub use config::Config;
pub use cycle::{CycleError, Orchestrator};
pub use probe::{Outcome, ProbeConfig, ProbeStatus, Prober};
pub use report::{CycleReport, SourceResult};
