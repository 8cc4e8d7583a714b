//! Connectivity probing for extracted accounts.
//!
//! A bounded worker pool performs one TCP connect per account and records an
//! [`Outcome`] at the account's original position. Reachable outcomes can be
//! enriched with country/provider data through an optional [`GeoLookup`].

pub mod enrich;
pub mod outcome;
pub mod prober;

pub use enrich::{GeoInfo, GeoLookup, IpApiLookup};
pub use outcome::{Outcome, ProbeError, ProbeStatus};
pub use prober::{Connector, ProbeConfig, Prober, TcpConnector};
