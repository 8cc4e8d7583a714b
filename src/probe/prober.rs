//! Bounded-concurrency TCP prober.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::enrich::{GeoLookup, IpApiLookup};
use super::outcome::{Outcome, ProbeError};
use crate::accounts::Account;
use crate::config::CheckConfig;

/// Default ceiling on simultaneous connects.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub max_concurrency: usize,
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Opens (and immediately closes) a connection to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `host:port`, returning the time the connect took.
    async fn connect(&self, host: &str, port: u16) -> Result<Duration, ProbeError>;
}

/// Plain TCP connector: resolve, then try each address in turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Duration, ProbeError> {
        let addrs: Vec<_> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ProbeError::DnsFailure(e.to_string()))?
            .collect();
        if addrs.is_empty() {
            return Err(ProbeError::DnsFailure(format!("no addresses for {host}")));
        }

        let mut last_err = ProbeError::Other(format!("no address of {host} accepted"));
        for addr in addrs {
            let start = Instant::now();
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    let elapsed = start.elapsed();
                    drop(stream);
                    return Ok(elapsed);
                }
                Err(e) => last_err = ProbeError::from_io(&e),
            }
        }
        Err(last_err)
    }
}

/// Probes accounts with a fixed-size worker pool.
#[derive(Clone)]
pub struct Prober {
    config: ProbeConfig,
    connector: Arc<dyn Connector>,
    geo: Option<Arc<dyn GeoLookup>>,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    pub fn with_connector(config: ProbeConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            geo: None,
        }
    }

    /// Prober for the `[check]` section, with ip-api enrichment when enabled.
    pub fn from_config(check: &CheckConfig) -> anyhow::Result<Self> {
        let prober = Self::new(check.probe_config());
        if check.enrich {
            let geo = IpApiLookup::new(check.geo_api_base.as_str())?;
            return Ok(prober.with_geo_lookup(Arc::new(geo)));
        }
        Ok(prober)
    }

    /// Enrich reachable outcomes with country/provider data.
    pub fn with_geo_lookup(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn config(&self) -> ProbeConfig {
        self.config
    }

    /// Probe every account; `outcomes[i]` always belongs to `accounts[i]`.
    ///
    /// Exactly `min(max_concurrency, accounts.len())` workers pull from a
    /// shared cursor, so no more than `max_concurrency` connects are ever in
    /// flight.
    pub async fn probe(&self, accounts: &[Account]) -> Vec<Outcome> {
        self.probe_until(accounts, &CancellationToken::new()).await
    }

    /// Like [`Prober::probe`], but workers stop taking new accounts once
    /// `cancel` fires. Connects already started run to completion or timeout;
    /// accounts never started get an Unreachable `cancelled` outcome.
    pub async fn probe_until(
        &self,
        accounts: &[Account],
        cancel: &CancellationToken,
    ) -> Vec<Outcome> {
        if accounts.is_empty() {
            return Vec::new();
        }

        let accounts: Arc<[Account]> = accounts.into();
        let slots: Arc<Mutex<Vec<Option<Outcome>>>> =
            Arc::new(Mutex::new(vec![None; accounts.len()]));
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = self.config.max_concurrency.max(1).min(accounts.len());

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let accounts = Arc::clone(&accounts);
            let slots = Arc::clone(&slots);
            let cursor = Arc::clone(&cursor);
            let connector = Arc::clone(&self.connector);
            let geo = self.geo.clone();
            let timeout = self.config.timeout;
            let cancel = cancel.clone();
            pool.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(account) = accounts.get(index) else {
                        break;
                    };
                    let outcome =
                        probe_one(connector.as_ref(), geo.as_deref(), account, timeout).await;
                    slots.lock()[index] = Some(outcome);
                }
            });
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "probe worker exited abnormally");
            }
        }

        let filled = std::mem::take(&mut *slots.lock());
        let cancelled = cancel.is_cancelled();
        filled
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    if cancelled {
                        Outcome::unreachable(&ProbeError::Cancelled)
                    } else {
                        Outcome::unreachable(&ProbeError::Other("probe worker aborted".into()))
                    }
                })
            })
            .collect()
    }
}

async fn probe_one(
    connector: &dyn Connector,
    geo: Option<&dyn GeoLookup>,
    account: &Account,
    timeout: Duration,
) -> Outcome {
    if !account.is_probeable() {
        return Outcome::parse_error(format!("account {} has no usable host/port", account.tag));
    }

    let result = tokio::time::timeout(timeout, connector.connect(&account.host, account.port))
        .await
        .unwrap_or(Err(ProbeError::Timeout));

    match result {
        Ok(latency) => {
            let mut outcome = Outcome::reachable(latency);
            if let Some(geo) = geo {
                if let Some(info) = geo.lookup(&account.host).await {
                    outcome.country = info.country;
                    outcome.provider = info.provider;
                }
            }
            tracing::debug!(account = %account, latency_ms = ?outcome.latency_ms, "reachable");
            outcome
        }
        Err(e) => {
            tracing::debug!(account = %account, error = %e, "unreachable");
            Outcome::unreachable(&e)
        }
    }
}
