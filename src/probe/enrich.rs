//! Country/provider enrichment for reachable endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Default ip-api.com endpoint (free tier is HTTP only).
pub const DEFAULT_IP_API_BASE: &str = "http://ip-api.com";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Location data for one endpoint; either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub provider: Option<String>,
}

/// Looks up where an endpoint lives. Failures yield `None`, never an error.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, host: &str) -> Option<GeoInfo>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// `ip-api.com` JSON lookup.
pub struct IpApiLookup {
    base_url: String,
    client: reqwest::Client,
}

impl IpApiLookup {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build geo lookup client: {e}"))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn lookup_url(&self, host: &str) -> String {
        format!(
            "{}/json/{}?fields=status,message,country,isp",
            self.base_url,
            urlencoding::encode(host)
        )
    }

    async fn fetch(&self, host: &str) -> anyhow::Result<IpApiResponse> {
        let resp = self
            .client
            .get(self.lookup_url(host))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl GeoLookup for IpApiLookup {
    async fn lookup(&self, host: &str) -> Option<GeoInfo> {
        match self.fetch(host).await {
            Ok(body) if body.status == "success" => Some(GeoInfo {
                country: body.country.filter(|c| !c.is_empty()),
                provider: body.isp.filter(|p| !p.is_empty()),
            }),
            Ok(body) => {
                tracing::debug!(host, message = ?body.message, "geo lookup rejected");
                None
            }
            Err(e) => {
                tracing::debug!(host, error = %e, "geo lookup failed");
                None
            }
        }
    }
}
