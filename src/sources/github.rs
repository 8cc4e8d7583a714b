//! GitHub repository contents as a config source.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;

use super::traits::{is_config_file, ConfigSource, SourceFetchError};
use crate::config::GithubConfig;

const LIST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("vpn-checker/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ContentEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
    #[serde(default)]
    download_url: Option<String>,
}

/// Lists and fetches `.json`/`.txt` files under a repository path through
/// the contents API.
pub struct GithubSource {
    name: String,
    api_base: String,
    owner: String,
    repo: String,
    path: String,
    branch: Option<String>,
    token: Option<String>,
    http: reqwest::Client,
}

impl GithubSource {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(LIST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            name: format!("github:{}/{}", config.owner, config.repo),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            path: config.path.trim_matches('/').to_string(),
            branch: config.branch.clone().filter(|b| !b.is_empty()),
            token: config.token.clone().filter(|t| !t.is_empty()),
            http,
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            encoded.join("/")
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }
        request
    }

    async fn fetch_raw(&self, source_id: &str, url: &str) -> Result<Vec<u8>, SourceFetchError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SourceFetchError::Transient(format!("{source_id}: {e}")))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(SourceFetchError::NotFound(source_id.to_string())),
            status if !status.is_success() => Err(SourceFetchError::Transient(format!(
                "{source_id}: raw download returned {status}"
            ))),
            _ => resp
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| SourceFetchError::Transient(format!("{source_id}: {e}"))),
        }
    }
}

#[async_trait]
impl ConfigSource for GithubSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self) -> Result<Vec<String>> {
        let url = self.contents_url(&self.path);
        let resp = self
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GitHub listing request to {url} failed"))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            bail!("path '{}' not found in {}/{}", self.path, self.owner, self.repo);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GitHub listing failed: status={status}, body={body}");
        }

        let body: serde_json::Value = resp.json().await.context("invalid GitHub listing JSON")?;
        let entries: Vec<ContentEntry> = match body {
            serde_json::Value::Array(_) => serde_json::from_value(body)?,
            serde_json::Value::Object(_) => vec![serde_json::from_value(body)?],
            other => bail!("unexpected GitHub listing response: {other}"),
        };

        let ids: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.kind == "file" && is_config_file(&entry.path))
            .map(|entry| entry.path)
            .collect();
        tracing::debug!(source = %self.name, files = ids.len(), "listed GitHub contents");
        Ok(ids)
    }

    async fn fetch(&self, source_id: &str) -> Result<Vec<u8>, SourceFetchError> {
        let resp = self
            .get(&self.contents_url(source_id))
            .send()
            .await
            .map_err(|e| SourceFetchError::Transient(format!("{source_id}: {e}")))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceFetchError::NotFound(source_id.to_string()));
        }
        if !status.is_success() {
            return Err(SourceFetchError::Transient(format!(
                "{source_id}: GitHub returned {status}"
            )));
        }

        let file: FileContent = resp
            .json()
            .await
            .map_err(|e| SourceFetchError::Transient(format!("{source_id}: invalid response: {e}")))?;

        // Files over 1 MB come back without inline content.
        if file.content.is_empty() {
            if let Some(url) = file.download_url.as_deref() {
                return self.fetch_raw(source_id, url).await;
            }
        }

        if file.encoding == "base64" {
            let cleaned: String = file.content.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD.decode(cleaned).map_err(|e| {
                SourceFetchError::Transient(format!("{source_id}: invalid base64 content: {e}"))
            })
        } else {
            Ok(file.content.into_bytes())
        }
    }
}
