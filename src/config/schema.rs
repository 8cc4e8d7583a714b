//! Configuration schema: TOML file plus environment overlay.
//!
//! Load order: file (explicit `--config` path, else
//! `~/.vpn-checker/config.toml` when present) → environment variables →
//! [`Config::validate`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::probe::enrich::DEFAULT_IP_API_BASE;
use crate::probe::ProbeConfig;

const DEFAULT_GITHUB_API: &str = "https://api.github.com";
const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
const DEFAULT_TWILIO_API: &str = "https://api.twilio.com";

fn default_github_api() -> String {
    DEFAULT_GITHUB_API.into()
}

fn default_telegram_api() -> String {
    DEFAULT_TELEGRAM_API.into()
}

fn default_twilio_api() -> String {
    DEFAULT_TWILIO_API.into()
}

/// Default config path: `~/.vpn-checker/config.toml`.
pub fn default_config_path() -> PathBuf {
    let base = directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(".vpn-checker").join("config.toml")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub check: CheckConfig,
    pub notify: NotifyConfig,
    pub telegram: Option<TelegramConfig>,
    pub whatsapp: Option<WhatsAppConfig>,
    pub status: StatusConfig,
}

/// Where account documents are read from. GitHub wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub github: Option<GithubConfig>,
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    /// Directory (or single file) inside the repository; empty = root.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_api")]
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub interval_minutes: u64,
    pub max_concurrency: usize,
    pub timeout_secs: u64,
    /// Look up country/provider for reachable endpoints.
    pub enrich: bool,
    pub geo_api_base: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            max_concurrency: 3,
            timeout_secs: 8,
            enrich: false,
            geo_api_base: DEFAULT_IP_API_BASE.into(),
        }
    }
}

impl CheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            max_concurrency: self.max_concurrency,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub send_summary: bool,
    /// Suppress the summary when nothing failed.
    pub send_only_failures: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            send_summary: true,
            send_only_failures: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender, e.g. `whatsapp:+14155238886`.
    pub from: String,
    pub to: String,
    #[serde(default = "default_twilio_api")]
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}"))
}

fn parse_env_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid {key}={raw:?}: expected true/false"),
    }
}

impl Config {
    /// Parse TOML text without environment overlay or validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("invalid config TOML: {e}"))
    }

    /// Load, overlay the process environment, and validate.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml(&content)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => {
                let default = default_config_path();
                match std::fs::read_to_string(&default) {
                    Ok(content) => Self::from_toml(&content)
                        .with_context(|| format!("failed to parse {}", default.display()))?,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                    Err(e) => {
                        return Err(e)
                            .with_context(|| format!("failed to read {}", default.display()))
                    }
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from an environment lookup (file values lose).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let (Some(owner), Some(repo)) = (get("GITHUB_OWNER"), get("GITHUB_REPO")) {
            let github = self.source.github.get_or_insert_with(|| GithubConfig {
                owner: String::new(),
                repo: String::new(),
                path: String::new(),
                branch: None,
                token: None,
                api_base: default_github_api(),
            });
            github.owner = owner;
            github.repo = repo;
        }
        if let Some(github) = self.source.github.as_mut() {
            if let Some(token) = get("GITHUB_TOKEN") {
                github.token = Some(token);
            }
            if let Some(path) = get("GITHUB_PATH") {
                github.path = path;
            }
        }

        if let Some(raw) = get("CHECK_INTERVAL_MINUTES") {
            self.check.interval_minutes = parse_env("CHECK_INTERVAL_MINUTES", &raw)?;
        }
        if let Some(raw) = get("MAX_CONCURRENT_TESTS") {
            self.check.max_concurrency = parse_env("MAX_CONCURRENT_TESTS", &raw)?;
        }
        if let Some(raw) = get("TIMEOUT_SECONDS") {
            self.check.timeout_secs = parse_env("TIMEOUT_SECONDS", &raw)?;
        }
        if let Some(raw) = get("SEND_SUMMARY") {
            self.notify.send_summary = parse_env_bool("SEND_SUMMARY", &raw)?;
        }
        if let Some(raw) = get("SEND_ONLY_FAILURES") {
            self.notify.send_only_failures = parse_env_bool("SEND_ONLY_FAILURES", &raw)?;
        }

        let (token, chat_id) = (get("TELEGRAM_TOKEN"), get("TELEGRAM_CHAT_ID"));
        if let Some(telegram) = self.telegram.as_mut() {
            if let Some(token) = token {
                telegram.bot_token = token;
            }
            if let Some(chat_id) = chat_id {
                telegram.chat_id = chat_id;
            }
        } else if let (Some(bot_token), Some(chat_id)) = (token, chat_id) {
            self.telegram = Some(TelegramConfig {
                bot_token,
                chat_id,
                api_base: default_telegram_api(),
            });
        }

        let (sid, auth, from, to) = (
            get("TWILIO_SID"),
            get("TWILIO_TOKEN"),
            get("WHATSAPP_FROM"),
            get("WHATSAPP_TO"),
        );
        if let Some(whatsapp) = self.whatsapp.as_mut() {
            if let Some(sid) = sid {
                whatsapp.account_sid = sid;
            }
            if let Some(auth) = auth {
                whatsapp.auth_token = auth;
            }
            if let Some(from) = from {
                whatsapp.from = from;
            }
            if let Some(to) = to {
                whatsapp.to = to;
            }
        } else if let (Some(account_sid), Some(auth_token), Some(from), Some(to)) =
            (sid, auth, from, to)
        {
            self.whatsapp = Some(WhatsAppConfig {
                account_sid,
                auth_token,
                from,
                to,
                api_base: default_twilio_api(),
            });
        }

        if let Some(raw) = get("PORT") {
            self.status.port = parse_env("PORT", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.check.interval_minutes == 0 {
            bail!("check.interval_minutes must be greater than 0");
        }
        if self.check.max_concurrency == 0 {
            bail!("check.max_concurrency must be greater than 0");
        }
        if self.check.timeout_secs == 0 {
            bail!("check.timeout_secs must be greater than 0");
        }
        match (&self.source.github, &self.source.local_dir) {
            (Some(github), _) => {
                if github.owner.trim().is_empty() || github.repo.trim().is_empty() {
                    bail!("source.github requires owner and repo");
                }
            }
            (None, Some(dir)) => {
                if dir.as_os_str().is_empty() {
                    bail!("source.local_dir must not be empty");
                }
            }
            (None, None) => {
                bail!("no config source: set [source.github] (or GITHUB_OWNER/GITHUB_REPO) or source.local_dir")
            }
        }
        if let Some(telegram) = &self.telegram {
            if telegram.bot_token.trim().is_empty() || telegram.chat_id.trim().is_empty() {
                bail!("telegram requires bot_token and chat_id");
            }
        }
        if let Some(whatsapp) = &self.whatsapp {
            if [&whatsapp.account_sid, &whatsapp.auth_token, &whatsapp.from, &whatsapp.to]
                .iter()
                .any(|v| v.trim().is_empty())
            {
                bail!("whatsapp requires account_sid, auth_token, from and to");
            }
        }
        Ok(())
    }
}
