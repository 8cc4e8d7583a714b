//! Where account documents come from.
//!
//! A [`ConfigSource`] lists source ids and fetches their raw bytes. GitHub
//! repository contents and local directories are supported.

pub mod github;
pub mod local;
pub mod traits;

pub use github::GithubSource;
pub use local::LocalDirSource;
pub use traits::{is_config_file, ConfigSource, SourceFetchError};

use std::sync::Arc;

use crate::config::SourceConfig;

/// Build the configured source; GitHub takes precedence over a local dir.
pub fn from_config(config: &SourceConfig) -> anyhow::Result<Arc<dyn ConfigSource>> {
    match (&config.github, &config.local_dir) {
        (Some(github), _) => Ok(Arc::new(GithubSource::new(github)?)),
        (None, Some(dir)) => Ok(Arc::new(LocalDirSource::new(dir))),
        (None, None) => anyhow::bail!("no config source configured"),
    }
}
