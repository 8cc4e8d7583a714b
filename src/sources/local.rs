//! Local directory (or explicit file list) as a config source.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::traits::{is_config_file, ConfigSource, SourceFetchError};

/// Reads account documents from disk. Source ids are paths relative to the
/// root directory, or the paths exactly as given for an explicit file list.
pub struct LocalDirSource {
    name: String,
    root: Option<PathBuf>,
    files: Vec<PathBuf>,
}

impl LocalDirSource {
    /// Every `.json`/`.txt` file directly inside `root`, sorted by name.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: format!("dir:{}", root.display()),
            root: Some(root),
            files: Vec::new(),
        }
    }

    /// Exactly these files, in the given order, whatever their extension.
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self {
            name: "files".to_string(),
            root: None,
            files,
        }
    }

    fn resolve(&self, source_id: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(source_id),
            None => PathBuf::from(source_id),
        }
    }
}

async fn list_dir(root: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(root)
        .await
        .with_context(|| format!("failed to read config directory {}", root.display()))?;
    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_config_file(&name) {
            ids.push(name);
        }
    }
    ids.sort();
    Ok(ids)
}

#[async_trait]
impl ConfigSource for LocalDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self) -> Result<Vec<String>> {
        match &self.root {
            Some(root) => list_dir(root).await,
            None => Ok(self
                .files
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect()),
        }
    }

    async fn fetch(&self, source_id: &str) -> Result<Vec<u8>, SourceFetchError> {
        let path = self.resolve(source_id);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceFetchError::NotFound(path.display().to_string()),
            _ => SourceFetchError::Transient(format!("{}: {e}", path.display())),
        })
    }
}
