use async_trait::async_trait;

/// File extensions treated as account documents.
const CONFIG_EXTENSIONS: &[&str] = &["json", "txt"];

/// Why one source's bytes could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceFetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Whether a listed file name looks like an account document.
pub fn is_config_file(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            CONFIG_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// A collection of account documents.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Human-readable source name for logs.
    fn name(&self) -> &str;

    /// Source ids in a stable order. A listing failure aborts the cycle.
    async fn list(&self) -> anyhow::Result<Vec<String>>;

    /// Raw bytes of one source.
    async fn fetch(&self, source_id: &str) -> Result<Vec<u8>, SourceFetchError>;
}
