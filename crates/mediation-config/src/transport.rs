use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ConfigFetchError {
    #[error("network error fetching remote config: {0}")]
    Network(String),
    #[error("remote config body could not be parsed: {0}")]
    Malformed(String),
}

/// Out-of-scope-by-design HTTP seam for the config gate (§1, §6): the core
/// ships no concrete HTTP client, only this trait. A real implementation
/// supplies call/connect/read/write timeouts, gzip for uploads, and
/// optional TLS pinning per the host's feature-flag-supplied pin map.
#[async_trait]
pub trait ConfigTransport: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, ConfigFetchError>;
}
