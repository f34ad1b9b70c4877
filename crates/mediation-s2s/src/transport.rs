use crate::request::S2sRequest;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum S2sTransportError {
    #[error("network error: {0}")]
    Network(String),
}

pub struct S2sTransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Out-of-scope HTTP seam for the S2S auction (§1, §6): the core ships no
/// concrete HTTP client, only this trait, paired with [`crate::S2sClient`]
/// which interprets status codes and body into the normalized taxonomy.
#[async_trait]
pub trait S2sTransport: Send + Sync {
    async fn request(&self, req: &S2sRequest) -> Result<S2sTransportResponse, S2sTransportError>;
}
