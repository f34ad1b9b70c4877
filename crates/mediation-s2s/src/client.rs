use crate::error::S2sErrorKind;
use crate::request::S2sRequest;
use crate::response::{S2sOutcome, S2sWireBody};
use crate::transport::{S2sTransport, S2sTransportError};
use std::sync::Arc;
use std::time::Duration;

/// Single-shot server-side bid request, returning a normalized result or
/// one of the fixed §4.5 error taxonomy members. Holds no state of its own
/// between calls.
pub struct S2sClient {
    transport: Arc<dyn S2sTransport>,
}

impl S2sClient {
    pub fn new(transport: Arc<dyn S2sTransport>) -> Self {
        Self { transport }
    }

    #[tracing::instrument(skip(self, request), fields(placement = %request.placement_id))]
    pub async fn request(&self, request: &S2sRequest, timeout: Duration) -> Result<S2sOutcome, S2sErrorKind> {
        let response = match tokio::time::timeout(timeout, self.transport.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(S2sTransportError::Network(reason))) => return Err(S2sErrorKind::NetworkError(reason)),
            Err(_elapsed) => return Err(S2sErrorKind::Timeout),
        };

        match response.status {
            200..=299 => {
                let body: S2sWireBody = serde_json::from_slice(&response.body)
                    .map_err(|err| S2sErrorKind::Error(format!("malformed s2s response body: {err}")))?;
                if body.no_fill {
                    Ok(S2sOutcome::NoFill)
                } else if body.below_floor {
                    Ok(S2sOutcome::BelowFloor)
                } else if let Some(bid) = body.bid {
                    Ok(S2sOutcome::Fill(bid))
                } else {
                    Err(S2sErrorKind::Error("s2s response had neither a fill nor a no_fill marker".to_string()))
                }
            }
            400..=499 => Err(S2sErrorKind::Status4xx(response.status)),
            500..=599 => Err(S2sErrorKind::Status5xx(response.status)),
            other => Err(S2sErrorKind::Error(format!("unexpected s2s status {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ConsentSignals;
    use crate::response::S2sBidResponse;
    use crate::transport::S2sTransportResponse;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn request() -> S2sRequest {
        S2sRequest {
            publisher_id: "pub-1".to_string(),
            placement_id: "p1".to_string(),
            floor_cpm: None,
            adapters: vec!["a".to_string()],
            metadata: BTreeMap::new(),
            auction_type: "rtb".to_string(),
            consent: ConsentSignals::default(),
        }
    }

    struct ScriptedTransport(Result<S2sTransportResponse, S2sTransportError>);

    #[async_trait]
    impl S2sTransport for ScriptedTransport {
        async fn request(&self, _req: &S2sRequest) -> Result<S2sTransportResponse, S2sTransportError> {
            match &self.0 {
                Ok(resp) => Ok(S2sTransportResponse { status: resp.status, body: resp.body.clone() }),
                Err(S2sTransportError::Network(msg)) => Err(S2sTransportError::Network(msg.clone())),
            }
        }
    }

    #[tokio::test]
    async fn no_fill_body_maps_to_no_fill_outcome() {
        let body = serde_json::json!({ "no_fill": true }).to_string().into_bytes();
        let client = S2sClient::new(Arc::new(ScriptedTransport(Ok(S2sTransportResponse { status: 200, body }))));
        let outcome = client.request(&request(), Duration::from_millis(500)).await.unwrap();
        assert!(matches!(outcome, S2sOutcome::NoFill));
    }

    #[tokio::test]
    async fn fill_body_maps_to_fill_outcome() {
        let bid = S2sBidResponse { adapter: "s2s".to_string(), ecpm: 4.2, ttl_ms: Some(60_000), creative: vec![], metadata: BTreeMap::new() };
        let body = serde_json::json!({ "no_fill": false, "below_floor": false, "bid": bid }).to_string().into_bytes();
        let client = S2sClient::new(Arc::new(ScriptedTransport(Ok(S2sTransportResponse { status: 200, body }))));
        let outcome = client.request(&request(), Duration::from_millis(500)).await.unwrap();
        assert_eq!(outcome, S2sOutcome::Fill(bid));
    }

    #[tokio::test]
    async fn status_5xx_maps_to_status_5xx_error() {
        let client = S2sClient::new(Arc::new(ScriptedTransport(Ok(S2sTransportResponse { status: 503, body: vec![] }))));
        let err = client.request(&request(), Duration::from_millis(500)).await.unwrap_err();
        assert_eq!(err, S2sErrorKind::Status5xx(503));
    }

    #[tokio::test]
    async fn status_4xx_maps_to_status_4xx_error() {
        let client = S2sClient::new(Arc::new(ScriptedTransport(Ok(S2sTransportResponse { status: 403, body: vec![] }))));
        let err = client.request(&request(), Duration::from_millis(500)).await.unwrap_err();
        assert_eq!(err, S2sErrorKind::Status4xx(403));
    }

    #[tokio::test]
    async fn network_error_is_surfaced_as_network_error() {
        let client = S2sClient::new(Arc::new(ScriptedTransport(Err(S2sTransportError::Network("dns".to_string())))));
        let err = client.request(&request(), Duration::from_millis(500)).await.unwrap_err();
        assert_eq!(err, S2sErrorKind::NetworkError("dns".to_string()));
    }

    #[tokio::test]
    async fn below_floor_is_recoverable_as_no_fill() {
        assert!(S2sErrorKind::BelowFloor.is_recoverable_as_no_fill());
        assert!(S2sErrorKind::NoFill.is_recoverable_as_no_fill());
        assert!(!S2sErrorKind::Timeout.is_recoverable_as_no_fill());
    }
}
