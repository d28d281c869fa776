//! Tags each request with whether the client connection was encrypted.
//!
//! TLS is terminated in front of this service, so the only signal available is
//! `X-Forwarded-Proto`, honoured only when the operator says the proxy sets it.

use crate::gate::Transport;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Clone, Copy, Default)]
pub struct TransportPolicy {
    pub trust_forwarded_proto: bool,
}

impl TransportPolicy {
    #[must_use]
    pub fn classify(self, headers: &HeaderMap) -> Transport {
        Transport {
            encrypted: self.trust_forwarded_proto && forwarded_https(headers),
        }
    }
}

pub async fn mark(
    State(policy): State<TransportPolicy>,
    mut request: Request,
    next: Next,
) -> Response {
    let transport = policy.classify(request.headers());
    request.extensions_mut().insert(transport);
    next.run(request).await
}

// The first value describes the client-facing hop.
fn forwarded_https(headers: &HeaderMap) -> bool {
    headers
        .get(X_FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}
