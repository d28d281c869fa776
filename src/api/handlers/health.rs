use crate::{gate::Gate, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Serialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    gate: String,
}

// axum handler for health, never behind the gate
#[instrument(skip(gate))]
pub async fn health(method: Method, gate: Extension<Arc<Gate>>) -> impl IntoResponse {
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        // Surface fail-open mode so monitoring can alert on it.
        gate: if gate.is_configured() {
            "protected".to_string()
        } else {
            "unprotected".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .unwrap_or_else(|err| {
            debug!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    (StatusCode::OK, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateConfig;
    use anyhow::Result;
    use axum::body::to_bytes;
    use secrecy::SecretString;

    fn unconfigured_gate() -> Result<Arc<Gate>> {
        let dir = tempfile::tempdir()?;
        let config = GateConfig::new(SecretString::from("s3cret".to_string()))
            .with_login_html_path(dir.path().join("login.html"));
        Ok(Arc::new(Gate::new(config)?))
    }

    #[tokio::test]
    async fn get_reports_gate_state() -> Result<()> {
        let response = health(Method::GET, Extension(unconfigured_gate()?))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["gate"], "unprotected");
        Ok(())
    }

    #[tokio::test]
    async fn options_has_empty_body() -> Result<()> {
        let response = health(Method::OPTIONS, Extension(unconfigured_gate()?))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }
}
