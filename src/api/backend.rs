//! The protected resource behind the gate.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{uri::PathAndQuery, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::{path::PathBuf, sync::Arc};
use tower_http::services::ServeDir;
use tracing::{debug, error};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Reverse proxy to an HTTP service; the request path and query are
    /// appended to the upstream base URL.
    Upstream(Url),
    /// Serve static files from a directory.
    Directory(PathBuf),
}

impl Backend {
    /// Parse and validate an upstream base URL.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse, is not `http`, or carries a query or fragment.
    pub fn upstream(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid upstream URL: {url}"))?;
        if url.scheme() != "http" {
            return Err(anyhow!(
                "unsupported upstream scheme {}, only http is supported",
                url.scheme()
            ));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(anyhow!("upstream URL must not contain a query or fragment"));
        }
        Ok(Self::Upstream(url))
    }

    /// Router answering every path from this backend.
    #[must_use]
    pub fn router(self) -> Router {
        match self {
            Self::Upstream(base) => Router::new()
                .fallback(forward)
                .with_state(Arc::new(Upstream::new(base))),
            Self::Directory(root) => Router::new().fallback_service(ServeDir::new(root)),
        }
    }
}

#[derive(Debug)]
struct Upstream {
    client: Client<HttpConnector, Body>,
    base: String,
}

impl Upstream {
    fn new(base: Url) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            base: base.as_str().trim_end_matches('/').to_string(),
        }
    }

    fn target(&self, uri: &Uri) -> Result<Uri> {
        let path_and_query = uri.path_and_query().map_or("/", PathAndQuery::as_str);
        format!("{}{path_and_query}", self.base)
            .parse()
            .context("invalid upstream request URI")
    }
}

async fn forward(State(upstream): State<Arc<Upstream>>, mut request: Request) -> Response {
    let target = match upstream.target(request.uri()) {
        Ok(target) => target,
        Err(err) => {
            error!("{err:#}");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };
    debug!(%target, "forwarding to upstream");
    *request.uri_mut() = target;

    match upstream.client.request(request).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            error!("Upstream request failed: {err}");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
