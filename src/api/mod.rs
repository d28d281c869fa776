use crate::{
    api::{handlers::health, transport::TransportPolicy},
    gate::{self, Gate},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, error, info, Span};
use ulid::Ulid;

pub mod backend;
pub(crate) mod handlers;
pub mod transport;

pub use self::backend::Backend;

const X_REQUEST_ID: &str = "x-request-id";

/// Build the application: `/health` in the clear, everything else through the gate.
#[must_use]
pub fn router(gate: Arc<Gate>, backend: Backend, policy: TransportPolicy) -> Router {
    let protected = backend
        .router()
        .layer(middleware::from_fn_with_state(gate.clone(), gate::protect));

    Router::new()
        .route("/health", get(health).options(health))
        .layer(Extension(gate))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(X_REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    X_REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(middleware::from_fn_with_state(policy, transport::mark)),
        )
}

/// Serve until Ctrl-C or SIGTERM.
/// # Errors
/// Returns an error if the listener cannot bind or the server fails
pub async fn new(port: u16, gate: Gate, backend: Backend, policy: TransportPolicy) -> Result<()> {
    let app = router(Arc::new(gate), backend, policy);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    // Headers are left out: they carry the session cookie.
    debug_span!("http-request", method, path, request_id)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}
