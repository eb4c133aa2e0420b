//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all dispatch handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener, shut down gracefully
//! - Run each exchange through the live deployment on a blocking worker
//! - Resume suspended chains, possibly on another worker

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::deployment::{Deployment, DeploymentHandle};
use crate::dispatch::{AbortSignal, DispatchError, Exchange, Outcome};
use crate::http::request::{into_request, request_id, MakeRequestUuidV4};
use crate::lifecycle::Shutdown;

/// Largest request body buffered into an exchange.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub deployment: DeploymentHandle,
}

#[derive(Debug, Error)]
enum ServeError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("dispatch worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// HTTP host for one deployment handle.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, deployment: DeploymentHandle) -> Self {
        let state = AppState { deployment };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "http",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = request_id(req.headers()).unwrap_or("-"),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Aborts the exchange if the request future is dropped mid-dispatch.
struct AbortOnDrop {
    signal: AbortSignal,
    armed: bool,
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Client went away, aborting exchange");
            self.signal.abort();
        }
    }
}

async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let id = request_id(request.headers()).map(str::to_string);
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Request body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let deployment = state.deployment.load();
    let mut exchange = deployment.exchange(into_request(parts, body));
    if let Some(id) = id {
        exchange = exchange.with_request_id(id);
    }

    let mut guard = AbortOnDrop {
        signal: exchange.abort_signal(),
        armed: true,
    };
    let result = serve_exchange(deployment, exchange).await;
    guard.armed = false;

    match result {
        Ok(Some(exchange)) => into_response(exchange),
        Ok(None) => {
            tracing::info!("Exchange aborted");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Request failed fatally");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Service the exchange, resuming it on a worker each time it suspends.
///
/// `None` means the exchange was aborted.
async fn serve_exchange(
    deployment: Arc<Deployment>,
    exchange: Exchange,
) -> Result<Option<Exchange>, ServeError> {
    let (mut exchange, mut outcome) =
        on_worker(deployment.clone(), exchange, |d, ex| d.service(ex)).await?;

    loop {
        match outcome {
            Outcome::Completed => return Ok(Some(exchange)),
            Outcome::Aborted => return Ok(None),
            Outcome::Suspended(continuation) => {
                tracing::debug!(
                    path = %continuation.path(),
                    dispatch = %continuation.dispatch_type(),
                    "Resuming suspended chain"
                );
                let (next_exchange, next_outcome) = on_worker(deployment.clone(), exchange, move |d, ex| {
                    d.resume(continuation, ex)
                })
                .await?;
                exchange = next_exchange;
                outcome = next_outcome;
            }
        }
    }
}

async fn on_worker<F>(
    deployment: Arc<Deployment>,
    mut exchange: Exchange,
    step: F,
) -> Result<(Exchange, Outcome), ServeError>
where
    F: FnOnce(&Deployment, &mut Exchange) -> Result<Outcome, DispatchError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        step(&deployment, &mut exchange).map(|outcome| (exchange, outcome))
    })
    .await?;
    Ok(result?)
}

fn into_response(exchange: Exchange) -> Response {
    let (status, headers, body) = exchange.into_response().into_parts();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
