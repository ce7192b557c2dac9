//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Serve HTTP/1.1 and cleartext HTTP/2 (h2c) on one listener
//! - Dial the upstream as HTTP/2 prior-knowledge cleartext
//! - Wire the director and response rewriter around the upstream call
//! - Map upstream failures to 502 with the upstream URL logged
//!
//! # Design Decisions
//! - Connections are served through the auto protocol builder so gRPC and
//!   REST clients share the port; header read timeout 10 s, no total request
//!   timeout (gRPC streams are long-lived)
//! - One h2c client for every upstream call, mirroring the tunnel's
//!   TLS-bypassing transport

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{self, HeaderValue};
use axum::http::{Request, Response, StatusCode};
use axum::routing::any;
use axum::Router;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::director::{self, Decision};
use crate::http::headers::is_grpc;
use crate::http::response;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::secret::SecretResolver;

const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub resolver: Arc<SecretResolver>,
    pub client: Client<HttpConnector, Body>,
}

impl AppState {
    pub fn new(config: Arc<ProxyConfig>, resolver: Arc<SecretResolver>) -> Self {
        // h2c prior knowledge for every upstream call; TLS is bypassed
        let client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .build(HttpConnector::new());
        Self {
            config,
            resolver,
            client,
        }
    }
}

/// HTTP server for the sidecar.
pub struct SidecarServer {
    router: Router,
    max_connections: usize,
}

impl SidecarServer {
    /// Create a new server with the given configuration and word resolver.
    pub fn new(config: Arc<ProxyConfig>, resolver: Arc<SecretResolver>) -> Self {
        let max_connections = config.listener.max_connections;
        let state = AppState::new(config, resolver);
        Self {
            router: Self::build_router(state),
            max_connections,
        }
    }

    /// Build the Axum router: every path goes through the proxy handler.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::debug_span!(
                        "request",
                        request_id = %uuid::Uuid::new_v4(),
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                }),
            )
    }

    /// Serve connections from the listener until shutdown fires.
    ///
    /// Accepted sockets pass an admission semaphore before a serving task is
    /// spawned; once `max_connections` are in flight the accept loop pauses
    /// until a connection finishes.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> std::io::Result<()> {
        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(HEADER_READ_TIMEOUT);
        builder.http2().timer(TokioTimer::new());
        let builder = Arc::new(builder);

        let admission = Arc::new(Semaphore::new(self.max_connections));

        tracing::info!(
            address = %listener.local_addr()?,
            max_connections = self.max_connections,
            "sidecar listening"
        );

        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let Ok(permit) = admission.clone().acquire_owned().await else {
                        break;
                    };
                    let builder = builder.clone();
                    let service = TowerToHyperService::new(self.router.clone());
                    tokio::spawn(async move {
                        let _permit = permit;
                        let io = TokioIo::new(stream);
                        if let Err(err) = builder.serve_connection_with_upgrades(io, service).await {
                            tracing::debug!(peer = %peer, error = %err, "connection ended with error");
                        }
                    });
                }
            }
        }
        Ok(())
    }
}

/// Main proxy handler: director, upstream call, response rewrite.
async fn proxy_handler(State(state): State<AppState>, req: Request<Body>) -> Response<Body> {
    let started = Instant::now();
    let mode = state.config.mode;
    // classify before the director may overwrite Content-Type
    let request_was_grpc = is_grpc(req.headers());

    let response = match director::prepare(&state, req).await {
        Decision::Deny(denial) => {
            tracing::debug!(reason = denial.message(), "request denied before upstream");
            synthesize(denial.status(), denial.message())
        }
        Decision::Forward(outbound) => match state.client.request(outbound).await {
            Ok(upstream_response) => {
                let upstream_response = upstream_response.map(Body::new);
                match response::transform(&state, request_was_grpc, upstream_response).await {
                    Ok(rewritten) => rewritten,
                    Err(err) => {
                        tracing::error!(
                            upstream = %state.config.upstream,
                            error = %err,
                            "response rewrite failed"
                        );
                        synthesize(StatusCode::BAD_GATEWAY, "proxy error")
                    }
                }
            }
            Err(err) => {
                tracing::error!(
                    upstream = %state.config.upstream,
                    error = %err,
                    "upstream request failed"
                );
                synthesize(StatusCode::BAD_GATEWAY, "proxy error")
            }
        },
    };

    metrics::record_request(mode.as_str(), response.status().as_u16(), started.elapsed());
    response
}

/// A synthesized plain-text response with a fresh header map.
fn synthesize(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(message.len()));
    response
}
