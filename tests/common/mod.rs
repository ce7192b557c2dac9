//! Shared utilities for the tunnel integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::header::{HeaderMap, CONTENT_TYPE};
use axum::http::{Request, Response, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;

use crypto_sidecar::config::{ProxyConfig, ProxyMode};
use crypto_sidecar::lifecycle::shutdown::{self, ShutdownHandle};
use crypto_sidecar::secret::SecretResolver;
use crypto_sidecar::SidecarServer;

/// One request as observed by the mock upstream application.
pub struct SeenRequest {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Everything the mock upstream observed.
#[derive(Default)]
pub struct UpstreamLog {
    pub requests: Mutex<Vec<SeenRequest>>,
}

/// Start a mock application that records each request and echoes the body
/// back with the request's Content-Type.
pub async fn start_echo_upstream() -> (SocketAddr, Arc<UpstreamLog>) {
    let log = Arc::new(UpstreamLog::default());
    let captured = log.clone();

    let app = Router::new().fallback(move |req: Request<Body>| {
        let captured = captured.clone();
        async move {
            let (parts, body) = req.into_parts();
            let bytes = to_bytes(body, usize::MAX).await.unwrap();
            captured.requests.lock().unwrap().push(SeenRequest {
                headers: parts.headers.clone(),
                body: bytes.to_vec(),
            });

            let mut response = Response::new(Body::from(bytes));
            if let Some(ct) = parts.headers.get(CONTENT_TYPE) {
                response.headers_mut().insert(CONTENT_TYPE, ct.clone());
            }
            response
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

/// A running sidecar; dropping the handle shuts the server down.
pub struct SidecarHandle {
    pub addr: SocketAddr,
    _shutdown: ShutdownHandle,
}

/// Start a sidecar with a fixed word in front of `upstream`.
pub async fn start_sidecar(mode: ProxyMode, upstream: SocketAddr, word: &str) -> SidecarHandle {
    start_sidecar_with_resolver(mode, upstream, Arc::new(SecretResolver::fixed(word))).await
}

/// Start a sidecar with an explicit resolver in front of `upstream`.
pub async fn start_sidecar_with_resolver(
    mode: ProxyMode,
    upstream: SocketAddr,
    resolver: Arc<SecretResolver>,
) -> SidecarHandle {
    let mut config = ProxyConfig::new(mode, format!("http://{upstream}").parse().unwrap());
    config.listener.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let listener = TcpListener::bind(config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (handle, signal) = shutdown::channel();
    let server = SidecarServer::new(config, resolver);
    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    SidecarHandle {
        addr,
        _shutdown: handle,
    }
}

/// A plain HTTP client that ignores proxy environment variables.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Build one gRPC length-prefixed frame.
#[allow(dead_code)]
pub fn grpc_frame(flag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![flag];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Split a byte sequence back into (flag, payload) frames.
#[allow(dead_code)]
pub fn parse_grpc_frames(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let flag = bytes[0];
        let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        frames.push((flag, bytes[5..5 + len].to_vec()));
        bytes = &bytes[5 + len..];
    }
    frames
}

/// Behavior knob for the flagd stub: 0 = "alpha", 1 = error, 2 = "".
#[allow(dead_code)]
pub async fn start_flagd_stub(behavior: Arc<AtomicU8>) -> SocketAddr {
    let app = Router::new().route(
        "/flagd.evaluation.v1.Service/ResolveString",
        post(move || {
            let behavior = behavior.clone();
            async move {
                match behavior.load(Ordering::SeqCst) {
                    0 => (StatusCode::OK, Json(serde_json::json!({"value": "alpha"}))),
                    1 => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({"code": "general"})),
                    ),
                    _ => (StatusCode::OK, Json(serde_json::json!({"value": ""}))),
                }
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
