//! flagd evaluation API client.
//!
//! Talks to the flagd `ResolveString` endpoint over HTTP+JSON (the evaluation
//! service exposes it on the same port as gRPC). The client carries its own
//! request timeout; callers add no further deadline.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const RESOLVE_STRING_PATH: &str = "/flagd.evaluation.v1.Service/ResolveString";
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before each startup probe attempt; the last failure is final.
const STARTUP_DELAYS_MS: [u64; 7] = [0, 1_000, 2_000, 4_000, 8_000, 16_000, 32_000];

/// Errors from the flagd client.
#[derive(Debug, Error)]
pub enum FlagdError {
    /// The provider was unreachable or the request failed in transit.
    #[error("flagd request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered but could not evaluate the flag.
    #[error("flagd evaluation error (status {status}): {message}")]
    Evaluation { status: u16, message: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveStringRequest<'a> {
    flag_key: &'a str,
    context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ResolveStringResponse {
    #[serde(default)]
    value: String,
}

/// Client for the flagd string-flag evaluation endpoint.
pub struct FlagdClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FlagdClient {
    pub fn new(host: &str, port: u16) -> Result<Self, FlagdError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("http://{host}:{port}{RESOLVE_STRING_PATH}"),
        })
    }

    /// Evaluate the string flag `key`.
    pub async fn resolve_string(&self, key: &str) -> Result<String, FlagdError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&ResolveStringRequest {
                flag_key: key,
                context: serde_json::Map::new(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FlagdError::Evaluation {
                status: status.as_u16(),
                message,
            });
        }

        let body: ResolveStringResponse = response.json().await?;
        Ok(body.value)
    }

    /// Probe the provider until it answers, walking [`STARTUP_DELAYS_MS`]
    /// with up to 10% jitter on each delay. An evaluation error still proves
    /// the provider is up, so it counts as ready; only transport failures
    /// keep retrying, and exhausting the schedule returns the last one.
    pub async fn wait_ready(&self, key: &str) -> Result<(), FlagdError> {
        let mut attempt = 0;
        loop {
            let base_ms = STARTUP_DELAYS_MS[attempt];
            if base_ms > 0 {
                let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 10);
                tokio::time::sleep(Duration::from_millis(base_ms + jitter_ms)).await;
            }
            match self.resolve_string(key).await {
                Ok(_) | Err(FlagdError::Evaluation { .. }) => return Ok(()),
                Err(err) if attempt + 1 == STARTUP_DELAYS_MS.len() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %err,
                        "flagd provider not ready"
                    );
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn resolves_string_value() {
        let addr = serve(Router::new().route(
            RESOLVE_STRING_PATH,
            post(|| async { Json(serde_json::json!({"value": "swordfish", "reason": "STATIC"})) }),
        ))
        .await;

        let client = FlagdClient::new("127.0.0.1", addr.port()).unwrap();
        assert_eq!(client.resolve_string("cryptoWord").await.unwrap(), "swordfish");
    }

    #[tokio::test]
    async fn evaluation_error_is_distinguished_from_transport() {
        let addr = serve(Router::new().route(
            RESOLVE_STRING_PATH,
            post(|| async {
                (
                    axum::http::StatusCode::NOT_FOUND,
                    Json(serde_json::json!({"code": "not_found"})),
                )
            }),
        ))
        .await;

        let client = FlagdClient::new("127.0.0.1", addr.port()).unwrap();
        assert!(matches!(
            client.resolve_string("missing").await,
            Err(FlagdError::Evaluation { status: 404, .. })
        ));
        // a responding provider counts as ready
        client.wait_ready("missing").await.unwrap();
    }
}
