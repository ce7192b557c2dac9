//! Response rewriting for the return path.
//!
//! # Responsibilities
//! - Egress: decrypt responses the peer ingress marked `X-Encrypted: 1`
//! - Ingress: encrypt responses toward the calling sidecar
//! - Classify gRPC from the paired request, never from the response (its
//!   Content-Type may already have been overwritten to `application/json`)
//!
//! Failures here have no protocol-level expression of their own; they
//! surface as internal errors and the harness answers 502.

use axum::body::{to_bytes, Body};
use axum::http::header::{self, HeaderValue};
use axum::http::Response;
use thiserror::Error;

use crate::config::ProxyMode;
use crate::crypto::{self, CryptoError};
use crate::grpc;
use crate::http::headers::{
    is_marked_encrypted, mark_encrypted, restore_content_type, set_content_length,
    strip_wire_headers, HEADER_ORIG_CONTENT_TYPE,
};
use crate::http::server::AppState;

/// Errors from the response rewrite.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response body read failed: {0}")]
    Read(#[source] axum::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Rewrite the upstream response for the caller.
///
/// `request_was_grpc` is the classification of the paired request's original
/// Content-Type.
pub async fn transform(
    state: &AppState,
    request_was_grpc: bool,
    resp: Response<Body>,
) -> Result<Response<Body>, ResponseError> {
    let word = state.resolver.current_word().await;
    if word.trim().is_empty() {
        return Ok(resp);
    }

    match state.config.mode {
        ProxyMode::Egress => decrypt_from_peer(state, &word, request_was_grpc, resp).await,
        ProxyMode::Ingress => encrypt_toward_caller(state, &word, request_was_grpc, resp).await,
    }
}

/// Egress side: open bodies the remote ingress sealed.
async fn decrypt_from_peer(
    state: &AppState,
    word: &str,
    request_was_grpc: bool,
    resp: Response<Body>,
) -> Result<Response<Body>, ResponseError> {
    if !is_marked_encrypted(resp.headers()) {
        return Ok(resp);
    }

    if request_was_grpc {
        let (mut parts, body) = resp.into_parts();
        strip_wire_headers(&mut parts.headers, &state.config.auth_header);
        parts.headers.remove(header::CONTENT_LENGTH);
        return Ok(Response::from_parts(parts, grpc::decrypt_frames(word, body)));
    }

    let saved_ct = resp.headers().get(&HEADER_ORIG_CONTENT_TYPE).cloned();
    let (mut parts, body) = resp.into_parts();
    let raw = to_bytes(body, usize::MAX).await.map_err(ResponseError::Read)?;
    let plaintext = crypto::open(word, &raw)?;

    restore_content_type(&mut parts.headers, saved_ct);
    set_content_length(&mut parts.headers, plaintext.len());
    strip_wire_headers(&mut parts.headers, &state.config.auth_header);
    Ok(Response::from_parts(parts, Body::from(plaintext)))
}

/// Ingress side: seal the application's response for the remote egress.
async fn encrypt_toward_caller(
    state: &AppState,
    word: &str,
    request_was_grpc: bool,
    resp: Response<Body>,
) -> Result<Response<Body>, ResponseError> {
    if request_was_grpc {
        let (mut parts, body) = resp.into_parts();
        mark_encrypted(&mut parts.headers);
        parts.headers.remove(header::CONTENT_LENGTH);
        return Ok(Response::from_parts(parts, grpc::encrypt_frames(word, body)));
    }

    let original_ct = resp.headers().get(header::CONTENT_TYPE).cloned();
    let (mut parts, body) = resp.into_parts();
    let raw = to_bytes(body, usize::MAX).await.map_err(ResponseError::Read)?;
    let envelope = crypto::seal(word, &raw)?;

    parts.headers.insert(
        HEADER_ORIG_CONTENT_TYPE,
        original_ct.unwrap_or_else(|| HeaderValue::from_static("")),
    );
    mark_encrypted(&mut parts.headers);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    set_content_length(&mut parts.headers, envelope.len());
    Ok(Response::from_parts(parts, Body::from(envelope)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProxyConfig, ProxyMode};
    use crate::http::headers::HEADER_ENCRYPTED;
    use crate::secret::SecretResolver;
    use std::sync::Arc;

    fn state(mode: ProxyMode, word: &str) -> AppState {
        let config = ProxyConfig::new(mode, "http://upstream:9000".parse().unwrap());
        AppState::new(Arc::new(config), Arc::new(SecretResolver::fixed(word)))
    }

    #[tokio::test]
    async fn transparent_mode_leaves_response_alone() {
        let state = state(ProxyMode::Ingress, "");
        let resp = Response::builder()
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let out = transform(&state, false, resp).await.unwrap();
        assert!(out.headers().get(&HEADER_ENCRYPTED).is_none());
        let body = to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn ingress_seals_response_and_saves_content_type() {
        let state = state(ProxyMode::Ingress, "swordfish");
        let resp = Response::builder()
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();

        let out = transform(&state, false, resp).await.unwrap();
        assert_eq!(out.headers().get(&HEADER_ENCRYPTED).unwrap(), "1");
        assert_eq!(out.headers().get(&HEADER_ORIG_CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(out.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");
        let body = to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(crypto::open("swordfish", &body).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn egress_opens_marked_response() {
        let state = state(ProxyMode::Egress, "swordfish");
        let envelope = crypto::seal("swordfish", b"hello").unwrap();
        let resp = Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .header(HEADER_ENCRYPTED, "1")
            .header(HEADER_ORIG_CONTENT_TYPE, "text/plain")
            .body(Body::from(envelope))
            .unwrap();

        let out = transform(&state, false, resp).await.unwrap();
        assert!(out.headers().get(&HEADER_ENCRYPTED).is_none());
        assert!(out.headers().get(&HEADER_ORIG_CONTENT_TYPE).is_none());
        assert_eq!(out.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");
        let body = to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn egress_leaves_unmarked_response_untouched() {
        let state = state(ProxyMode::Egress, "swordfish");
        let resp = Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"ok\":true}"))
            .unwrap();
        let out = transform(&state, false, resp).await.unwrap();
        let body = to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn egress_tampered_response_is_an_error() {
        let state = state(ProxyMode::Egress, "swordfish");
        let resp = Response::builder()
            .header(HEADER_ENCRYPTED, "1")
            .body(Body::from("garbage"))
            .unwrap();
        let err = transform(&state, false, resp).await.unwrap_err();
        assert!(matches!(err, ResponseError::Crypto(_)));
    }

    #[tokio::test]
    async fn egress_empty_saved_content_type_removes_header() {
        let state = state(ProxyMode::Egress, "swordfish");
        let envelope = crypto::seal("swordfish", b"raw").unwrap();
        let resp = Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .header(HEADER_ENCRYPTED, "1")
            .header(HEADER_ORIG_CONTENT_TYPE, "")
            .body(Body::from(envelope))
            .unwrap();

        let out = transform(&state, false, resp).await.unwrap();
        assert!(out.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn ingress_grpc_response_streams_encrypted() {
        let state = state(ProxyMode::Ingress, "swordfish");
        let mut frame = vec![0u8];
        frame.extend((2u32).to_be_bytes());
        frame.extend(b"ok");
        let resp = Response::builder()
            .header(header::CONTENT_TYPE, "application/grpc")
            .header(header::CONTENT_LENGTH, frame.len())
            .body(Body::from(frame))
            .unwrap();

        let out = transform(&state, true, resp).await.unwrap();
        assert_eq!(out.headers().get(&HEADER_ENCRYPTED).unwrap(), "1");
        assert!(out.headers().get(header::CONTENT_LENGTH).is_none());
        let body = to_bytes(out.into_body(), usize::MAX).await.unwrap();
        let len = u32::from_be_bytes([body[1], body[2], body[3], body[4]]) as usize;
        assert_eq!(crypto::open("swordfish", &body[5..5 + len]).unwrap(), b"ok");
    }
}
