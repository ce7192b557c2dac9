//! Request classification and rewriting.
//!
//! # Responsibilities
//! - Rebind the request URI to the upstream authority
//! - Classify: mode × word × gRPC × has-body
//! - Encrypt (egress) or verify-and-decrypt (ingress) request bodies
//! - Turn pre-upstream failures into typed denials
//!
//! # Design Decisions
//! - A denial is a value, not an in-band header: denied requests never reach
//!   the upstream, so tunnel-internal state cannot leak in either direction
//! - gRPC bodies stream frame-by-frame; only non-gRPC bodies are buffered

use axum::body::{to_bytes, Body};
use axum::http::header::{self, HeaderValue};
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::{Method, Request, StatusCode};

use crate::config::ProxyMode;
use crate::crypto;
use crate::grpc;
use crate::http::headers::{
    is_grpc, is_marked_encrypted, mark_encrypted, restore_content_type, set_content_length,
    strip_hop_by_hop, strip_wire_headers, HEADER_ORIG_CONTENT_TYPE,
};
use crate::http::server::AppState;

/// Outcome of the request rewrite.
pub enum Decision {
    /// Send the rewritten request to the upstream.
    Forward(Request<Body>),
    /// Answer the caller directly; the upstream is never invoked.
    Deny(Denial),
}

/// A pre-upstream rejection and the response it synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Ingress: auth token missing or not matching the active word.
    Unauthorized,
    /// Ingress: the request body claimed to be encrypted but could not be
    /// opened (or arrived encrypted while this side is transparent).
    BadDecrypt,
    /// Egress: the request body could not be sealed.
    BadEncrypt,
}

impl Denial {
    pub fn status(&self) -> StatusCode {
        match self {
            Denial::Unauthorized => StatusCode::UNAUTHORIZED,
            Denial::BadDecrypt => StatusCode::BAD_REQUEST,
            Denial::BadEncrypt => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Denial::Unauthorized => "unauthorized",
            Denial::BadDecrypt => "bad encrypted payload",
            Denial::BadEncrypt => "proxy encryption error",
        }
    }
}

/// Rewrite an inbound request for the upstream, or deny it.
pub async fn prepare(state: &AppState, mut req: Request<Body>) -> Decision {
    rewrite_uri(&mut req, &state.config.upstream);
    strip_hop_by_hop(req.headers_mut());
    // no compression layer between the sidecars: bodies are rewritten here
    req.headers_mut().remove(header::ACCEPT_ENCODING);

    let word = state.resolver.current_word().await;
    let transparent = word.trim().is_empty();
    let grpc_request = is_grpc(req.headers());

    match state.config.mode {
        ProxyMode::Egress => {
            if transparent {
                return Decision::Forward(req);
            }
            prepare_egress(state, req, &word, grpc_request).await
        }
        ProxyMode::Ingress => {
            if transparent {
                if is_marked_encrypted(req.headers()) {
                    // marked encrypted but no word is active to open it
                    return Decision::Deny(Denial::BadDecrypt);
                }
                strip_wire_headers(req.headers_mut(), &state.config.auth_header);
                return Decision::Forward(req);
            }
            prepare_ingress(state, req, &word, grpc_request).await
        }
    }
}

async fn prepare_egress(
    state: &AppState,
    mut req: Request<Body>,
    word: &str,
    grpc_request: bool,
) -> Decision {
    let token = match HeaderValue::from_str(word) {
        Ok(token) => token,
        Err(_) => {
            tracing::warn!("crypto word is not a valid header value");
            return Decision::Deny(Denial::BadEncrypt);
        }
    };
    req.headers_mut()
        .insert(state.config.auth_header.clone(), token);

    if !has_body(req.method()) {
        return Decision::Forward(req);
    }

    if grpc_request {
        mark_encrypted(req.headers_mut());
        req.headers_mut().remove(header::CONTENT_LENGTH);
        let (parts, body) = req.into_parts();
        return Decision::Forward(Request::from_parts(parts, grpc::encrypt_frames(word, body)));
    }

    let original_ct = req.headers().get(header::CONTENT_TYPE).cloned();
    let (mut parts, body) = req.into_parts();
    let raw = match to_bytes(body, usize::MAX).await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request body");
            return Decision::Deny(Denial::BadEncrypt);
        }
    };
    let envelope = match crypto::seal(word, &raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(error = %err, "request encryption failed");
            return Decision::Deny(Denial::BadEncrypt);
        }
    };

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
    Decision::Forward(Request::from_parts(parts, Body::from(envelope)))
}

async fn prepare_ingress(
    state: &AppState,
    mut req: Request<Body>,
    word: &str,
    grpc_request: bool,
) -> Decision {
    let presented = req
        .headers()
        .get(&state.config.auth_header)
        .map(HeaderValue::as_bytes);
    if presented != Some(word.as_bytes()) {
        return Decision::Deny(Denial::Unauthorized);
    }

    if !is_marked_encrypted(req.headers()) {
        // authenticated cleartext body: strip wire headers, forward untouched
        strip_wire_headers(req.headers_mut(), &state.config.auth_header);
        return Decision::Forward(req);
    }

    if grpc_request {
        strip_wire_headers(req.headers_mut(), &state.config.auth_header);
        req.headers_mut().remove(header::CONTENT_LENGTH);
        let (parts, body) = req.into_parts();
        return Decision::Forward(Request::from_parts(parts, grpc::decrypt_frames(word, body)));
    }

    let saved_ct = req.headers().get(&HEADER_ORIG_CONTENT_TYPE).cloned();
    let (mut parts, body) = req.into_parts();
    let raw = match to_bytes(body, usize::MAX).await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read encrypted request body");
            return Decision::Deny(Denial::BadDecrypt);
        }
    };
    let plaintext = match crypto::open(word, &raw) {
        Ok(plaintext) => plaintext,
        Err(err) => {
            tracing::warn!(error = %err, "request decryption failed");
            return Decision::Deny(Denial::BadDecrypt);
        }
    };

    restore_content_type(&mut parts.headers, saved_ct);
    set_content_length(&mut parts.headers, plaintext.len());
    strip_wire_headers(&mut parts.headers, &state.config.auth_header);
    Decision::Forward(Request::from_parts(parts, Body::from(plaintext)))
}

/// Only body-carrying methods get their payload rewritten.
fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Rebind scheme and authority to the upstream, keeping path and query.
fn rewrite_uri(req: &mut Request<Body>, upstream: &Uri) {
    let mut parts = req.uri().clone().into_parts();
    parts.scheme = upstream.scheme().cloned();
    parts.authority = upstream.authority().cloned();
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    match Uri::from_parts(parts) {
        Ok(uri) => *req.uri_mut() = uri,
        Err(err) => {
            // leave the original URI; the upstream call will fail and surface
            tracing::debug!(error = %err, "URI rewrite failed");
        }
    }
}
