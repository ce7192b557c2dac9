//! Wire and hop-by-hop header handling.
//!
//! The tunnel speaks three headers between the sidecars: the auth token
//! (name configurable), `X-Encrypted` marking an enveloped body, and
//! `X-Orig-Content-Type` carrying the pre-encryption Content-Type. All three
//! are consumed and stripped before a body reaches the application.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::str::FromStr;

/// Marks a body as an envelope (or a stream of envelope-framed gRPC frames).
pub const HEADER_ENCRYPTED: HeaderName = HeaderName::from_static("x-encrypted");

/// Carries the Content-Type that was overwritten by `application/json`.
pub const HEADER_ORIG_CONTENT_TYPE: HeaderName = HeaderName::from_static("x-orig-content-type");

/// Hop-by-hop headers that must not be forwarded. `Host` is included: the
/// HTTP/2 upstream client derives `:authority` from the rewritten URI, and
/// connection-scoped headers are illegal on h2 streams.
const HOP_BY_HOP: [HeaderName; 10] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
];

/// Content-Type prefix identifying gRPC traffic, matched case-insensitively.
const GRPC_CONTENT_TYPE_PREFIX: &str = "application/grpc";

/// Whether the map's Content-Type identifies gRPC traffic.
pub(crate) fn is_grpc(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            ct.get(..GRPC_CONTENT_TYPE_PREFIX.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(GRPC_CONTENT_TYPE_PREFIX))
        })
        .unwrap_or(false)
}

/// Whether the body is marked as encrypted (`X-Encrypted: 1`).
pub(crate) fn is_marked_encrypted(headers: &HeaderMap) -> bool {
    headers
        .get(&HEADER_ENCRYPTED)
        .map(|v| v.as_bytes() == b"1")
        .unwrap_or(false)
}

pub(crate) fn mark_encrypted(headers: &mut HeaderMap) {
    headers.insert(HEADER_ENCRYPTED, HeaderValue::from_static("1"));
}

/// Remove the tunnel's wire headers before a body crosses to either end.
pub(crate) fn strip_wire_headers(headers: &mut HeaderMap, auth_header: &HeaderName) {
    headers.remove(&HEADER_ENCRYPTED);
    headers.remove(&HEADER_ORIG_CONTENT_TYPE);
    headers.remove(auth_header);
}

/// Put back the saved Content-Type; an absent or empty saved value removes
/// the header entirely.
pub(crate) fn restore_content_type(headers: &mut HeaderMap, saved: Option<HeaderValue>) {
    match saved {
        Some(value) if !value.is_empty() => {
            headers.insert(header::CONTENT_TYPE, value);
        }
        _ => {
            headers.remove(header::CONTENT_TYPE);
        }
    }
}

pub(crate) fn set_content_length(headers: &mut HeaderMap, len: usize) {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}

/// Strip hop-by-hop headers, including any named by `Connection`.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
