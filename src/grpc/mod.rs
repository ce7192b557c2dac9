//! gRPC length-prefixed framing subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP body data stream (arbitrary chunk boundaries)
//!     → framing.rs (accumulate, extract complete frames)
//!     → per-payload transform (seal or open)
//!     → re-framed stream (flag preserved, length rewritten)
//!     → Body::from_stream back onto the wire
//! ```
//!
//! # Design Decisions
//! - One emitted item per frame; the stream never buffers more than the
//!   largest single frame
//! - The compressed-flag byte is copied verbatim: it describes the payload
//!   the peer restores, not the envelope in transit

pub mod framing;

pub use framing::{FrameError, FrameTransform};

use axum::body::Body;
use bytes::Bytes;

use crate::crypto;

/// Wrap `body` so every gRPC frame payload is sealed under `word`.
pub fn encrypt_frames(word: &str, body: Body) -> Body {
    let word = word.to_owned();
    Body::from_stream(FrameTransform::new(
        body.into_data_stream(),
        move |payload: Bytes| crypto::seal(&word, &payload).map(Bytes::from),
    ))
}

/// Wrap `body` so every gRPC frame payload is opened under `word`.
pub fn decrypt_frames(word: &str, body: Body) -> Body {
    let word = word.to_owned();
    Body::from_stream(FrameTransform::new(
        body.into_data_stream(),
        move |payload: Bytes| crypto::open(&word, &payload).map(Bytes::from),
    ))
}
