//! Streaming transformer for gRPC length-prefixed frames.
//!
//! A gRPC message stream is a sequence of frames:
//! `compressed-flag:u8 | length:u32 big-endian | payload[length]`.
//! [`FrameTransform`] rewrites each payload with a caller-supplied function
//! and re-emits valid frames, one whole frame per stream item. The input
//! chunking is arbitrary; frames may span or share chunks.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::Stream;
use thiserror::Error;

use crate::crypto::CryptoError;

/// Frame header: flag byte plus big-endian u32 payload length.
pub const FRAME_HEADER_LEN: usize = 5;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced on the transformed stream.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream ended inside a frame header.
    #[error("invalid gRPC frame header")]
    InvalidHeader,

    /// The stream ended inside a frame payload.
    #[error("invalid gRPC frame payload")]
    InvalidPayload,

    /// The transformed payload no longer fits a u32 length prefix.
    #[error("gRPC frame too large after transform: {0}")]
    TooLarge(usize),

    /// The payload transform failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The underlying byte source failed.
    #[error("gRPC frame source: {0}")]
    Source(#[source] BoxError),
}

/// A stream adapter that rewrites gRPC frame payloads as they flow through.
///
/// Owns its source; dropping the transform drops the source and any
/// partially-accumulated frame. Peak memory is one frame, not the stream.
pub struct FrameTransform<S, F> {
    source: S,
    transform: F,
    acc: BytesMut,
    done: bool,
}

impl<S, F> FrameTransform<S, F>
where
    F: FnMut(Bytes) -> Result<Bytes, CryptoError>,
{
    pub fn new(source: S, transform: F) -> Self {
        Self {
            source,
            transform,
            acc: BytesMut::new(),
            done: false,
        }
    }

    /// Extract and transform one complete frame from the accumulator, if the
    /// accumulator holds one.
    fn take_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.acc.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let len =
            u32::from_be_bytes([self.acc[1], self.acc[2], self.acc[3], self.acc[4]]) as usize;
        if self.acc.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }

        let mut frame = self.acc.split_to(FRAME_HEADER_LEN + len);
        let flag = frame[0];
        let payload = frame.split_off(FRAME_HEADER_LEN).freeze();

        let transformed = (self.transform)(payload)?;
        if transformed.len() as u64 > u64::from(u32::MAX) {
            return Err(FrameError::TooLarge(transformed.len()));
        }

        let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + transformed.len());
        out.put_u8(flag);
        out.put_u32(transformed.len() as u32);
        out.extend_from_slice(&transformed);
        Ok(Some(out.freeze()))
    }
}

impl<S, E, F> Stream for FrameTransform<S, F>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
    F: FnMut(Bytes) -> Result<Bytes, CryptoError> + Unpin,
{
    type Item = Result<Bytes, FrameError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(None);
            }
            match this.take_frame() {
                Ok(Some(frame)) => return Poll::Ready(Some(Ok(frame))),
                Ok(None) => {}
                Err(err) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
            }
            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.acc.extend_from_slice(&chunk),
                Poll::Ready(Some(Err(err))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(FrameError::Source(err.into()))));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    if this.acc.is_empty() {
                        // clean EOF at a frame boundary
                        return Poll::Ready(None);
                    }
                    let err = if this.acc.len() < FRAME_HEADER_LEN {
                        FrameError::InvalidHeader
                    } else {
                        FrameError::InvalidPayload
                    };
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
