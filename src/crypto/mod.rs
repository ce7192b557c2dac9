//! Crypto subsystem.
//!
//! # Data Flow
//! ```text
//! secret word (UTF-8 string)
//!     → derive_key (SHA-256 digest, 32 bytes)
//!     → seal / open (AES-256-GCM, fresh 12-byte nonce per seal)
//!     → JSON envelope { nonce, ciphertext } (base64, tag appended)
//! ```
//!
//! # Design Decisions
//! - The envelope is plain JSON so it survives any HTTP infrastructure as an
//!   opaque `application/json` body and doubles as a gRPC frame payload
//! - The key is re-derived per operation; the word can change between requests
//! - No AAD, no sequence numbers: each envelope is self-contained

pub mod envelope;

pub use envelope::{open, seal, CryptoError};
