//! Crypto Tunnel Sidecar
//!
//! A reverse proxy deployed in pairs around two cooperating services. The
//! egress instance encrypts request payloads under a dynamically-resolved
//! secret word; the ingress peer verifies, decrypts, forwards to the local
//! application, and encrypts the response on the way back. With an empty
//! word both sides degrade to transparent pass-through.
//!
//! # Architecture Overview
//!
//! ```text
//!  caller ──▶ egress sidecar ══ encrypted h2c ══▶ ingress sidecar ──▶ app
//!               │                                     │
//!               └──── secret resolver (flagd) ────────┘
//! ```
//!
//! - `http`: server harness, request director, response rewriter
//! - `crypto`: SHA-256 key derivation + AES-256-GCM JSON envelopes
//! - `grpc`: streaming length-prefixed frame transformer
//! - `secret`: word resolution with cached fallback
//! - `config`, `lifecycle`, `observability`: cross-cutting concerns

// Core subsystems
pub mod config;
pub mod crypto;
pub mod grpc;
pub mod http;
pub mod secret;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use crate::config::ProxyConfig;
pub use crate::http::SidecarServer;
