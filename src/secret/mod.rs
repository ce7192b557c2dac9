//! Secret word subsystem.
//!
//! # Data Flow
//! ```text
//! Director / response rewriter (independently, once per side)
//!     → resolver.rs (static word, or flagd lookup with cached fallback)
//!     → flagd.rs (ResolveString over the evaluation HTTP API)
//! ```
//!
//! # Design Decisions
//! - The word is re-resolved on the request and response paths; the race is
//!   accepted because the peer sidecar rejects on mismatch
//! - Provider failures degrade to the last non-empty word, never to an error
//! - An empty word means transparent mode, not a failure

pub mod flagd;
pub mod resolver;

pub use flagd::{FlagdClient, FlagdError};
pub use resolver::SecretResolver;
