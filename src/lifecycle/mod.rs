//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! SIGINT (or a dropped handle)
//!     → shutdown signal completes
//!     → accept loop stops taking connections and returns
//! ```

pub mod shutdown;

pub use shutdown::{ShutdownHandle, ShutdownSignal};
