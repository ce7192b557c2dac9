//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (HTTP/1.1 or h2c)
//!     → server.rs (protocol detection, handler dispatch)
//!     → director.rs (classify, rewrite request, or deny)
//!     → [h2c client dials the upstream]
//!     → response.rs (decrypt/encrypt the return path)
//!     → Send to client
//! ```

pub mod director;
pub mod headers;
pub mod response;
pub mod server;

pub use director::{Decision, Denial};
pub use headers::{HEADER_ENCRYPTED, HEADER_ORIG_CONTENT_TYPE};
pub use server::{AppState, SidecarServer};
