//! The authenticating proxy.
//!
//! # Data Flow
//! ```text
//! server.rs (one accept loop per endpoint)
//!     → handler.rs (read one request, authenticate)
//!         ├─ login page / redirect   → client, close
//!         └─ authorized              → forward.rs
//!                                       ├─ rewrite loop (headers_rewrite set)
//!                                       └─ splice (no rules, or WebSocket)
//! ```
//!
//! # Design Decisions
//! - Shared state lives in one explicit [`ProxyContext`], never in globals
//! - Endpoints share only configuration and the secret

pub mod context;
pub mod forward;
pub mod handler;
pub mod server;

pub use context::{ProxyContext, ProxySettings};
pub use handler::{authenticate, handle_connection, ConnectionError, ConnectionState, Step};
pub use server::ProxyServer;
