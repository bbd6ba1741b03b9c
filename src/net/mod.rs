//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, lifecycle tracking)
//!     → Hand off to the proxy state machine
//!     → relay.rs (raw splice once the client is authorized)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The relay never interprets the bytes it copies

pub mod connection;
pub mod listener;
pub mod relay;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use relay::{pump, splice, IdleWatch, SpliceEnd};
