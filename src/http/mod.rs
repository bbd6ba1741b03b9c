//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! client socket bytes
//!     → parser.rs (frame one request: head + Content-Length body)
//!     → message.rs (HttpMessage: headers, cookies, form fields)
//!     → [proxy layer decides: relay or login]
//!     → message.rs (serialize after header rewrite)  → upstream
//!     → response.rs (login page / redirect)          → client
//! ```
//!
//! This is deliberately not a general HTTP/1.1 implementation: no chunked
//! transfer-encoding and no pipelining beyond sequential keep-alive.

pub mod message;
pub mod parser;
pub mod response;

pub use message::{parse_cookies, Headers, HttpMessage};
pub use parser::{parse_fragments, FramingError, HttpReader, MessageParser, ParseLimits};
pub use response::{Response, SESSION_COOKIE};
