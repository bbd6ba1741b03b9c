//! totp-gate: an authenticating reverse proxy.
//!
//! Sits in front of arbitrary backend services and only relays connections
//! that carry a valid session cookie. Everyone else gets a login form backed
//! by a pluggable credential check (TOTP code, password).
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                       TOTP GATE                          │
//!                  │                                                          │
//!  Client          │  ┌─────────┐   ┌─────────┐   ┌──────────────────┐        │
//!  ────────────────┼─▶│   net   │──▶│  http   │──▶│      proxy       │        │
//!                  │  │listener │   │ parser  │   │ state machine    │        │
//!                  │  └─────────┘   └─────────┘   └───┬──────────┬───┘        │
//!                  │                                  │          │            │
//!                  │                 not authorized   ▼          ▼ authorized │
//!                  │               ┌──────────────────────┐  ┌───────────┐    │
//!  ◀───────────────┼───────────────│ auth widgets + render│  │ net relay │◀───┼──▶ Backend
//!   login page /   │               │ session + csrf       │  │ (rewrite/ │    │
//!   302 + cookie   │               └──────────────────────┘  │  splice)  │    │
//!                  │                                         └───────────┘    │
//!                  │  ┌────────────────────────────────────────────────────┐  │
//!                  │  │ config (arena, hot reload) · lifecycle · observ.   │  │
//!                  │  └────────────────────────────────────────────────────┘  │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

// Protocol core
pub mod auth;
pub mod http;
pub mod session;

// Connection handling
pub mod net;
pub mod proxy;
pub mod render;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::{Directory, FileConfig, SharedConfig};
pub use lifecycle::Shutdown;
pub use proxy::{ProxyContext, ProxyServer, ProxySettings};
