//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Connection id and endpoint id flow through every log line of a connection
//! - Metrics are cheap (atomic increments) and no-ops until a recorder exists

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, AuthOutcome};
