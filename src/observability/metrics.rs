//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_connections_total` (counter): accepted connections by endpoint
//! - `gate_auth_attempts_total` (counter): login submissions by endpoint, outcome
//! - `gate_upstream_failures_total` (counter): failed backend connects by endpoint
//! - `gate_active_connections` (gauge): current connection count
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::config::EndpointId;

pub const CONNECTIONS_TOTAL: &str = "gate_connections_total";
pub const AUTH_ATTEMPTS_TOTAL: &str = "gate_auth_attempts_total";
pub const UPSTREAM_FAILURES_TOTAL: &str = "gate_upstream_failures_total";
pub const ACTIVE_CONNECTIONS: &str = "gate_active_connections";

/// Result of one login submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Rejected,
}

impl AuthOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection(endpoint: EndpointId) {
    ::metrics::counter!(CONNECTIONS_TOTAL, "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_auth_attempt(endpoint: EndpointId, outcome: AuthOutcome) {
    ::metrics::counter!(
        AUTH_ATTEMPTS_TOTAL,
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_upstream_failure(endpoint: EndpointId) {
    ::metrics::counter!(UPSTREAM_FAILURES_TOTAL, "endpoint" => endpoint.to_string()).increment(1);
}

pub fn connection_opened() {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).increment(1.0);
}

pub fn connection_closed() {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(AuthOutcome::Success.as_str(), "success");
        assert_eq!(AuthOutcome::Rejected.as_str(), "rejected");
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        record_connection(1);
        record_auth_attempt(1, AuthOutcome::Rejected);
        record_upstream_failure(1);
        connection_opened();
        connection_closed();
    }
}
