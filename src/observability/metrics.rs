//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_sessions_created_total` (counter)
//! - `bridge_sessions_freed_total` (counter)
//! - `bridge_sessions_live` (gauge): sessions in the session table
//! - `bridge_commands_total` (counter): commands queued, by `kind`
//! - `bridge_handler_faults_total` (counter): handler errors and panics, by `reason`
//! - `bridge_buffers_live` (gauge): registered buffer handles
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus endpoint is optional and off by default

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub mod names {
    pub const SESSIONS_CREATED: &str = "bridge_sessions_created_total";
    pub const SESSIONS_FREED: &str = "bridge_sessions_freed_total";
    pub const SESSIONS_LIVE: &str = "bridge_sessions_live";
    pub const COMMANDS: &str = "bridge_commands_total";
    pub const HANDLER_FAULTS: &str = "bridge_handler_faults_total";
    pub const BUFFERS_LIVE: &str = "bridge_buffers_live";
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_session_created() {
    counter!(names::SESSIONS_CREATED).increment(1);
}

pub fn record_session_freed() {
    counter!(names::SESSIONS_FREED).increment(1);
}

pub fn record_sessions_live(count: usize) {
    gauge!(names::SESSIONS_LIVE).set(count as f64);
}

pub fn record_buffers_live(count: usize) {
    gauge!(names::BUFFERS_LIVE).set(count as f64);
}

pub fn record_command(kind: &'static str) {
    counter!(names::COMMANDS, "kind" => kind).increment(1);
}

pub fn record_handler_fault(reason: &'static str) {
    counter!(names::HANDLER_FAULTS, "reason" => reason).increment(1);
}
