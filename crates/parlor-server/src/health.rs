//! `/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Server start time, RFC 3339.
    pub started_at: String,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Connections that have registered a display name.
    pub registered: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    started_at: DateTime<Utc>,
    connections: usize,
    registered: usize,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        connections,
        registered,
    }
}
