use serde::Serialize;
use utoipa::ToSchema;

use crate::state::NumberingMetricsSnapshot;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Numbering and season lock counters since startup.
    pub numbering: NumberingMetricsSnapshot,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(numbering: NumberingMetricsSnapshot) -> Self {
        Self {
            status: "ok".to_string(),
            numbering,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(numbering: NumberingMetricsSnapshot) -> Self {
        Self {
            status: "degraded".to_string(),
            numbering,
        }
    }
}
