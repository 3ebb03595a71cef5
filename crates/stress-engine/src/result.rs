use std::sync::Arc;

use chrono::Utc;
use stress_client::{ClientError, SendOutcome, SUCCESS_STATUS};

/// Outcome of one batch send, shared with every sink.
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    pub latency_ns: i64,
    pub status: u16,
    /// Only set for unexpected statuses.
    pub body: Option<String>,
    pub error: Option<Arc<ClientError>>,
    /// Emission time, nanoseconds since the epoch.
    pub timestamp_ns: i64,
}

impl WriteResult {
    pub fn from_outcome(outcome: SendOutcome) -> Self {
        Self {
            latency_ns: outcome.latency_ns,
            status: outcome.status,
            body: outcome.body,
            error: outcome.error,
            timestamp_ns: now_ns(),
        }
    }

    /// Any error or a status other than `204`.
    pub fn is_anomaly(&self) -> bool {
        self.error.is_some() || self.status != SUCCESS_STATUS
    }
}

pub(crate) fn now_ns() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}
