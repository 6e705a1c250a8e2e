//! Per-request telemetry.
//!
//! The pipeline hands every [`RequestReport`] to a [`TelemetrySink`]. The
//! production sink writes one structured log line per request; the memory
//! sink keeps records for assertions.

use serde::Serialize;
use std::sync::Mutex;

use crate::gateway::types::{Outcome, RequestReport};

/// Flattened, serializable view of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    pub user_id: String,
    pub tier: String,
    pub latency_ms: f64,
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&RequestReport> for RequestRecord {
    fn from(report: &RequestReport) -> Self {
        Self {
            user_id: report.user_id.clone(),
            tier: report.tier.to_string(),
            latency_ms: report.latency_ms(),
            result: report.outcome.result(),
            error: report.error.clone(),
        }
    }
}

/// Destination for request reports.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, report: &RequestReport);
}

/// Emits each report as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    fn message(report: &RequestReport) -> &'static str {
        match (&report.outcome, &report.error) {
            (_, Some(_)) => "Gateway error, failing open",
            (Outcome::Blocked { .. }, None) => "Request blocked",
            _ => "Request processed",
        }
    }
}

impl TelemetrySink for TracingSink {
    fn record(&self, report: &RequestReport) {
        let latency_ms = format!("{:.2}", report.latency_ms());
        let result = report.outcome.result();
        let message = Self::message(report);

        match &report.error {
            Some(error) => tracing::error!(
                user_id = %report.user_id,
                tier = %report.tier,
                latency_ms = %latency_ms,
                result,
                error = %error,
                "{message}"
            ),
            None => tracing::info!(
                user_id = %report.user_id,
                tier = %report.tier,
                latency_ms = %latency_ms,
                result,
                "{message}"
            ),
        }
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<RequestRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RequestRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<RequestRecord> {
        self.records.lock().ok().and_then(|records| records.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, report: &RequestReport) {
        if let Ok(mut records) = self.records.lock() {
            records.push(RequestRecord::from(report));
        }
    }
}
