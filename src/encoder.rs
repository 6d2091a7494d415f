//! Session report encoder
//!
//! Wraps a ledger snapshot into a versioned report with producer metadata.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::LineLedger;
use crate::types::{ReportProducer, SessionReport};
use crate::{FLUX_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Session report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Snapshot `ledger` into a report
    pub fn encode(
        &self,
        session_id: &str,
        started_at: DateTime<Utc>,
        ledger: &LineLedger,
    ) -> SessionReport {
        SessionReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: session_id.to_string(),
            started_at_utc: started_at.to_rfc3339(),
            computed_at_utc: Utc::now().to_rfc3339(),
            snapshot: ledger.to_snapshot(),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        session_id: &str,
        started_at: DateTime<Utc>,
        ledger: &LineLedger,
    ) -> Result<String, LedgerError> {
        let report = self.encode(session_id, started_at, ledger);
        serde_json::to_string(&report).map_err(|e| LedgerError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EditEvent, EditEventKind};
    use chrono::TimeZone;

    #[test]
    fn test_encode_report() {
        let started = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let mut ledger = LineLedger::new();
        ledger
            .consume_event(EditEvent::new(0, EditEventKind::Add, started, "hello", true))
            .unwrap();

        let encoder = ReportEncoder::with_instance_id("instance-1".to_string());
        let report = encoder.encode("session-1", started, &ledger);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "instance-1");
        assert_eq!(report.session_id, "session-1");
        assert_eq!(report.started_at_utc, "2024-01-15T14:00:00+00:00");
        assert_eq!(report.snapshot.content, "hello");
        assert_eq!(report.snapshot.metrics.assisted_text_percentage, 100.0);
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = ReportEncoder::new();
        let json = encoder
            .encode_to_json("s", Utc::now(), &LineLedger::new())
            .unwrap();

        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["report_version"], "1.0.0");
        assert_eq!(payload["producer"]["name"], "edit-flux");
        assert!(payload["snapshot"]["metrics"]["fano_factor"].is_null());
        assert_eq!(payload["snapshot"]["metrics"]["assisted_text_percentage"], 0.0);
    }

    #[test]
    fn test_unique_instance_ids() {
        assert_ne!(
            ReportEncoder::new().instance_id(),
            ReportEncoder::new().instance_id()
        );
    }
}
