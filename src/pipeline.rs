//! Edit session pipeline
//!
//! Public API for turning edit activity into a report. A host either replays
//! a recorded event stream in one shot ([`events_to_report`]) or keeps an
//! [`EditSession`] alive for the lifetime of an editing session and feeds it
//! change notifications as they arrive.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::adapter::EventStreamAdapter;
use crate::config::LedgerConfig;
use crate::encoder::ReportEncoder;
use crate::error::LedgerError;
use crate::ledger::LineLedger;
use crate::normalizer::{ChangeNotification, EventNormalizer, LineSource};
use crate::types::{EditEvent, EditEventRecord, LedgerMetrics, SessionReport};

/// Replay a recorded event stream and return report JSON (stateless, one-shot).
///
/// # Arguments
/// * `events` - NDJSON or JSON array of event records
///
/// # Example
/// ```ignore
/// let report_json = events_to_report(&recorded)?;
/// ```
pub fn events_to_report(events: &str) -> Result<String, LedgerError> {
    events_to_report_with_config(events, LedgerConfig::default())
}

/// [`events_to_report`] with explicit thresholds
pub fn events_to_report_with_config(
    events: &str,
    config: LedgerConfig,
) -> Result<String, LedgerError> {
    // Stage 1: Parse records
    let records = EventStreamAdapter::parse(events)?;

    // Stage 2: Replay into a fresh session
    let mut session = EditSession::with_config(config)?;
    for record in records {
        session.consume_record(record)?;
    }

    // Stage 3: Encode
    session.report_json()
}

/// One observed editing session.
///
/// Owns the ledger for the session; create it when observation starts and
/// call [`EditSession::finish`] when it ends. Ingestion takes `&mut self`, so
/// a multi-threaded host has to put the session behind a mutex.
pub struct EditSession {
    session_id: String,
    started_at: DateTime<Utc>,
    ledger: LineLedger,
    normalizer: EventNormalizer,
    encoder: ReportEncoder,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditSession {
    /// Create a session with default thresholds
    pub fn new() -> Self {
        Self::from_parts(LineLedger::new(), EventNormalizer::new())
    }

    /// Create a session with custom thresholds; fails on an invalid config
    pub fn with_config(config: LedgerConfig) -> Result<Self, LedgerError> {
        Self::with_normalizer(config, EventNormalizer::new())
    }

    /// Create a session with a custom normalizer (clock or heuristic)
    pub fn with_normalizer(
        config: LedgerConfig,
        normalizer: EventNormalizer,
    ) -> Result<Self, LedgerError> {
        Ok(Self::from_parts(LineLedger::with_config(config)?, normalizer))
    }

    fn from_parts(ledger: LineLedger, normalizer: EventNormalizer) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            ledger,
            normalizer,
            encoder: ReportEncoder::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ledger(&self) -> &LineLedger {
        &self.ledger
    }

    /// Seed the ledger with the document as it was when observation began
    pub fn initialise(&mut self, document: &str) -> Result<(), LedgerError> {
        tracing::info!(session_id = %self.session_id, "edit session initialised");
        self.ledger
            .consume_event(EditEvent::initialise(Utc::now(), document))
    }

    /// Apply one host change; `document` must already reflect it.
    ///
    /// Returns the number of events consumed. Stops at the first failing event.
    pub fn apply_change(
        &mut self,
        change: &ChangeNotification,
        document: &dyn LineSource,
    ) -> Result<usize, LedgerError> {
        self.apply_changes(std::slice::from_ref(change), document)
    }

    /// Apply every change of one host notification, in order
    pub fn apply_changes(
        &mut self,
        changes: &[ChangeNotification],
        document: &dyn LineSource,
    ) -> Result<usize, LedgerError> {
        let mut consumed = 0;
        for event in self.normalizer.normalize_all(changes, document) {
            self.ledger.consume_event(event)?;
            consumed += 1;
        }
        Ok(consumed)
    }

    pub fn consume(&mut self, event: EditEvent) -> Result<(), LedgerError> {
        self.ledger.consume_event(event)
    }

    pub fn consume_record(&mut self, record: EditEventRecord) -> Result<(), LedgerError> {
        self.ledger.consume_record(record)
    }

    pub fn metrics(&self) -> LedgerMetrics {
        self.ledger.metrics()
    }

    pub fn report(&self) -> SessionReport {
        self.encoder
            .encode(&self.session_id, self.started_at, &self.ledger)
    }

    pub fn report_json(&self) -> Result<String, LedgerError> {
        self.encoder
            .encode_to_json(&self.session_id, self.started_at, &self.ledger)
    }

    /// End the session and return its final report
    pub fn finish(self) -> SessionReport {
        let report = self.report();
        tracing::info!(
            session_id = %self.session_id,
            events = self.ledger.history().len(),
            "edit session finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EditEventKind;
    use chrono::TimeZone;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn sample_events_ndjson() -> &'static str {
        r#"{"line":0,"kind":"initialise","timestamp":"2024-01-15T14:00:00Z","content":"fn main() {\n}"}
{"line":1,"kind":"add","timestamp":"2024-01-15T14:00:01Z","content":"    let total = compute(values);","assisted":true}
{"line":1,"kind":"modify","timestamp":"2024-01-15T14:00:03Z","content":"    let total = compute(values)?;"}
{"line":1,"kind":"delete","timestamp":"2024-01-15T14:00:40Z"}
{"line":1,"kind":"add","timestamp":"2024-01-15T14:00:41Z","content":"    let total = compute(values)?;"}
"#
    }

    #[test]
    fn test_events_to_report_stateless() {
        let json = events_to_report(sample_events_ndjson()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["report_version"], "1.0.0");
        assert_eq!(payload["producer"]["name"], "edit-flux");

        let snapshot = &payload["snapshot"];
        assert_eq!(
            snapshot["content"],
            "fnmain(){\n    let total = compute(values)?;\n}"
        );
        assert_eq!(snapshot["events"].as_array().unwrap().len(), 5);

        // re-added line keeps its pasted provenance: 32 assisted, 1 typed
        let line = &snapshot["lines"][1];
        assert_eq!(line["number_of_assisted_characters"], 32);
        assert_eq!(line["single_characters_entered"], 1);

        let metrics = &snapshot["metrics"];
        assert!(metrics["coefficient_of_variation"].is_number());
        assert!(metrics["time_distribution"]["thinking_time"].as_f64().unwrap() > 0.0);
        assert!(metrics["fano_factor"].is_number());
    }

    #[test]
    fn test_events_to_report_invalid_kind() {
        let input = r#"{"line":0,"kind":"rename","timestamp":"2024-01-15T14:00:00Z"}"#;
        let result = events_to_report(input);
        assert!(matches!(result, Err(LedgerError::InvalidEventKind(_))));
    }

    #[test]
    fn test_events_to_report_line_not_found() {
        let input = r#"{"line":3,"kind":"modify","timestamp":"2024-01-15T14:00:00Z","content":"x"}"#;
        let result = events_to_report(input);
        assert!(matches!(result, Err(LedgerError::LineNotFound { line: 3 })));
    }

    #[test]
    fn test_invalid_json() {
        assert!(events_to_report("not valid json").is_err());
    }

    #[test]
    fn test_session_tracks_host_changes() {
        let normalizer = EventNormalizer::new().with_clock(fixed_clock);
        let mut session =
            EditSession::with_normalizer(LedgerConfig::default(), normalizer).unwrap();
        session.initialise("").unwrap();
        assert_eq!(session.ledger().len(), 1);

        // type "a", then "b"
        session
            .apply_change(&ChangeNotification::new(0, 0, "a"), &vec!["a"])
            .unwrap();
        session
            .apply_change(&ChangeNotification::new(0, 0, "b"), &vec!["ab"])
            .unwrap();

        // paste two lines after it
        let document = vec!["ab", "let pasted = true;", "done"];
        let consumed = session
            .apply_change(
                &ChangeNotification::new(0, 0, "\nlet pasted = true;\ndone"),
                &document,
            )
            .unwrap();
        assert_eq!(consumed, 3);

        let ledger = session.ledger();
        assert_eq!(ledger.content(), "ab\nlet pasted = true;\ndone");
        assert_eq!(ledger.get(0).unwrap().single_characters_entered, 2);
        assert_eq!(ledger.get(1).unwrap().number_of_assisted_characters, 18);
        assert_eq!(ledger.get(2).unwrap().number_of_assisted_characters, 4);

        // join lines 0..=2 back into one
        let consumed = session
            .apply_change(&ChangeNotification::new(0, 2, ""), &vec!["abne"])
            .unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(session.ledger().content(), "abne");
        assert_eq!(
            session.ledger().history().last().unwrap().kind,
            EditEventKind::Modify
        );
    }

    #[test]
    fn test_session_report_and_finish() {
        let mut session = EditSession::new();
        session.initialise("hello\nworld").unwrap();

        let report = session.report();
        assert_eq!(report.session_id, session.session_id());
        assert_eq!(report.snapshot.content, "hello\nworld");
        assert_eq!(report.snapshot.metrics.assisted_text_percentage, 0.0);

        let json = session.report_json().unwrap();
        assert!(json.contains("\"session_id\""));

        let session_id = session.session_id().to_string();
        let final_report = session.finish();
        assert_eq!(final_report.session_id, session_id);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = LedgerConfig {
            thinking_threshold_ms: 700_000,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            EditSession::with_config(config.clone()),
            Err(LedgerError::InvalidConfig(_))
        ));
        assert!(matches!(
            events_to_report_with_config("", config),
            Err(LedgerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_custom_config_changes_cache_threshold() {
        let config = LedgerConfig {
            cache_min_content_length: 2,
            ..LedgerConfig::default()
        };
        let input = r#"{"line":0,"kind":"add","timestamp":"2024-01-15T14:00:00Z","content":"abc","assisted":true}
{"line":0,"kind":"delete","timestamp":"2024-01-15T14:00:01Z"}
{"line":0,"kind":"add","timestamp":"2024-01-15T14:00:02Z","content":"abc"}"#;

        let json = events_to_report_with_config(input, config).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            payload["snapshot"]["metrics"]["assisted_text_percentage"],
            100.0
        );
    }
}
