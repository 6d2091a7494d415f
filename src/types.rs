//! Edit event and metric types
//!
//! This module defines the events that flow into the line ledger and the
//! metric and snapshot records that flow out of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::line::LineProvenance;

/// Kind of line-level mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditEventKind {
    Add,
    Delete,
    Modify,
    Initialise,
}

impl EditEventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EditEventKind::Add => "add",
            EditEventKind::Delete => "delete",
            EditEventKind::Modify => "modify",
            EditEventKind::Initialise => "initialise",
        }
    }
}

impl std::str::FromStr for EditEventKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(EditEventKind::Add),
            "delete" => Ok(EditEventKind::Delete),
            "modify" => Ok(EditEventKind::Modify),
            "initialise" => Ok(EditEventKind::Initialise),
            other => Err(LedgerError::InvalidEventKind(other.to_string())),
        }
    }
}

/// One line-level text mutation.
///
/// `content` is the full new text of the affected line, or the whole document
/// for [`EditEventKind::Initialise`]. Events are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEvent {
    /// Zero-based line position at emission time
    pub line: usize,
    /// Mutation kind
    pub kind: EditEventKind,
    /// Wall-clock emission time
    pub timestamp: DateTime<Utc>,
    /// New line text (or document text for Initialise)
    pub content: String,
    /// Whether the text was bulk-inserted (paste / completion)
    pub assisted: bool,
}

impl EditEvent {
    pub fn new(
        line: usize,
        kind: EditEventKind,
        timestamp: DateTime<Utc>,
        content: impl Into<String>,
        assisted: bool,
    ) -> Self {
        Self {
            line,
            kind,
            timestamp,
            content: content.into(),
            assisted,
        }
    }

    /// Session bootstrap event carrying the whole document
    pub fn initialise(timestamp: DateTime<Utc>, document: impl Into<String>) -> Self {
        Self::new(0, EditEventKind::Initialise, timestamp, document, false)
    }
}

/// Untyped wire form of an [`EditEvent`].
///
/// Producers outside the crate may send any kind string; conversion into an
/// `EditEvent` is where unknown kinds are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEventRecord {
    pub line: usize,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub assisted: bool,
}

impl TryFrom<EditEventRecord> for EditEvent {
    type Error = LedgerError;

    fn try_from(record: EditEventRecord) -> Result<Self, Self::Error> {
        let kind = record.kind.parse::<EditEventKind>()?;
        Ok(EditEvent {
            line: record.line,
            kind,
            timestamp: record.timestamp,
            content: record.content,
            assisted: record.assisted,
        })
    }
}

impl From<&EditEvent> for EditEventRecord {
    fn from(event: &EditEvent) -> Self {
        EditEventRecord {
            line: event.line,
            kind: event.kind.as_str().to_string(),
            timestamp: event.timestamp,
            content: event.content.clone(),
            assisted: event.assisted,
        }
    }
}

/// Share of session time spent editing vs. deliberating (percentages)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeDistribution {
    /// Thinking time as a percentage of non-idle time
    pub thinking_time: f64,
    /// Editing time as a percentage of non-idle time
    pub editing_time: f64,
}

/// Absolute split of inter-event gaps in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBreakdown {
    pub thinking_ms: i64,
    pub editing_ms: i64,
    pub idle_ms: i64,
    pub total_ms: i64,
}

/// Aggregate metrics derived from a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerMetrics {
    /// Percentage of live characters attributed to assisted insertion
    pub assisted_text_percentage: f64,
    /// Thinking vs. editing split
    pub time_distribution: TimeDistribution,
    /// Absolute time split backing `time_distribution`
    pub time_breakdown: TimeBreakdown,
    /// Regularity of the event arrival process
    pub coefficient_of_variation: f64,
    /// Burstiness over fixed-width buckets (null when undefined)
    pub fano_factor: Option<f64>,
    /// Non-empty event counts per bucket
    pub events_per_bucket: Vec<usize>,
}

/// Structured snapshot of a ledger, ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Live document content joined by `\n`
    pub content: String,
    /// Per-line provenance of the live document
    pub lines: Vec<LineProvenance>,
    /// Full chronological event history
    pub events: Vec<EditEvent>,
    /// Sizes of assisted insertions, in ingestion order
    pub assisted_insertions: Vec<usize>,
    /// Derived metrics
    pub metrics: LedgerMetrics,
}

/// Producer metadata embedded in reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Versioned report wrapping a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub session_id: String,
    /// Session start (RFC3339)
    pub started_at_utc: String,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    pub snapshot: LedgerSnapshot,
}
