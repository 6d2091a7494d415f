//! Event stream adapter
//!
//! Parses recorded event streams (NDJSON or a JSON array of
//! [`EditEventRecord`]s) and validates them before replay.

use crate::error::LedgerError;
use crate::types::{EditEvent, EditEventRecord};

/// Adapter for recorded edit event streams
pub struct EventStreamAdapter;

impl EventStreamAdapter {
    /// Parse newline-delimited records; blank lines are skipped
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<EditEventRecord>, LedgerError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record = serde_json::from_str::<EditEventRecord>(trimmed).map_err(|e| {
                LedgerError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Parse a JSON array of records
    pub fn parse_array(json: &str) -> Result<Vec<EditEventRecord>, LedgerError> {
        serde_json::from_str(json)
            .map_err(|e| LedgerError::ParseError(format!("Failed to parse event array: {}", e)))
    }

    /// Parse either format, choosing by the first non-whitespace character
    pub fn parse(input: &str) -> Result<Vec<EditEventRecord>, LedgerError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Convert records to typed events, failing on the first unknown kind
    pub fn to_events(records: Vec<EditEventRecord>) -> Result<Vec<EditEvent>, LedgerError> {
        records.into_iter().map(EditEvent::try_from).collect()
    }

    /// Collect every problem in a record stream
    pub fn validate_records(records: &[EditEventRecord]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous = None;

        for (index, record) in records.iter().enumerate() {
            if let Err(error) = record.kind.parse::<crate::types::EditEventKind>() {
                results.push(ValidationResult {
                    index,
                    line: record.line,
                    error,
                });
            }
            if let Some(prev) = previous {
                if record.timestamp < prev {
                    results.push(ValidationResult {
                        index,
                        line: record.line,
                        error: LedgerError::ParseError(format!(
                            "timestamp {} precedes previous event at {}",
                            record.timestamp.to_rfc3339(),
                            prev.to_rfc3339()
                        )),
                    });
                }
            }
            previous = Some(record.timestamp);
        }

        results
    }
}

/// A problem found in one record
#[derive(Debug)]
pub struct ValidationResult {
    /// Position of the record in the stream
    pub index: usize,
    /// Line the record targets
    pub line: usize,
    pub error: LedgerError,
}
