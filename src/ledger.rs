//! Line ledger
//!
//! The ledger mirrors the document line by line. Each consumed [`EditEvent`]
//! mutates the line at its position, and every event is kept in a history
//! from which the rhythm metrics are derived.
//!
//! Lines whose content is longer than the cache threshold are snapshotted
//! into a content-keyed cache. When identical content reappears (redo of a
//! deleted line, a duplicated line, an emptied line refilled with known
//! text) the snapshot is cloned in, so the text keeps its earlier typed /
//! assisted split instead of being credited as fresh input.

use std::collections::HashMap;
use std::fmt;

use crate::config::LedgerConfig;
use crate::diff::characters_altered;
use crate::error::LedgerError;
use crate::features;
use crate::line::LineNode;
use crate::normalizer::split_lines;
use crate::types::{
    EditEvent, EditEventKind, EditEventRecord, LedgerMetrics, LedgerSnapshot, TimeBreakdown,
    TimeDistribution,
};

/// Ordered per-line provenance state for one document
#[derive(Debug, Clone, Default)]
pub struct LineLedger {
    lines: Vec<LineNode>,
    content_cache: HashMap<String, LineNode>,
    history: Vec<EditEvent>,
    assisted_insertions: Vec<usize>,
    config: LedgerConfig,
}

impl LineLedger {
    /// Empty ledger with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty ledger with custom thresholds; the config is validated first
    pub fn with_config(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Number of live lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Live line at `position`
    pub fn get(&self, position: usize) -> Option<&LineNode> {
        self.lines.get(position)
    }

    /// Live lines in document order
    pub fn lines(&self) -> &[LineNode] {
        &self.lines
    }

    /// Every consumed event, in ingestion order
    pub fn history(&self) -> &[EditEvent] {
        &self.history
    }

    /// Cached snapshot for `content`, if any
    pub fn cached(&self, content: &str) -> Option<&LineNode> {
        self.content_cache.get(content)
    }

    pub fn cache_len(&self) -> usize {
        self.content_cache.len()
    }

    /// Sizes of assisted insertions in ingestion order.
    ///
    /// Only insertions credited as assisted characters are listed: dropped
    /// Adds and lines restored from the content cache are left out.
    pub fn assisted_insertions(&self) -> &[usize] {
        &self.assisted_insertions
    }

    /// Consume a wire record, rejecting unknown kinds
    pub fn consume_record(&mut self, record: EditEventRecord) -> Result<(), LedgerError> {
        let event = EditEvent::try_from(record)?;
        self.consume_event(event)
    }

    /// Apply one event.
    ///
    /// The event is appended to the history before dispatch, so it is kept
    /// even when the mutation itself fails.
    pub fn consume_event(&mut self, event: EditEvent) -> Result<(), LedgerError> {
        tracing::debug!(
            kind = event.kind.as_str(),
            line = event.line,
            assisted = event.assisted,
            "consuming edit event"
        );
        self.history.push(event.clone());

        match event.kind {
            EditEventKind::Add => {
                self.add(event);
                Ok(())
            }
            EditEventKind::Delete => {
                self.delete(event.line);
                Ok(())
            }
            EditEventKind::Modify => self.modify(event),
            EditEventKind::Initialise => {
                self.initialise(&event);
                Ok(())
            }
        }
    }

    fn add(&mut self, event: EditEvent) {
        let (node, from_cache) = match self.content_cache.get(&event.content) {
            Some(cached) => {
                let mut node = cached.clone();
                node.events.push(event.clone());
                (node, true)
            }
            None => (LineNode::from_event(&event), false),
        };

        if !self.insert(event.line, node) {
            return;
        }
        if event.assisted && !from_cache {
            self.assisted_insertions
                .push(crate::line::char_len(&event.content));
        }
        self.remember(event.line);
    }

    fn delete(&mut self, position: usize) {
        if position < self.lines.len() {
            self.lines.remove(position);
        } else {
            tracing::warn!(
                line = position,
                lines = self.lines.len(),
                "delete past end of document dropped"
            );
        }
    }

    fn modify(&mut self, event: EditEvent) -> Result<(), LedgerError> {
        let position = event.line;
        let node = self
            .lines
            .get_mut(position)
            .ok_or(LedgerError::LineNotFound { line: position })?;

        let was_empty = node.is_empty();
        let altered = characters_altered(&node.content, &event.content);
        node.credit(altered, event.assisted);
        if event.content.is_empty() {
            node.reset_counters();
        }
        node.content = event.content.clone();
        node.events.push(event.clone());

        // an emptied line refilled with known text takes the cached snapshot
        let restored = was_empty && self.restore_cached(position, &event);
        if event.assisted && !restored {
            self.assisted_insertions.push(altered);
        }

        self.remember(position);
        Ok(())
    }

    /// Replace the line at `position` with the cached node for `event.content`
    fn restore_cached(&mut self, position: usize, event: &EditEvent) -> bool {
        let Some(cached) = self.content_cache.get(&event.content) else {
            return false;
        };
        let mut node = cached.clone();
        node.events.push(event.clone());
        self.lines[position] = node;
        true
    }

    fn initialise(&mut self, event: &EditEvent) {
        self.lines = split_lines(&event.content)
            .into_iter()
            .map(|line| LineNode::from_document_line(line, event))
            .collect();

        tracing::info!(lines = self.lines.len(), "ledger initialised from document");

        for position in 0..self.lines.len() {
            self.remember(position);
        }
    }

    /// Insert at `position`; positions past the current end are dropped
    fn insert(&mut self, position: usize, node: LineNode) -> bool {
        if position > self.lines.len() {
            tracing::warn!(
                line = position,
                lines = self.lines.len(),
                "insert past end of document dropped"
            );
            return false;
        }
        self.lines.insert(position, node);
        true
    }

    /// Snapshot the line at `position` into the cache if it is long enough
    fn remember(&mut self, position: usize) {
        let Some(node) = self.lines.get(position) else {
            return;
        };
        if node.len() > self.config.cache_min_content_length {
            self.content_cache.insert(node.content.clone(), node.clone());
        }
    }

    // ------------------------------------------------------------------
    // Derived metrics
    // ------------------------------------------------------------------

    /// Live document text joined by `\n`
    pub fn content(&self) -> String {
        self.lines
            .iter()
            .map(|node| node.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Share of live characters attributed to assisted insertion (0-100)
    pub fn assisted_text_percentage(&self) -> f64 {
        let (assisted, single) = self.lines.iter().fold((0, 0), |(a, s), node| {
            (
                a + node.number_of_assisted_characters,
                s + node.single_characters_entered,
            )
        });
        features::assisted_percentage(assisted, single)
    }

    fn timestamps(&self) -> Vec<chrono::DateTime<chrono::Utc>> {
        self.history.iter().map(|e| e.timestamp).collect()
    }

    fn gaps_ms(&self) -> Vec<i64> {
        features::inter_event_gaps_ms(&self.timestamps())
    }

    pub fn time_breakdown(&self) -> TimeBreakdown {
        features::time_breakdown(&self.gaps_ms(), &self.config)
    }

    /// Thinking vs. editing percentages; zeros with fewer than two events
    pub fn time_distribution(&self) -> TimeDistribution {
        features::time_distribution(&self.time_breakdown())
    }

    /// Zero with fewer than two events
    pub fn coefficient_of_variation(&self) -> f64 {
        features::coefficient_of_variation(&self.gaps_ms())
    }

    pub fn events_per_bucket(&self) -> Vec<usize> {
        features::events_per_bucket(&self.timestamps(), self.config.bucket_width_ms)
    }

    pub fn fano_factor(&self) -> Option<f64> {
        features::fano_factor(&self.events_per_bucket())
    }

    pub fn metrics(&self) -> LedgerMetrics {
        let gaps = self.gaps_ms();
        let time_breakdown = features::time_breakdown(&gaps, &self.config);
        let events_per_bucket = self.events_per_bucket();

        LedgerMetrics {
            assisted_text_percentage: self.assisted_text_percentage(),
            time_distribution: features::time_distribution(&time_breakdown),
            time_breakdown,
            coefficient_of_variation: features::coefficient_of_variation(&gaps),
            fano_factor: features::fano_factor(&events_per_bucket),
            events_per_bucket,
        }
    }

    /// Structured snapshot for persistence
    pub fn to_snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            content: self.content(),
            lines: self.lines.iter().map(LineNode::provenance).collect(),
            events: self.history.clone(),
            assisted_insertions: self.assisted_insertions.clone(),
            metrics: self.metrics(),
        }
    }
}

impl fmt::Display for LineLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, node) in self.lines.iter().enumerate() {
            writeln!(
                f,
                "{} | {} | {}:{}",
                index,
                node.content,
                node.number_of_assisted_characters,
                node.single_characters_entered
            )?;
        }
        Ok(())
    }
}
