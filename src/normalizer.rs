//! Host change normalization
//!
//! Converts a host editor's range-based change notification into the ordered
//! line-level [`EditEvent`]s the ledger consumes. Applying the events in
//! order reproduces the net effect of the change on a per-line model.
//!
//! The host document is read through [`LineSource`]; whether a produced line
//! counts as assisted is decided by an [`AssistHeuristic`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EditEvent, EditEventKind};

/// Split text on `\r\n`, `\r` and `\n`.
///
/// Always yields at least one (possibly empty) line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&text[start..]);
    lines
}

/// Read access to the host document after a change has been applied
pub trait LineSource {
    /// Full text of `line`, or `None` past the end of the document
    fn line_text(&self, line: usize) -> Option<String>;
}

impl LineSource for str {
    fn line_text(&self, line: usize) -> Option<String> {
        split_lines(self).get(line).map(|s| s.to_string())
    }
}

impl LineSource for String {
    fn line_text(&self, line: usize) -> Option<String> {
        self.as_str().line_text(line)
    }
}

impl<T: AsRef<str>> LineSource for [T] {
    fn line_text(&self, line: usize) -> Option<String> {
        self.get(line).map(|s| s.as_ref().to_string())
    }
}

impl<T: AsRef<str>> LineSource for Vec<T> {
    fn line_text(&self, line: usize) -> Option<String> {
        self.as_slice().line_text(line)
    }
}

/// Decides whether inserted text was bulk-inserted rather than typed
pub trait AssistHeuristic {
    fn is_assisted(&self, inserted: &str) -> bool;
}

impl<F> AssistHeuristic for F
where
    F: Fn(&str) -> bool,
{
    fn is_assisted(&self, inserted: &str) -> bool {
        self(inserted)
    }
}

/// Inserted text longer than `max_typed_length` characters is assisted.
///
/// The default of one treats every multi-character insertion as a paste or
/// completion, since a keystroke produces a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthHeuristic {
    pub max_typed_length: usize,
}

impl Default for LengthHeuristic {
    fn default() -> Self {
        Self { max_typed_length: 1 }
    }
}

impl AssistHeuristic for LengthHeuristic {
    fn is_assisted(&self, inserted: &str) -> bool {
        inserted.chars().count() > self.max_typed_length
    }
}

/// One contiguous edit reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// First line of the replaced range
    pub start_line: usize,
    /// Last line of the replaced range
    pub end_line: usize,
    /// Replacement text, possibly spanning several lines
    pub text: String,
}

impl ChangeNotification {
    pub fn new(start_line: usize, end_line: usize, text: impl Into<String>) -> Self {
        Self {
            start_line,
            end_line,
            text: text.into(),
        }
    }
}

/// Turns change notifications into ledger events
pub struct EventNormalizer<H = LengthHeuristic> {
    heuristic: H,
    clock: fn() -> DateTime<Utc>,
}

impl Default for EventNormalizer<LengthHeuristic> {
    fn default() -> Self {
        Self::new()
    }
}

impl EventNormalizer<LengthHeuristic> {
    /// Normalizer using the length heuristic and the system clock
    pub fn new() -> Self {
        Self::with_heuristic(LengthHeuristic::default())
    }
}

impl<H: AssistHeuristic> EventNormalizer<H> {
    pub fn with_heuristic(heuristic: H) -> Self {
        Self {
            heuristic,
            clock: Utc::now,
        }
    }

    /// Replace the timestamp source
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Lazily normalize one change. `document` must already reflect the change.
    pub fn normalize<'a>(
        &'a self,
        change: &'a ChangeNotification,
        document: &'a dyn LineSource,
    ) -> NormalizedEvents<'a, H> {
        let start_line = change.start_line.min(change.end_line);
        let end_line = change.start_line.max(change.end_line);
        let inserted = split_lines(&change.text);

        let plan = if start_line == end_line {
            Plan::SingleLine { next: 0 }
        } else {
            Plan::Span {
                next_removal: Some(end_line - start_line),
                next_add: 1,
            }
        };

        NormalizedEvents {
            normalizer: self,
            document,
            start_line,
            inserted,
            plan,
        }
    }

    /// Normalize every change of one host notification, in order
    pub fn normalize_all<'a>(
        &'a self,
        changes: &'a [ChangeNotification],
        document: &'a dyn LineSource,
    ) -> impl Iterator<Item = EditEvent> + 'a {
        changes
            .iter()
            .flat_map(move |change| self.normalize(change, document))
    }

    fn event(&self, line: usize, kind: EditEventKind, content: String, assisted: bool) -> EditEvent {
        EditEvent::new(line, kind, (self.clock)(), content, assisted)
    }
}

enum Plan {
    /// Modify the start line, then add each further inserted line
    SingleLine { next: usize },
    /// Remove the span bottom-up (the start line is modified last), then add
    /// each further inserted line
    Span {
        next_removal: Option<usize>,
        next_add: usize,
    },
}

/// Lazy event sequence for one change
pub struct NormalizedEvents<'a, H> {
    normalizer: &'a EventNormalizer<H>,
    document: &'a dyn LineSource,
    start_line: usize,
    inserted: Vec<&'a str>,
    plan: Plan,
}

impl<H> NormalizedEvents<'_, H> {
    fn current_line(&self, line: usize) -> String {
        match self.document.line_text(line) {
            Some(text) => text,
            None => {
                tracing::warn!(line, "host document has no such line, using empty content");
                String::new()
            }
        }
    }
}

impl<H: AssistHeuristic> Iterator for NormalizedEvents<'_, H> {
    type Item = EditEvent;

    fn next(&mut self) -> Option<EditEvent> {
        let heuristic = &self.normalizer.heuristic;
        match self.plan {
            Plan::SingleLine { ref mut next } => {
                let i = *next;
                let fragment = *self.inserted.get(i)?;
                *next += 1;

                let line = self.start_line + i;
                let assisted = heuristic.is_assisted(fragment);
                if i == 0 {
                    let content = self.current_line(line);
                    Some(self.normalizer.event(line, EditEventKind::Modify, content, assisted))
                } else {
                    Some(self.normalizer.event(
                        line,
                        EditEventKind::Add,
                        fragment.to_string(),
                        assisted,
                    ))
                }
            }
            Plan::Span {
                ref mut next_removal,
                ref mut next_add,
            } => {
                if let Some(offset) = *next_removal {
                    *next_removal = offset.checked_sub(1);
                    let line = self.start_line + offset;
                    if offset == 0 {
                        let content = self.current_line(line);
                        return Some(self.normalizer.event(
                            line,
                            EditEventKind::Modify,
                            content,
                            false,
                        ));
                    }
                    return Some(self.normalizer.event(
                        line,
                        EditEventKind::Delete,
                        String::new(),
                        false,
                    ));
                }

                let i = *next_add;
                let fragment = *self.inserted.get(i)?;
                *next_add += 1;
                Some(self.normalizer.event(
                    self.start_line + i,
                    EditEventKind::Add,
                    fragment.to_string(),
                    true,
                ))
            }
        }
    }
}
