//! Per-line provenance state

use serde::{Deserialize, Serialize};

use crate::types::EditEvent;

/// Mutable state of one document line.
///
/// Positions are not stored here; a node's line number is its index in the
/// owning ledger. `Clone` is a deep copy, which is what the content cache
/// relies on to keep snapshots independent of live nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct LineNode {
    /// Characters attributed to discrete keystrokes
    pub single_characters_entered: usize,
    /// Characters attributed to paste / completion
    pub number_of_assisted_characters: usize,
    /// Current text of the line
    pub content: String,
    /// Events that touched this line, oldest first
    pub events: Vec<EditEvent>,
}

impl LineNode {
    /// Fresh node for an added line: the whole content is credited to the
    /// slot selected by `event.assisted`.
    pub fn from_event(event: &EditEvent) -> Self {
        let len = char_len(&event.content);
        let (single, assisted) = if event.assisted { (0, len) } else { (len, 0) };
        Self {
            single_characters_entered: single,
            number_of_assisted_characters: assisted,
            content: event.content.clone(),
            events: vec![event.clone()],
        }
    }

    /// Node for one line of pre-existing document content; whitespace is
    /// stripped and everything left is counted as manual.
    pub fn from_document_line(line: &str, event: &EditEvent) -> Self {
        let content: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        Self {
            single_characters_entered: char_len(&content),
            number_of_assisted_characters: 0,
            content,
            events: vec![event.clone()],
        }
    }

    /// Content length in characters
    pub fn len(&self) -> usize {
        char_len(&self.content)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Credit `count` characters to the slot chosen by `assisted`
    pub fn credit(&mut self, count: usize, assisted: bool) {
        if assisted {
            self.number_of_assisted_characters += count;
        } else {
            self.single_characters_entered += count;
        }
    }

    /// A cleared line carries no provenance
    pub fn reset_counters(&mut self) {
        self.single_characters_entered = 0;
        self.number_of_assisted_characters = 0;
    }

    pub fn provenance(&self) -> LineProvenance {
        LineProvenance {
            content: self.content.clone(),
            single_characters_entered: self.single_characters_entered,
            number_of_assisted_characters: self.number_of_assisted_characters,
            event_count: self.events.len(),
        }
    }
}

/// Serializable view of a live line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProvenance {
    pub content: String,
    pub single_characters_entered: usize,
    pub number_of_assisted_characters: usize,
    pub event_count: usize,
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EditEventKind;
    use chrono::{TimeZone, Utc};

    fn event(content: &str, assisted: bool) -> EditEvent {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        EditEvent::new(0, EditEventKind::Add, ts, content, assisted)
    }

    #[test]
    fn test_from_event_typed() {
        let node = LineNode::from_event(&event("x", false));
        assert_eq!(node.single_characters_entered, 1);
        assert_eq!(node.number_of_assisted_characters, 0);
        assert_eq!(node.events.len(), 1);
    }

    #[test]
    fn test_from_event_assisted_counts_chars_not_bytes() {
        let node = LineNode::from_event(&event("héllo", true));
        assert_eq!(node.single_characters_entered, 0);
        assert_eq!(node.number_of_assisted_characters, 5);
    }

    #[test]
    fn test_document_line_strips_whitespace() {
        let init = EditEvent::initialise(Utc::now(), "  let a = 1;");
        let node = LineNode::from_document_line("  let a = 1;", &init);
        assert_eq!(node.content, "leta=1;");
        assert_eq!(node.single_characters_entered, 7);
        assert_eq!(node.number_of_assisted_characters, 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = LineNode::from_event(&event("some shared line of code", true));
        let mut live = original.clone();
        live.credit(10, false);
        live.content.push_str(" // edited");

        assert_eq!(original.single_characters_entered, 0);
        assert_eq!(original.content, "some shared line of code");
    }
}
