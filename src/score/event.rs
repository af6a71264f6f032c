use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{Note, ScoreError};

pub const DEFAULT_LIKELIHOOD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SingleNote,
    Chord,
    Rest,
}

/// A weighted group of notes: what one `respond` call on a node may
/// play. The kind is derived from the contents, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    notes: Vec<Note>,
    likelihood: f64,
}

impl NodeEvent {
    /// Builds an event from a note list. An empty list is rejected; a
    /// list containing any rest collapses to a pure rest event.
    pub fn new(notes: Vec<Note>, likelihood: f64) -> Result<Self, ScoreError> {
        if notes.is_empty() {
            return Err(ScoreError::EmptyEvent);
        }
        let notes = if notes.iter().any(Note::is_rest) {
            vec![Note::rest()]
        } else {
            notes
        };
        Ok(Self {
            notes,
            likelihood: likelihood.max(0.0),
        })
    }

    pub fn single(note: Note, likelihood: f64) -> Self {
        Self {
            notes: vec![note],
            likelihood: likelihood.max(0.0),
        }
    }

    pub fn rest() -> Self {
        Self::single(Note::rest(), DEFAULT_LIKELIHOOD)
    }

    pub fn kind(&self) -> EventKind {
        if self.notes.len() > 1 {
            EventKind::Chord
        } else if self.notes[0].is_rest() {
            EventKind::Rest
        } else {
            EventKind::SingleNote
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn likelihood(&self) -> f64 {
        self.likelihood
    }

    pub fn set_likelihood(&mut self, likelihood: f64) {
        self.likelihood = likelihood.max(0.0);
    }

    /// Replaces the note list, with the same normalization as `new`.
    pub fn set_notes(&mut self, notes: Vec<Note>) -> Result<(), ScoreError> {
        if notes.is_empty() {
            return Err(ScoreError::EmptyEvent);
        }
        self.notes = if notes.iter().any(Note::is_rest) {
            vec![Note::rest()]
        } else {
            notes
        };
        Ok(())
    }
}

impl Default for NodeEvent {
    fn default() -> Self {
        Self::rest()
    }
}

/// Weighted draw over an event list. With weights `w_1..w_n`, event `k`
/// is picked when a uniform draw from `[0, sum)` lands in
/// `[sum_{i<k}, sum_{i<=k})`, so zero-weight events are unreachable
/// while any positive weight exists. A single-entry list (or an
/// all-zero one) always yields the first entry.
pub fn choose_event<'a>(events: &'a [NodeEvent], rng: &mut dyn RngCore) -> Option<&'a NodeEvent> {
    if events.is_empty() {
        return None;
    }
    let total: f64 = events.iter().map(NodeEvent::likelihood).sum();
    if events.len() == 1 || total <= 0.0 {
        return events.first();
    }
    let decider = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for event in events {
        cumulative += event.likelihood();
        if decider < cumulative {
            return Some(event);
        }
    }
    // Float slack can leave the draw a hair past the last boundary.
    events.last()
}
