//! Per-layer timing capture.
//!
//! A profiling session records one entry per layer index, created the
//! first time that layer runs. Sessions serialize to a stable JSON
//! shape so hosts can parse reports without version sniffing.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::Result;

/// Microseconds since the UNIX epoch
pub type Micros = u64;

/// Current wall clock reading.
pub fn now_micros() -> Micros {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Timing record of one layer.
///
/// `sequence_index` numbers entries in first-execution order, starting
/// at 1. `end` stays null when the layer never finished.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileEntry {
    pub sequence_index: u64,
    pub name: String,
    pub kind: String,
    pub shapes: Vec<Vec<usize>>,
    pub start: Micros,
    pub end: Option<Micros>,
}

/// One profiling session.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    name: String,
    metadata: String,
    start: Micros,
    end: Option<Micros>,
    layers: Vec<ProfileEntry>,
    #[serde(skip)]
    next_sequence: u64,
    #[serde(skip)]
    by_index: HashMap<usize, usize>,
}

impl Profile {
    /// Start a new session, stamped with the current time.
    pub fn new(name: impl Into<String>, metadata: impl Into<String>) -> Self {
        Profile {
            name: name.into(),
            metadata: metadata.into(),
            start: now_micros(),
            end: None,
            layers: Vec::new(),
            next_sequence: 1,
            by_index: HashMap::new(),
        }
    }

    /// Discard all recorded entries and restart the session in place.
    pub fn reset(&mut self, name: impl Into<String>, metadata: impl Into<String>) {
        self.name = name.into();
        self.metadata = metadata.into();
        self.start = now_micros();
        self.end = None;
        self.layers.clear();
        self.next_sequence = 1;
        self.by_index.clear();
    }

    /// Drop recorded entries, keeping the session identity.
    pub fn clear_entries(&mut self) {
        self.end = None;
        self.layers.clear();
        self.next_sequence = 1;
        self.by_index.clear();
    }

    /// Record an entry for the layer at `index`.
    ///
    /// Only the first call for a given index in a session records
    /// anything; repeat executions of the same layer are ignored.
    pub fn begin_layer(&mut self, index: usize, name: &str, kind: &str, shapes: Vec<Vec<usize>>) {
        if self.by_index.contains_key(&index) {
            return;
        }
        let entry = ProfileEntry {
            sequence_index: self.next_sequence,
            name: name.to_string(),
            kind: kind.to_string(),
            shapes,
            start: now_micros(),
            end: None,
        };
        self.next_sequence += 1;
        self.by_index.insert(index, self.layers.len());
        self.layers.push(entry);
    }

    /// Stamp the end time of the entry for the layer at `index`.
    ///
    /// An end with no matching entry is ignored.
    pub fn end_layer(&mut self, index: usize) {
        if let Some(&position) = self.by_index.get(&index) {
            if let Some(entry) = self.layers.get_mut(position) {
                entry.end = Some(now_micros());
            }
        }
    }

    /// Stamp the session end time.
    pub fn finish(&mut self) {
        self.end = Some(now_micros());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    pub fn start_time(&self) -> Micros {
        self.start
    }

    pub fn end_time(&self) -> Option<Micros> {
        self.end
    }

    pub fn layers(&self) -> &[ProfileEntry] {
        &self.layers
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    /// Serialize the session to its JSON report form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The report emitted when no session exists.
    pub fn empty_report() -> String {
        let empty = Profile {
            name: String::new(),
            metadata: String::new(),
            start: 0,
            end: None,
            layers: Vec::new(),
            next_sequence: 1,
            by_index: HashMap::new(),
        };
        serde_json::to_string(&empty).unwrap_or_default()
    }
}
