use super::event::{EventKind, TelemetryEvent};
use crate::kernel::time::Timestamp;

/// Append-only, ordered history of interaction events.
///
/// Unlike a ring buffer this never evicts: the whole log is shipped in the
/// terminal payload.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<TelemetryEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps and appends unconditionally. Returns the stored record.
    pub fn append(&mut self, ts: Timestamp, pid: Option<&str>, kind: EventKind) -> &TelemetryEvent {
        self.events.push(TelemetryEvent {
            ts,
            pid: pid.map(str::to_string),
            kind,
        });
        // Just pushed, so the log is non-empty
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&TelemetryEvent> {
        self.events.last()
    }

    /// Owned copy of the history, used when building the terminal payload.
    pub fn snapshot(&self) -> Vec<TelemetryEvent> {
        self.events.clone()
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.kind.name() == name).count()
    }
}
