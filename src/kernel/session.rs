use serde::{Deserialize, Serialize};

use super::telemetry::event::TelemetryEvent;
use super::telemetry::metrics::{EnrichedAttentionRecord, HoverRecord, TrafficLightHoverRecord};
use super::time::{elapsed_ms, Timestamp};

/// Message type the embedding host listens for.
pub const HOST_MESSAGE_TYPE: &str = "traffic_experiment_log";

/// Record type of the condensed summary row sent to the collector.
pub const SUMMARY_RECORD_TYPE: &str = "session_summary";

/// Lifecycle of one tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Tracker constructed, nothing recorded yet.
    NotStarted,
    /// Recording interactions.
    Active,
    /// Terminal payload built and dispatched. Nothing leaves this state.
    Ended,
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::NotStarted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    Start,
    End,
}

pub struct SessionGraph;

impl SessionGraph {
    /// Pure function: (Current Phase, Request) -> New Phase.
    /// Returns None if the request is ignored in the current phase.
    pub fn transition(current: SessionPhase, request: SessionRequest) -> Option<SessionPhase> {
        use SessionPhase::*;
        use SessionRequest::*;

        match (current, request) {
            (NotStarted, Start) => Some(Active),
            (Active, End) => Some(Ended),
            // Repeated starts, ends before start and anything after end are no-ops
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    phase: SessionPhase,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call started the session.
    pub fn start(&mut self, now: Timestamp) -> bool {
        match SessionGraph::transition(self.phase, SessionRequest::Start) {
            Some(next) => {
                self.phase = next;
                self.start = Some(now);
                true
            }
            None => false,
        }
    }

    /// Returns true if this call ended the session. The end timestamp is the
    /// sentinel: once set it is never overwritten.
    pub fn end(&mut self, now: Timestamp) -> bool {
        if self.end.is_some() {
            return false;
        }
        match SessionGraph::transition(self.phase, SessionRequest::End) {
            Some(next) => {
                self.phase = next;
                self.end = Some(now);
                true
            }
            None => false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn is_ended(&self) -> bool {
        self.phase == SessionPhase::Ended
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.start
    }

    pub fn ended_at(&self) -> Option<Timestamp> {
        self.end
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(elapsed_ms(start, end)),
            _ => None,
        }
    }
}

/// Terminal payload: everything recorded in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub participant_id: Option<String>,
    pub session_start: Option<Timestamp>,
    pub session_end: Option<Timestamp>,
    pub events: Vec<TelemetryEvent>,
    pub article_times: Vec<EnrichedAttentionRecord>,
    pub article_hovers: Vec<HoverRecord>,
    pub traffic_light_hovers: Vec<TrafficLightHoverRecord>,
}

impl SessionReport {
    /// Condensed row for the collector: aggregates without the event list.
    pub fn summary(&self) -> SessionSummary {
        let total_session_ms = match (self.session_start, self.session_end) {
            (Some(start), Some(end)) => Some(elapsed_ms(start, end)),
            _ => None,
        };

        SessionSummary {
            record_type: SUMMARY_RECORD_TYPE.to_string(),
            participant_id: self.participant_id.clone(),
            session_start: self.session_start,
            session_end: self.session_end,
            total_session_ms,
            article_times: self.article_times.clone(),
            article_hovers: self.article_hovers.clone(),
            traffic_light_hovers: self.traffic_light_hovers.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(rename = "type")]
    pub record_type: String,
    pub participant_id: Option<String>,
    pub session_start: Option<Timestamp>,
    pub session_end: Option<Timestamp>,
    pub total_session_ms: Option<u64>,
    pub article_times: Vec<EnrichedAttentionRecord>,
    pub article_hovers: Vec<HoverRecord>,
    pub traffic_light_hovers: Vec<TrafficLightHoverRecord>,
}

/// Structured message posted to the embedding host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: SessionReport,
}

impl HostMessage {
    pub fn new(payload: SessionReport) -> Self {
        Self {
            message_type: HOST_MESSAGE_TYPE.to_string(),
            payload,
        }
    }
}
