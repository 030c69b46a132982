use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::attention::{AttentionTracker, HoverTransition};
use super::catalog::ArticleCatalog;
use super::delivery::{Delivery, DeliveryPipeline, DeliveryRecord, FlushTicket};
use super::identity::{participant_from_launch, ParticipantId};
use super::scheduler::SideEffect;
use super::session::{HostMessage, Session, SessionPhase, SessionReport};
use super::signal::{ElementRef, PageVisibility, Signal};
use super::telemetry::event::{EventKind, TelemetryEvent, ViewContext, WireEvent};
use super::telemetry::metrics::AttentionLedger;
use super::telemetry::recorder::EventLog;
use super::time::{Clock, Timestamp};
use crate::config::TrackerConfig;

/// The single tracking context for one page session.
///
/// Lifecycle is explicit: `new` (create) -> `init` (parse participant, start
/// session) -> `dispose` (end session, emit terminal payload). Every handler
/// is synchronous and infallible, mutates state within the call, and returns
/// the side effects for the driver. Nothing here awaits or performs I/O.
pub struct Tracker {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    catalog: Arc<ArticleCatalog>,
    participant: Option<ParticipantId>,
    session: Session,
    attention: AttentionTracker,
    log: EventLog,
    pipeline: DeliveryPipeline,
    report: Option<SessionReport>,
}

impl Tracker {
    pub fn new(config: TrackerConfig, catalog: Arc<ArticleCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            attention: AttentionTracker::new(config.visibility_threshold),
            pipeline: DeliveryPipeline::new(config.pipeline()),
            config,
            clock,
            catalog,
            participant: None,
            session: Session::new(),
            log: EventLog::new(),
            report: None,
        }
    }

    /// Reads the participant id from the launch parameters and starts the session.
    pub fn init(&mut self, launch: Option<&str>) -> Vec<SideEffect> {
        let participant = launch.and_then(participant_from_launch);
        self.set_participant(participant);
        self.start_session()
    }

    pub fn set_participant(&mut self, participant: Option<ParticipantId>) {
        if self.session.phase() != SessionPhase::NotStarted {
            debug!("participant is fixed once the session has started");
            return;
        }
        self.pipeline.set_participant(participant.as_ref().map(|p| p.to_string()));
        self.participant = participant;
    }

    /// `not_started -> active`. Idempotent.
    pub fn start_session(&mut self) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        let now = self.clock.now();
        if self.session.start(now) {
            info!(participant = ?self.participant_id(), "session started");
            self.log_event(EventKind::SessionStart, &mut effects);
        }
        effects
    }

    /// Dispatches one rendering-surface signal. Mirrors the listener wiring of the page.
    pub fn handle(&mut self, signal: Signal) -> Vec<SideEffect> {
        match signal {
            Signal::Intersection { article_id, ratio, is_intersecting } => {
                self.on_intersection(&article_id, ratio, is_intersecting)
            }
            Signal::PointerEnter { target } => self.on_pointer_enter(&target),
            Signal::PointerLeave { target } => self.on_pointer_leave(&target),
            Signal::Click { target, modal_active } => self.on_click(&target, modal_active),
            Signal::VisibilityState { state } => self.on_page_visibility(state),
            Signal::ModalOpened { article_id } => self.open_modal(&article_id),
            Signal::ModalClosed => self.close_modal(),
            Signal::Unload => self.dispose(),
        }
    }

    // A session that has not started yet is started by the first signal.
    // Nothing is recorded once it has ended.
    fn admit(&mut self, effects: &mut Vec<SideEffect>) -> bool {
        if self.session.is_ended() {
            debug!("signal after session end ignored");
            return false;
        }
        if !self.session.is_active() {
            effects.extend(self.start_session());
        }
        true
    }

    pub fn on_intersection(&mut self, article_id: &str, ratio: f64, is_intersecting: bool) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if article_id.is_empty() || !self.admit(&mut effects) {
            return effects;
        }
        let now = self.clock.now();
        if let Some(kind) = self.attention.on_intersection(article_id, ratio, is_intersecting, now) {
            self.log_event(kind, &mut effects);
        }
        effects
    }

    pub fn open_modal(&mut self, article_id: &str) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if article_id.is_empty() || !self.admit(&mut effects) {
            return effects;
        }
        let now = self.clock.now();
        for kind in self.attention.open_modal(article_id, now) {
            self.log_event(kind, &mut effects);
        }
        effects
    }

    pub fn close_modal(&mut self) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if !self.admit(&mut effects) {
            return effects;
        }
        let now = self.clock.now();
        if let Some(kind) = self.attention.close_modal(now) {
            self.log_event(kind, &mut effects);
        }
        effects
    }

    pub fn on_pointer_enter(&mut self, target: &ElementRef) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if !self.admit(&mut effects) {
            return effects;
        }
        let now = self.clock.now();
        if let Some(opened) = self.attention.hover_enter(target, now) {
            self.record_hover(opened, &mut effects);
        }
        effects
    }

    pub fn on_pointer_leave(&mut self, target: &ElementRef) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if !self.admit(&mut effects) {
            return effects;
        }
        let now = self.clock.now();
        if let Some(closed) = self.attention.hover_leave(target, now) {
            self.record_hover(closed, &mut effects);
        }
        effects
    }

    fn record_hover(&mut self, transition: HoverTransition, effects: &mut Vec<SideEffect>) {
        let meta = self.catalog.meta(&transition.article_id);
        let kind = match transition.duration_ms {
            None => EventKind::hover_start(&transition.article_id, transition.is_traffic_light, meta),
            Some(ms) => EventKind::hover_end(&transition.article_id, transition.is_traffic_light, ms, meta),
        };
        let event = self.log_event(kind, effects);
        if event.is_critical() {
            self.send_critical(event, effects);
        }
    }

    pub fn on_click(&mut self, target: &ElementRef, modal_active: bool) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if !self.admit(&mut effects) {
            return effects;
        }

        let context = if modal_active { ViewContext::Modal } else { ViewContext::List };
        let meta = target.article_id.as_deref().and_then(|id| self.catalog.meta(id));
        let kind = EventKind::click(target.article_id.clone(), target.classify(), context, meta);

        let event = self.log_event(kind, &mut effects);
        self.send_critical(event, &mut effects);
        effects
    }

    /// Hidden: close every visible interval (`tab_hidden`), log, then flush.
    /// Visible: log only; the viewport has to re-trigger visibility.
    pub fn on_page_visibility(&mut self, state: PageVisibility) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if !self.admit(&mut effects) {
            return effects;
        }

        let visible = state == PageVisibility::Visible;
        if visible == self.attention.page_visible() {
            debug!(?state, "page visibility unchanged");
            return effects;
        }

        let now = self.clock.now();
        self.attention.set_page_visible(visible);
        match state {
            PageVisibility::Hidden => {
                for kind in self.attention.pause_all(ViewContext::TabHidden, now) {
                    self.log_event(kind, &mut effects);
                }
                self.log_event(EventKind::PageHidden, &mut effects);
                effects.extend(self.pipeline.flush());
            }
            PageVisibility::Visible => {
                self.log_event(EventKind::PageVisible, &mut effects);
            }
        }
        effects
    }

    /// Page unload. Same as `end_session`.
    pub fn dispose(&mut self) -> Vec<SideEffect> {
        self.end_session()
    }

    /// `active -> ended`: close everything, flush, build and dispatch the
    /// terminal payload to the host and the collector. Idempotent.
    pub fn end_session(&mut self) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if !self.session.is_active() {
            debug!(phase = ?self.session.phase(), "end requested outside an active session");
            return effects;
        }

        // 1. Close visibility intervals
        let now = self.clock.now();
        for kind in self.attention.pause_all(ViewContext::SessionEnd, now) {
            self.log_event(kind, &mut effects);
        }

        // 2. Close hover intervals (commit only, no events)
        let closed_hovers = self.attention.close_all_hovers(now);

        // 3. Stamp end
        let end = self.clock.now();
        self.session.end(end);

        // 4. Flush, then close the batch queue
        effects.extend(self.pipeline.flush());
        self.pipeline.close();

        // 5. Build the terminal payload (before session_end is appended)
        let report = self.build_report();

        // 6. Informational terminal event
        self.log_event(EventKind::SessionEnd, &mut effects);

        info!(
            participant = ?self.participant_id(),
            events = report.events.len(),
            articles = report.article_times.len(),
            closed_hovers,
            "session ended"
        );
        if let Ok(json) = serde_json::to_string(&report) {
            debug!(payload = %json, "terminal payload");
        }

        // 7. Host sink
        effects.push(SideEffect::PostToHost(HostMessage::new(report.clone())));

        // 8. Collector sink, independent of the host
        let session_start = self.session.started_at();
        let participant_id = self.participant_id().map(str::to_string);
        let full_log: Vec<DeliveryRecord> = self
            .log
            .events()
            .iter()
            .map(|event| {
                DeliveryRecord::Event(WireEvent {
                    timestamp: event.ts,
                    event: event.clone(),
                    participant_id: participant_id.clone(),
                    session_start,
                })
            })
            .collect();
        effects.extend(self.pipeline.send_now(full_log));
        effects.extend(self.pipeline.send_now(vec![DeliveryRecord::Summary(report.summary())]));

        self.report = Some(report);
        effects
    }

    fn build_report(&self) -> SessionReport {
        let ledger = self.attention.ledger();
        SessionReport {
            participant_id: self.participant_id().map(str::to_string),
            session_start: self.session.started_at(),
            session_end: self.session.ended_at(),
            events: self.log.snapshot(),
            article_times: ledger.enriched_articles(&self.catalog),
            article_hovers: ledger.hover_records(),
            traffic_light_hovers: ledger.traffic_light_hover_records(),
        }
    }

    /// Appends to the log and batches the event unless it is critical.
    /// Returns a copy of the stored event so the caller can route critical ones.
    fn log_event(&mut self, kind: EventKind, effects: &mut Vec<SideEffect>) -> TelemetryEvent {
        let now = self.clock.now();
        let pid = self.participant.as_ref().map(|p| p.to_string());
        let event = self.log.append(now, pid.as_deref(), kind).clone();

        if !event.is_critical() {
            let record = self.wire(&event, now);
            effects.extend(self.pipeline.enqueue_batch(record));
        }
        event
    }

    fn send_critical(&mut self, event: TelemetryEvent, effects: &mut Vec<SideEffect>) {
        let now = self.clock.now();
        let record = self.wire(&event, now);
        if self.config.send_critical_immediately {
            effects.extend(self.pipeline.send_immediate(record));
        } else {
            effects.extend(self.pipeline.enqueue_batch(record));
        }
    }

    fn wire(&self, event: &TelemetryEvent, now: Timestamp) -> DeliveryRecord {
        DeliveryRecord::Event(WireEvent {
            event: event.clone(),
            timestamp: now,
            participant_id: self.participant_id().map(str::to_string),
            session_start: self.session.started_at(),
        })
    }

    /// Flushes the batch queue now.
    pub fn flush(&mut self) -> Vec<SideEffect> {
        self.pipeline.flush()
    }

    /// Batch timer callback.
    pub fn flush_due(&mut self, ticket: FlushTicket) -> Vec<SideEffect> {
        self.pipeline.flush_due(ticket)
    }

    /// Retry timer callback for one delivery.
    pub fn retry_due(&mut self, delivery: Uuid) -> Vec<SideEffect> {
        self.pipeline.retry_due(delivery)
    }

    /// Transport reported a failure for `delivery`.
    pub fn delivery_failed(&mut self, delivery: Delivery) -> Vec<SideEffect> {
        self.pipeline.delivery_failed(delivery)
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant.as_ref().map(|p| p.as_str())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn ledger(&self) -> &AttentionLedger {
        self.attention.ledger()
    }

    pub fn attention(&self) -> &AttentionTracker {
        &self.attention
    }

    pub fn pipeline(&self) -> &DeliveryPipeline {
        &self.pipeline
    }

    pub fn catalog(&self) -> &ArticleCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Terminal payload, once the session has ended.
    pub fn report(&self) -> Option<&SessionReport> {
        self.report.as_ref()
    }
}
