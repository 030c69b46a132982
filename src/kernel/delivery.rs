use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::scheduler::SideEffect;
use super::session::SessionSummary;
use super::telemetry::event::WireEvent;

pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_PENDING_RETRIES: usize = 64;

/// One row-producing record in a collector payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DeliveryRecord {
    Event(WireEvent),
    Summary(SessionSummary),
}

/// Body POSTed to the collector.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorPayload {
    pub events: Vec<DeliveryRecord>,
    pub participant_id: Option<String>,
}

/// A single best-effort send of one payload.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: Uuid,
    pub retry_count: u32,
    pub payload: CollectorPayload,
}

impl Delivery {
    pub fn len(&self) -> usize {
        self.payload.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.events.is_empty()
    }
}

/// Generation of a scheduled flush timer. Only the pending ticket may fire a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlushTicket(pub u64);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub enabled: bool,
    pub batch_interval: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_pending_retries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_interval: Duration::from_millis(DEFAULT_BATCH_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_pending_retries: DEFAULT_MAX_PENDING_RETRIES,
        }
    }
}

/// Batching, immediate sends and retry bookkeeping.
///
/// Pure: never touches the network or timers itself. Every operation returns
/// the side effects the driver must execute.
#[derive(Debug)]
pub struct DeliveryPipeline {
    config: PipelineConfig,
    participant_id: Option<String>,
    batch_queue: Vec<DeliveryRecord>,
    pending_flush: Option<FlushTicket>,
    next_ticket: u64,
    retry_queue: VecDeque<Delivery>,
    closed: bool,
    dropped: u64,
}

impl DeliveryPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            participant_id: None,
            batch_queue: Vec::new(),
            pending_flush: None,
            next_ticket: 0,
            retry_queue: VecDeque::new(),
            closed: false,
            dropped: 0,
        }
    }

    pub fn set_participant(&mut self, participant_id: Option<String>) {
        self.participant_id = participant_id;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn delivery(&self, records: Vec<DeliveryRecord>, retry_count: u32) -> Delivery {
        Delivery {
            id: Uuid::new_v4(),
            retry_count,
            payload: CollectorPayload {
                events: records,
                participant_id: self.participant_id.clone(),
            },
        }
    }

    /// One delivery attempt right now, outside the batch queue.
    pub fn send_immediate(&mut self, record: DeliveryRecord) -> Vec<SideEffect> {
        if !self.config.enabled {
            return Vec::new();
        }
        vec![SideEffect::Deliver(self.delivery(vec![record], 0))]
    }

    /// Sends several records as one payload, bypassing the batch queue.
    /// Used for the terminal dispatch, so it ignores the closed state.
    pub fn send_now(&mut self, records: Vec<DeliveryRecord>) -> Vec<SideEffect> {
        if !self.config.enabled || records.is_empty() {
            return Vec::new();
        }
        vec![SideEffect::Deliver(self.delivery(records, 0))]
    }

    pub fn enqueue_batch(&mut self, record: DeliveryRecord) -> Vec<SideEffect> {
        if !self.config.enabled {
            return Vec::new();
        }
        if self.closed {
            debug!("batch queue closed, record discarded");
            return Vec::new();
        }

        self.batch_queue.push(record);
        if self.pending_flush.is_some() {
            return Vec::new();
        }

        self.next_ticket += 1;
        let ticket = FlushTicket(self.next_ticket);
        self.pending_flush = Some(ticket);
        vec![SideEffect::ScheduleFlush {
            ticket,
            after: self.config.batch_interval,
        }]
    }

    /// Swaps out the batch queue and sends it as one payload. Empty queue: nothing.
    pub fn flush(&mut self) -> Vec<SideEffect> {
        if self.batch_queue.is_empty() {
            return Vec::new();
        }

        let records = std::mem::take(&mut self.batch_queue);
        let mut effects = Vec::with_capacity(2);
        if let Some(ticket) = self.pending_flush.take() {
            effects.push(SideEffect::CancelFlush { ticket });
        }
        effects.push(SideEffect::Deliver(self.delivery(records, 0)));
        effects
    }

    /// Flush timer fired. Stale tickets (cancelled or superseded timers) are ignored.
    pub fn flush_due(&mut self, ticket: FlushTicket) -> Vec<SideEffect> {
        if self.pending_flush != Some(ticket) {
            debug!(?ticket, "stale flush timer ignored");
            return Vec::new();
        }
        // The timer already fired, nothing left to cancel
        self.pending_flush = None;
        self.flush()
    }

    /// A send failed at the transport level. Requeue with backoff or give up.
    pub fn delivery_failed(&mut self, delivery: Delivery) -> Vec<SideEffect> {
        if delivery.retry_count >= self.config.max_retries {
            self.dropped += delivery.len() as u64;
            error!(
                delivery = %delivery.id,
                records = delivery.len(),
                retries = delivery.retry_count,
                "delivery dropped after max retries"
            );
            return Vec::new();
        }

        let after = self.backoff(delivery.retry_count);
        let retry = Delivery {
            retry_count: delivery.retry_count + 1,
            ..delivery
        };

        if self.retry_queue.len() >= self.config.max_pending_retries {
            if let Some(evicted) = self.retry_queue.pop_front() {
                self.dropped += evicted.len() as u64;
                warn!(delivery = %evicted.id, "retry queue full, oldest delivery evicted");
            }
        }
        debug!(delivery = %retry.id, retry = retry.retry_count, ?after, "retry scheduled");
        let id = retry.id;
        self.retry_queue.push_back(retry);

        vec![SideEffect::ScheduleRetry { delivery: id, after }]
    }

    /// The retry timer for `delivery` fired: resend that same batch.
    /// A delivery evicted from the retry queue in the meantime sends nothing.
    pub fn retry_due(&mut self, delivery: Uuid) -> Vec<SideEffect> {
        let Some(index) = self.retry_queue.iter().position(|d| d.id == delivery) else {
            debug!(%delivery, "retry timer fired for a delivery no longer queued");
            return Vec::new();
        };
        match self.retry_queue.remove(index) {
            Some(retry) => vec![SideEffect::Deliver(retry)],
            None => Vec::new(),
        }
    }

    /// `base * 2^retry_count`
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.config.retry_base_delay.saturating_mul(2u32.saturating_pow(retry_count))
    }

    /// Stops accepting batch records. Retries already queued still go out.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn queued(&self) -> usize {
        self.batch_queue.len()
    }

    pub fn pending_flush(&self) -> Option<FlushTicket> {
        self.pending_flush
    }

    pub fn pending_retries(&self) -> usize {
        self.retry_queue.len()
    }

    /// Records abandoned after exhausting retries or evicted from a full retry queue.
    pub fn dropped_records(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let pipeline = DeliveryPipeline::new(PipelineConfig::default());
        let delays: Vec<u64> = (0..3).map(|n| pipeline.backoff(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000]);
    }

    #[test]
    fn test_retry_queue_is_bounded() {
        let mut pipeline = DeliveryPipeline::new(PipelineConfig {
            max_pending_retries: 2,
            ..Default::default()
        });
        for _ in 0..3 {
            let delivery = pipeline.delivery(Vec::new(), 0);
            pipeline.delivery_failed(delivery);
        }
        assert_eq!(pipeline.pending_retries(), 2);
        assert_eq!(pipeline.dropped_records(), 0);
    }

    #[test]
    fn test_evicted_retry_timer_sends_nothing() {
        let mut pipeline = DeliveryPipeline::new(PipelineConfig {
            max_pending_retries: 1,
            ..Default::default()
        });
        let first = pipeline.delivery(Vec::new(), 0);
        let first_id = first.id;
        pipeline.delivery_failed(first);
        pipeline.delivery_failed(pipeline.delivery(Vec::new(), 0));

        assert!(pipeline.retry_due(first_id).is_empty());
        assert_eq!(pipeline.pending_retries(), 1);
    }
}
