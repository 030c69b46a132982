use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::source::SignalSource;
use crate::kernel::delivery::{Delivery, FlushTicket};
use crate::kernel::scheduler::SideEffect;
use crate::kernel::session::HostMessage;
use crate::kernel::tracker::Tracker;
use crate::services::collector::Transport;
use crate::services::host::HostChannel;

// Async outcomes reported back to the driver loop (never seen by the kernel directly)
#[derive(Debug)]
enum Feedback {
    FlushDue(FlushTicket),
    RetryDue(Uuid),
    Delivered(Uuid),
    DeliveryFailed(Delivery),
}

/// Counters for one driver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub signals: u64,
    pub deliveries_sent: u64,
    pub deliveries_failed: u64,
    pub host_posts: u64,
}

/// Runs a [`Tracker`] against a signal source, executing its side effects:
/// timers become tokio sleeps, deliveries become spawned transport calls,
/// host messages go to the host channel.
///
/// The run ends once the session has ended and nothing is in flight, or when
/// the shutdown grace period runs out.
pub struct Driver<S: SignalSource> {
    tracker: Tracker,
    source: S,
    transport: Option<Arc<dyn Transport>>,
    host: Option<Arc<dyn HostChannel>>,
    feedback_tx: mpsc::UnboundedSender<Feedback>,
    feedback_rx: mpsc::UnboundedReceiver<Feedback>,
    flush_timer: Option<(FlushTicket, JoinHandle<()>)>,
    in_flight: usize,
    shutdown: CancellationToken,
    stats: DriverStats,
}

impl<S: SignalSource> Driver<S> {
    pub fn new(tracker: Tracker, source: S) -> Self {
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        Self {
            tracker,
            source,
            transport: None,
            host: None,
            feedback_tx,
            feedback_rx,
            flush_timer: None,
            in_flight: 0,
            shutdown: CancellationToken::new(),
            stats: DriverStats::default(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostChannel>) -> Self {
        self.host = Some(host);
        self
    }

    /// Cancelling this token ends the session (same as an unload).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Reads the participant from the launch parameters and starts the session.
    pub fn init(&mut self, launch: Option<&str>) {
        let effects = self.tracker.init(launch);
        self.execute(effects);
    }

    pub async fn run(mut self) -> (Tracker, DriverStats) {
        info!(
            collector = self.transport.is_some(),
            host = self.host.is_some(),
            "driver started"
        );

        let grace = self.tracker.config().shutdown_grace;
        let mut source_open = true;
        let mut deadline: Option<Instant> = None;

        loop {
            let ended = self.tracker.session().is_ended();
            if ended {
                if self.in_flight == 0 {
                    break;
                }
                deadline.get_or_insert_with(|| Instant::now() + grace);
            }
            let deadline_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                biased;

                Some(feedback) = self.feedback_rx.recv() => {
                    self.on_feedback(feedback);
                }

                _ = self.shutdown.cancelled(), if !ended => {
                    info!("shutdown requested");
                    let effects = self.tracker.dispose();
                    self.execute(effects);
                }

                signal = self.source.next_signal(), if source_open && !ended => {
                    match signal {
                        Some(signal) => {
                            self.stats.signals += 1;
                            let effects = self.tracker.handle(signal);
                            self.execute(effects);
                        }
                        None => {
                            debug!("signal source exhausted, treating as unload");
                            source_open = false;
                            let effects = self.tracker.dispose();
                            self.execute(effects);
                        }
                    }
                }

                _ = sleep_until(deadline_at), if deadline.is_some() => {
                    warn!(in_flight = self.in_flight, "shutdown grace elapsed, abandoning in-flight sends");
                    break;
                }
            }
        }

        if let Some((_, handle)) = self.flush_timer.take() {
            handle.abort();
        }

        info!(
            signals = self.stats.signals,
            sent = self.stats.deliveries_sent,
            failed = self.stats.deliveries_failed,
            dropped = self.tracker.pipeline().dropped_records(),
            "driver stopped"
        );
        (self.tracker, self.stats)
    }

    fn on_feedback(&mut self, feedback: Feedback) {
        match feedback {
            Feedback::FlushDue(ticket) => {
                if matches!(self.flush_timer, Some((pending, _)) if pending == ticket) {
                    self.flush_timer = None;
                }
                let effects = self.tracker.flush_due(ticket);
                self.execute(effects);
            }
            Feedback::RetryDue(delivery) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let effects = self.tracker.retry_due(delivery);
                self.execute(effects);
            }
            Feedback::Delivered(id) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                debug!(%id, "delivery sent");
            }
            Feedback::DeliveryFailed(delivery) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.stats.deliveries_failed += 1;
                let effects = self.tracker.delivery_failed(delivery);
                self.execute(effects);
            }
        }
    }

    fn execute(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::Deliver(delivery) => self.deliver(delivery),
                SideEffect::ScheduleFlush { ticket, after } => {
                    if let Some((_, stale)) = self.flush_timer.take() {
                        stale.abort();
                    }
                    let tx = self.feedback_tx.clone();
                    let handle = tokio::spawn(async move {
                        sleep(after).await;
                        let _ = tx.send(Feedback::FlushDue(ticket));
                    });
                    self.flush_timer = Some((ticket, handle));
                }
                SideEffect::CancelFlush { ticket } => match self.flush_timer.take() {
                    Some((pending, handle)) if pending == ticket => handle.abort(),
                    other => self.flush_timer = other,
                },
                SideEffect::ScheduleRetry { delivery, after } => {
                    self.in_flight += 1;
                    let tx = self.feedback_tx.clone();
                    tokio::spawn(async move {
                        sleep(after).await;
                        let _ = tx.send(Feedback::RetryDue(delivery));
                    });
                }
                SideEffect::PostToHost(message) => self.post_to_host(&message),
            }
        }
    }

    fn deliver(&mut self, delivery: Delivery) {
        let Some(transport) = self.transport.clone() else {
            debug!(id = %delivery.id, records = delivery.len(), "no transport, delivery skipped");
            return;
        };

        self.in_flight += 1;
        self.stats.deliveries_sent += 1;
        let tx = self.feedback_tx.clone();
        tokio::spawn(async move {
            let feedback = match transport.send(&delivery.payload).await {
                Ok(()) => Feedback::Delivered(delivery.id),
                Err(e) => {
                    warn!(id = %delivery.id, retry = delivery.retry_count, error = %e, "delivery failed");
                    Feedback::DeliveryFailed(delivery)
                }
            };
            let _ = tx.send(feedback);
        });
    }

    // Host failures never affect collector delivery.
    fn post_to_host(&mut self, message: &HostMessage) {
        let Some(host) = &self.host else {
            debug!("no embedding host, session log not posted");
            return;
        };
        match host.post(message) {
            Ok(()) => self.stats.host_posts += 1,
            Err(e) => warn!(error = %e, "host post failed"),
        }
    }
}
