use std::time::Duration;
use uuid::Uuid;

use super::delivery::{Delivery, FlushTicket};
use super::session::HostMessage;

/// Work the kernel asks the driver to perform. The kernel never does I/O or
/// sleeps; it returns these and learns about outcomes through callbacks
/// (`flush_due`, `retry_due`, `delivery_failed`).
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Best-effort POST of one payload to the collector.
    Deliver(Delivery),
    /// Arm the batch flush timer.
    ScheduleFlush { ticket: FlushTicket, after: Duration },
    /// Disarm the batch flush timer (queue was flushed early).
    CancelFlush { ticket: FlushTicket },
    /// Fire `retry_due(delivery)` after the backoff delay. Not cancellable.
    ScheduleRetry { delivery: Uuid, after: Duration },
    /// Post the terminal session log to the embedding host, if there is one.
    PostToHost(HostMessage),
}

impl SideEffect {
    pub fn as_delivery(&self) -> Option<&Delivery> {
        match self {
            SideEffect::Deliver(delivery) => Some(delivery),
            _ => None,
        }
    }
}
