use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};

use crate::error::SourceError;
use crate::kernel::signal::Signal;
use crate::kernel::time::{Clock, ManualClock, Timestamp};

/// Where rendering-surface signals come from. `None` means the surface is gone
/// (treated like an unload by the driver).
///
/// `next_signal` must be cancel-safe: the driver polls it inside `select!`
/// and drops it whenever another branch wins.
#[async_trait]
pub trait SignalSource: Send {
    async fn next_signal(&mut self) -> Option<Signal>;
}

/// Signals pushed by an embedding application.
pub struct ChannelSource {
    rx: mpsc::Receiver<Signal>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Signal>) -> Self {
        Self { rx }
    }

    /// Bounded channel pair; the sender side goes to whatever observes the DOM.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Signal>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl SignalSource for ChannelSource {
    async fn next_signal(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }
}

/// One line of a recorded session script.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedSignal {
    /// Offset from script start.
    pub at_ms: u64,
    pub signal: Signal,
}

/// How a script's offsets turn into time.
pub enum Pacing {
    /// Sleep until each offset on the tokio clock.
    Realtime,
    /// Jump a manual clock to each offset without sleeping.
    Simulated(Arc<ManualClock>),
}

/// Replays a JSON-lines script of timed signals.
pub struct ScriptedSource {
    steps: VecDeque<ScriptedSignal>,
    pacing: Pacing,
    wall_origin: Option<Timestamp>,
    tokio_origin: Option<Instant>,
}

impl ScriptedSource {
    /// Blank lines and lines starting with `#` are skipped.
    pub fn parse(script: &str, pacing: Pacing) -> Result<Self, SourceError> {
        let mut steps = VecDeque::new();
        for (i, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: ScriptedSignal = serde_json::from_str(line).map_err(|source| SourceError::Parse {
                line: i + 1,
                source,
            })?;
            steps.push_back(step);
        }

        let wall_origin = match &pacing {
            Pacing::Simulated(clock) => Some(clock.now()),
            Pacing::Realtime => None,
        };

        Ok(Self {
            steps,
            pacing,
            wall_origin,
            tokio_origin: None,
        })
    }

    pub fn load(path: impl AsRef<Path>, pacing: Pacing) -> Result<Self, SourceError> {
        let script = std::fs::read_to_string(path)?;
        Self::parse(&script, pacing)
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait]
impl SignalSource for ScriptedSource {
    // The step is only popped once its offset has been reached, so a future
    // dropped mid-sleep (lost `select!` race) leaves it queued.
    async fn next_signal(&mut self) -> Option<Signal> {
        let at_ms = self.steps.front()?.at_ms;

        match &self.pacing {
            Pacing::Realtime => {
                let origin = *self.tokio_origin.get_or_insert_with(Instant::now);
                sleep_until(origin + Duration::from_millis(at_ms)).await;
            }
            Pacing::Simulated(clock) => {
                if let Some(origin) = self.wall_origin {
                    clock.advance_to(origin + chrono::Duration::milliseconds(at_ms as i64));
                }
            }
        }

        self.steps.pop_front().map(|step| step.signal)
    }
}
