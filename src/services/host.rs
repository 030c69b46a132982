use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::HostError;
use crate::kernel::session::HostMessage;

/// Outbound message channel to the embedding host (the parent frame).
///
/// Optional: the driver holds `Option<Arc<dyn HostChannel>>` and a missing
/// host is not an error.
pub trait HostChannel: Send + Sync {
    fn post(&self, message: &HostMessage) -> Result<(), HostError>;
}

/// Writes each message as one JSON line on stdout.
#[derive(Debug, Default)]
pub struct StdoutHost;

impl HostChannel for StdoutHost {
    fn post(&self, message: &HostMessage) -> Result<(), HostError> {
        let line = serde_json::to_string(message)?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// Writes the latest message, pretty-printed, to a file.
#[derive(Debug)]
pub struct FileHost {
    path: PathBuf,
}

impl FileHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HostChannel for FileHost {
    fn post(&self, message: &HostMessage) -> Result<(), HostError> {
        let json = serde_json::to_vec_pretty(message)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-process host: keeps posted messages for the embedding application.
#[derive(Debug, Default)]
pub struct MemoryHost {
    messages: Mutex<Vec<HostMessage>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<HostMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl HostChannel for MemoryHost {
    fn post(&self, message: &HostMessage) -> Result<(), HostError> {
        let mut messages = self.messages.lock().map_err(|_| HostError::Closed)?;
        messages.push(message.clone());
        Ok(())
    }
}
