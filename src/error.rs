//! Error types for feedwatch
//!
//! Tracker handlers themselves are infallible: telemetry is best-effort and
//! these errors only surface at the edges (transport, host channel, config,
//! catalog and replay script loading).

use thiserror::Error;

/// Transport-level delivery failure. Carries no response content.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Collector unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Host channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode host message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Host channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Visibility threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("Batch interval must be greater than zero")]
    ZeroBatchInterval,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate article id in catalog: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read signal script: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid signal on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
