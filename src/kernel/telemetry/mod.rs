//! Interaction telemetry: typed events, the canonical event log, and the
//! per-article aggregates built from attention intervals.
//!
//! # LOG INVARIANT
//! The event log is append-only. Events are never mutated after append and
//! the log is the source of truth for the terminal session payload.
//!
//! # AGGREGATE INVARIANT
//! For every article: `total_ms == list_view_ms + modal_view_ms`.

pub mod event;
pub mod metrics;
pub mod recorder;
