//! feedwatch: attention telemetry for a news-feed experiment.
//!
//! A synchronous [`Tracker`] turns rendering-surface signals (viewport
//! intersections, pointer movement, clicks, page visibility, modal state)
//! into an event log and per-article attention aggregates. Its handlers return
//! [`SideEffect`]s that the async [`Driver`] executes: batched and immediate
//! collector deliveries with retry, flush timers, and the terminal session
//! log posted to the embedding host.

pub mod config;
pub mod error;
pub mod kernel;
pub mod runtime;
pub mod services;

// Re-export specific items for convenient access
pub use config::TrackerConfig;
pub use kernel::catalog::ArticleCatalog;
pub use kernel::scheduler::SideEffect;
pub use kernel::signal::{ElementRef, PageVisibility, Signal};
pub use kernel::tracker::Tracker;
pub use runtime::driver::Driver;
