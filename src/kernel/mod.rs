pub mod attention;
pub mod catalog;
pub mod delivery;
pub mod identity;
pub mod scheduler;
pub mod session;
pub mod signal;
pub mod telemetry;
pub mod time;
pub mod tracker;
