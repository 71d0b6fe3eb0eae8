//! Pulse Core - venue analytics engine for the Pulse dashboard
//!
//! Pulse Core turns periodic venue sensor readings (sound, light,
//! cumulative door counters, now-playing metadata) into a normalized
//! occupancy signal, an estimated guest dwell time, and a composite 0-100
//! environmental quality score that adapts to each venue's own
//! best-performing nights.
//!
//! Pipeline: readings → bar-day windowing → occupancy reconciliation →
//! dwell estimation → learned-range scoring → [`VenueState`].
//!
//! ## Modules
//!
//! - **Occupancy Reconciler**: normalize counter and presence feeds into per-day figures
//! - **Dwell Estimator**: FIFO cohort matching over entry/exit deltas
//! - **Venue Learning Store**: best-night profiles per venue and time slot
//! - **Composite Scorer**: tolerance-band scoring against learned-or-default ranges

pub mod adapters;
pub mod bar_day;
pub mod dwell;
pub mod error;
pub mod learning;
pub mod occupancy;
pub mod pipeline;
pub mod schedule;
pub mod schema;
pub mod scoring;
pub mod types;

pub use error::EngineError;
pub use pipeline::{
    compute_state_from_readings, EngineConfig, MemoryReadingStore, PulseEngine, ReadingStore,
};
pub use types::{Reading, VenueState, STATE_VERSION};

// Schema exports
pub use schema::{SensorMessage, SCHEMA_VERSION};

/// Engine version embedded in all venue-state payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for venue-state payloads
pub const ENGINE_NAME: &str = "pulse-core";
