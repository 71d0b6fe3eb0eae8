//! Publisher format adapters
//!
//! Adapters parse raw publisher JSON into [`Reading`]s. Two formats exist
//! in the field: the Pulse MQTT envelope published to the cloud, and the
//! flat shared-data file older Raspberry Pi installs expose on disk.

mod pulse_message;
mod shared_data;

pub use pulse_message::PulseMessageAdapter;
pub use shared_data::SharedDataAdapter;

use crate::error::EngineError;
use crate::types::Reading;

/// Trait for publisher payload adapters
pub trait ReadingAdapter {
    /// Parse one raw JSON document (a single record or an array of
    /// records) into readings sorted by timestamp
    fn parse(&self, raw_json: &str) -> Result<Vec<Reading>, EngineError>;
}
