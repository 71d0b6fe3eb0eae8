//! venue.sensor_reading.v1 wire schema
//!
//! The JSON envelope venue devices publish (over MQTT, outside this
//! crate's scope) and the blocks inside it. The envelope keys are
//! camelCase, the block keys snake_case — both exactly as the field
//! publishers emit them. Occupancy and now-playing blocks are optional:
//! not every installation has a door sensor or a Spotify hookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current wire schema version
pub const SCHEMA_VERSION: &str = "venue.sensor_reading.v1";

/// Full device message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorMessage {
    pub device_id: String,
    pub venue_id: String,
    pub timestamp: DateTime<Utc>,
    pub sensors: SensorBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<OccupancyBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify: Option<SpotifyBlock>,
}

/// Environmental sensor block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorBlock {
    /// Ambient sound level (dB)
    pub sound_level: f64,
    /// Ambient light level (lux)
    pub light_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indoor_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdoor_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
}

/// Door counter block.
///
/// `current` is signed on the wire: publishers derive it from
/// `entries - exits`, which goes negative after a counter reset. Ingest
/// clamps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyBlock {
    pub current: i64,
    pub entries: u64,
    pub exits: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Now-playing block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyBlock {
    pub current_song: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
}
