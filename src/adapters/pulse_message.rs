//! Pulse envelope adapter
//!
//! Parses the `venue.sensor_reading.v1` MQTT envelope into readings.
//! Auxiliary sensor fields (temperature, humidity, pressure) are preserved
//! in `sensor_raw` for transparency without the pipeline interpreting them.

use crate::error::EngineError;
use crate::schema::SensorMessage;
use crate::types::{OccupancyCounts, Reading, TrackInfo};
use log::warn;
use serde_json::Value;
use std::collections::HashMap;

use super::ReadingAdapter;

/// Adapter for the Pulse MQTT envelope
pub struct PulseMessageAdapter;

impl ReadingAdapter for PulseMessageAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<Reading>, EngineError> {
        let messages: Vec<SensorMessage> = if raw_json.trim_start().starts_with('[') {
            serde_json::from_str(raw_json)?
        } else {
            vec![serde_json::from_str(raw_json)?]
        };

        let mut readings: Vec<Reading> = messages.into_iter().map(convert).collect();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }
}

fn convert(msg: SensorMessage) -> Reading {
    let occupancy = msg.occupancy.map(|o| {
        if o.current < 0 {
            warn!(
                "negative head count {} from {}, clamping to 0",
                o.current, msg.device_id
            );
        }
        OccupancyCounts {
            current: o.current.clamp(0, u32::MAX as i64) as u32,
            entries: o.entries,
            exits: o.exits,
            capacity: o.capacity,
        }
    });

    let track = msg.spotify.map(|s| TrackInfo {
        title: s.current_song,
        artist: s.artist,
        album_art: s.album_art,
    });

    let mut sensor_raw = HashMap::new();
    let aux = [
        ("indoor_temperature", msg.sensors.indoor_temperature),
        ("outdoor_temperature", msg.sensors.outdoor_temperature),
        ("humidity", msg.sensors.humidity),
        ("pressure", msg.sensors.pressure),
    ];
    for (key, value) in aux {
        if let Some(v) = value {
            sensor_raw.insert(key.to_string(), Value::from(v));
        }
    }

    Reading {
        venue_id: msg.venue_id,
        device_id: msg.device_id,
        timestamp: msg.timestamp,
        sound_level_db: msg.sensors.sound_level,
        light_level_lux: msg.sensors.light_level,
        occupancy,
        track,
        sensor_raw,
    }
}
