//! Shared-data file adapter
//!
//! Older Raspberry Pi installs expose a flat `shared_data.json` that the
//! on-device publisher polls: raw counters, lux, average dB, a
//! `"Title - Artist"` now-playing string, and a local-clock `last_updated`
//! stamp. The file carries no venue or device identity, so the caller
//! supplies both.

use crate::error::EngineError;
use crate::types::{OccupancyCounts, Reading, TrackInfo};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::ReadingAdapter;

const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Adapter for the flat on-device shared-data file
pub struct SharedDataAdapter {
    venue_id: String,
    device_id: String,
}

impl SharedDataAdapter {
    pub fn new(venue_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            venue_id: venue_id.into(),
            device_id: device_id.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SharedDataFile {
    #[serde(default)]
    entries: Option<u64>,
    #[serde(default)]
    exits: Option<u64>,
    #[serde(default)]
    lux: Option<f64>,
    #[serde(default)]
    avg_db: Option<f64>,
    #[serde(default)]
    peak_db: Option<f64>,
    #[serde(default)]
    temperature_c: Option<f64>,
    #[serde(default)]
    temperature_f: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    pressure: Option<f64>,
    #[serde(default)]
    current_song: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
}

impl ReadingAdapter for SharedDataAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<Reading>, EngineError> {
        let files: Vec<SharedDataFile> = if raw_json.trim_start().starts_with('[') {
            serde_json::from_str(raw_json)?
        } else {
            vec![serde_json::from_str(raw_json)?]
        };

        let mut readings = files
            .into_iter()
            .map(|f| self.convert(f))
            .collect::<Result<Vec<_>, _>>()?;
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }
}

impl SharedDataAdapter {
    fn convert(&self, file: SharedDataFile) -> Result<Reading, EngineError> {
        let stamp = file
            .last_updated
            .as_deref()
            .ok_or_else(|| EngineError::TimestampError("missing last_updated".to_string()))?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, LAST_UPDATED_FORMAT)
            .map_err(|e| EngineError::TimestampError(format!("{stamp}: {e}")))?
            .and_utc();

        let occupancy = match (file.entries, file.exits) {
            (None, None) => None,
            (entries, exits) => {
                let entries = entries.unwrap_or(0);
                let exits = exits.unwrap_or(0);
                Some(OccupancyCounts {
                    // The publisher derives the head count the same way
                    current: clamp_u32(entries.saturating_sub(exits)),
                    entries,
                    exits,
                    capacity: None,
                })
            }
        };

        let mut sensor_raw = HashMap::new();
        let aux = [
            ("peak_db", file.peak_db),
            ("temperature_c", file.temperature_c),
            ("temperature_f", file.temperature_f),
            ("humidity", file.humidity),
            ("pressure", file.pressure),
        ];
        for (key, value) in aux {
            if let Some(v) = value {
                sensor_raw.insert(key.to_string(), Value::from(v));
            }
        }

        Ok(Reading {
            venue_id: self.venue_id.clone(),
            device_id: self.device_id.clone(),
            timestamp,
            sound_level_db: file.avg_db.unwrap_or(0.0),
            light_level_lux: file.lux.unwrap_or(0.0),
            occupancy,
            track: parse_track(file.current_song.as_deref()),
            sensor_raw,
        })
    }
}

/// Split the publisher's "Title - Artist" convention; error strings and
/// empty values mean nothing is playing
fn parse_track(current_song: Option<&str>) -> Option<TrackInfo> {
    let song = current_song?.trim();
    if song.is_empty() || song.starts_with("Error") {
        return None;
    }

    match song.split_once(" - ") {
        Some((title, artist)) => Some(TrackInfo {
            title: title.trim().to_string(),
            artist: artist.trim().to_string(),
            album_art: None,
        }),
        None => Some(TrackInfo {
            title: song.to_string(),
            artist: "Unknown".to_string(),
            album_art: None,
        }),
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
