//! Core types for the Pulse venue analytics pipeline
//!
//! This module defines the data structures that flow through each stage of
//! the pipeline: sensor readings, normalized occupancy, dwell estimates,
//! composite scores, and the aggregated venue state handed to presentation
//! layers.

use crate::bar_day::BarDay;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Version identifier embedded in every venue-state payload
pub const STATE_VERSION: &str = "pulse.venue_state.v1";

/// Currently-playing track metadata reported alongside a reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
}

/// Cumulative occupancy counters as reported by a door sensor.
///
/// `entries` and `exits` count since device boot, not per interval. They
/// only become per-day figures after reconciliation against a bar-day
/// baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyCounts {
    /// Live head count; clamped at 0 on ingest because publishers derive it
    /// from `entries - exits`, which goes negative after a counter reset
    pub current: u32,
    /// Cumulative entries since device boot
    pub entries: u64,
    /// Cumulative exits since device boot
    pub exits: u64,
    /// Declared venue capacity, when the installation knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// One sensor sample from a venue device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub venue_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    /// Ambient sound level (dB)
    pub sound_level_db: f64,
    /// Ambient light level (lux)
    pub light_level_lux: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<OccupancyCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackInfo>,
    /// Auxiliary sensor fields (temperature, humidity, pressure) preserved
    /// for transparency; the pipeline does not interpret them
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub sensor_raw: HashMap<String, serde_json::Value>,
}

/// Sensor feed classification, inferred once per window from observed
/// counter behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Entries/exits increment meaningfully; per-day figures come from
    /// counter deltas
    CounterBased,
    /// Counters stay at zero while the live head count fluctuates;
    /// entries/exits can only be estimated from presence deltas
    PresenceOnly,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::CounterBased => "counter_based",
            DeviceClass::PresenceOnly => "presence_only",
        }
    }
}

/// Normalized occupancy for the active bar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    /// People currently inside, never negative
    pub current: u32,
    /// Entries since bar-day start
    pub today_entries: u64,
    /// Exits since bar-day start
    pub today_exits: u64,
    /// Highest head count observed at any reading this bar day
    pub peak_occupancy: u32,
    pub device_class: DeviceClass,
    /// True when entries/exits were inferred from presence deltas rather
    /// than read from counters
    pub is_estimated: bool,
    /// False when no readings existed in the bar-day window (a venue before
    /// opening legitimately has zero data)
    pub has_data: bool,
}

impl OccupancySnapshot {
    /// The explicit "no data for this bar day" condition
    pub fn no_data() -> Self {
        Self {
            current: 0,
            today_entries: 0,
            today_exits: 0,
            peak_occupancy: 0,
            device_class: DeviceClass::CounterBased,
            is_estimated: false,
            has_data: false,
        }
    }
}

impl Default for OccupancySnapshot {
    fn default() -> Self {
        Self::no_data()
    }
}

/// Average guest dwell time with its confidence bounds.
///
/// Absent entirely (`None` at the call site) when the device class cannot
/// support estimation or no trustworthy samples survived filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DwellEstimate {
    pub average_minutes: f64,
    /// Number of matched entry/exit pairs that survived sanity filtering
    pub sample_count: usize,
    /// Shortest surviving sample (minutes)
    pub min_minutes: f64,
    /// Longest surviving sample (minutes)
    pub max_minutes: f64,
}

/// Venue status derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueStatus {
    Optimal,
    Good,
    Poor,
}

impl VenueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueStatus::Optimal => "optimal",
            VenueStatus::Good => "good",
            VenueStatus::Poor => "poor",
        }
    }
}

/// Per-factor sub-scores (0-100).
///
/// Crowd and music are optional: crowd needs occupancy data, music needs
/// track metadata. An absent factor is excluded from the weighted sum, not
/// scored as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub sound: f64,
    pub light: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crowd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<f64>,
}

/// Composite environmental quality score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 0-100 blended quality metric
    pub score: f64,
    pub status: VenueStatus,
    pub factor_scores: FactorScores,
    /// True only when a learned profile existed for the current time slot;
    /// false means defaults were used and the venue is still learning
    pub using_historical_data: bool,
    /// 0-100 similarity between current sound/light and the best night's
    /// recorded values; absent without a learned profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity_to_best: Option<f64>,
}

/// Engine provenance metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

impl EngineInfo {
    pub fn new(instance_id: String) -> Self {
        Self {
            name: crate::ENGINE_NAME.to_string(),
            version: crate::ENGINE_VERSION.to_string(),
            instance_id,
        }
    }
}

/// Aggregated venue state — the single object presentation layers consume.
///
/// `score: None` means "no data", which is distinct from a low score at a
/// quiet venue; `dwell: None` means the estimator reported unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueState {
    pub state_version: String,
    pub venue_id: String,
    pub bar_day: BarDay,
    /// Learning slot key for this instant, e.g. "fri-21"
    pub time_slot: String,
    pub occupancy: OccupancySnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell: Option<DwellEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_reading_at: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    pub engine: EngineInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_snapshot_is_all_zero() {
        let snap = OccupancySnapshot::no_data();
        assert_eq!(snap.current, 0);
        assert_eq!(snap.today_entries, 0);
        assert_eq!(snap.today_exits, 0);
        assert_eq!(snap.peak_occupancy, 0);
        assert!(!snap.has_data);
        assert!(!snap.is_estimated);
    }

    #[test]
    fn test_device_class_serialization() {
        let json = serde_json::to_string(&DeviceClass::PresenceOnly).unwrap();
        assert_eq!(json, "\"presence_only\"");
        assert_eq!(DeviceClass::PresenceOnly.as_str(), "presence_only");
    }

    #[test]
    fn test_venue_status_serialization() {
        let json = serde_json::to_string(&VenueStatus::Optimal).unwrap();
        assert_eq!(json, "\"optimal\"");
        assert_eq!(VenueStatus::Good.as_str(), "good");
        assert_eq!(VenueStatus::Poor.as_str(), "poor");
    }

    #[test]
    fn test_reading_round_trip() {
        let reading = Reading {
            venue_id: "parlaylp".to_string(),
            device_id: "parlaylp-mainfloor-001".to_string(),
            timestamp: "2026-01-16T22:30:00Z".parse().unwrap(),
            sound_level_db: 74.2,
            light_level_lux: 120.0,
            occupancy: Some(OccupancyCounts {
                current: 45,
                entries: 120,
                exits: 75,
                capacity: Some(400),
            }),
            track: Some(TrackInfo {
                title: "Levels".to_string(),
                artist: "Avicii".to_string(),
                album_art: None,
            }),
            sensor_raw: HashMap::new(),
        };

        let json = serde_json::to_string(&reading).unwrap();
        let back: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn test_optional_fields_omitted_from_json() {
        let scores = FactorScores {
            sound: 80.0,
            light: 80.0,
            crowd: None,
            music: None,
        };
        let json = serde_json::to_string(&scores).unwrap();
        assert!(!json.contains("crowd"));
        assert!(!json.contains("music"));
    }
}
