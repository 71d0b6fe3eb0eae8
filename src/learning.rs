//! Venue learning store
//!
//! Maintains, per venue and per time slot, the best observed session
//! profile: the sound/light/crowd conditions of the venue's
//! best-performing night in that slot. Confidence grows with the number of
//! distinct weeks observed and saturates.
//!
//! The store must tolerate being empty (a new venue): every consumer
//! treats "no profile" as "use defaults", never as an error. Replacement
//! is a compare-before-insert per slot, so as long as the owner serializes
//! writes per venue, racing sessions cannot corrupt a profile.

use crate::bar_day::TimeSlot;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Weeks of data at which confidence reaches 100
pub const CONFIDENCE_SATURATION_WEEKS: u32 = 8;

/// Aggregates for one completed bar-day session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub avg_sound_db: f64,
    pub avg_light_lux: f64,
    pub peak_occupancy: u32,
    /// Calendar date of the bar-day start
    pub date: NaiveDate,
    /// Composite score of the session, when one could be computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Best observed conditions for one (venue, time-slot)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestNightProfile {
    pub avg_sound_db: f64,
    pub avg_light_lux: f64,
    pub peak_occupancy: u32,
    pub day_of_week: Weekday,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Learning summary for one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueLearning {
    /// Best-night profiles keyed by slot key (e.g. "fri-21")
    pub best_nights: BTreeMap<String, BestNightProfile>,
    pub weeks_of_data: u32,
    /// 0-100, linear in weeks of data, saturating at
    /// [`CONFIDENCE_SATURATION_WEEKS`]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VenueRecord {
    slots: BTreeMap<String, BestNightProfile>,
    /// Distinct ISO weeks with at least one recorded session, e.g. "2026-W03"
    observed_weeks: BTreeSet<String>,
}

/// Store of learned per-venue profiles.
///
/// Serializable as a whole so an external persistence collaborator can
/// round-trip it between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueLearningStore {
    venues: HashMap<String, VenueRecord>,
}

impl VenueLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed session for a slot.
    ///
    /// An empty slot is seeded by the first session. A non-empty slot is
    /// replaced only when the candidate carries a composite score that
    /// beats the stored one (or the stored profile has none). Scoreless
    /// candidates never evict a scored profile. Returns whether the
    /// profile changed.
    pub fn record_session(&mut self, venue_id: &str, slot: TimeSlot, stats: SessionStats) -> bool {
        let record = self.venues.entry(venue_id.to_string()).or_default();
        record.observed_weeks.insert(iso_week_key(stats.date));

        let candidate = BestNightProfile {
            avg_sound_db: stats.avg_sound_db,
            avg_light_lux: stats.avg_light_lux,
            peak_occupancy: stats.peak_occupancy,
            day_of_week: slot.weekday,
            date: stats.date,
            score: stats.score,
        };

        let key = slot.key();
        match record.slots.get(&key) {
            Some(existing) if !beats(&candidate, existing) => false,
            _ => {
                record.slots.insert(key, candidate);
                true
            }
        }
    }

    /// Best-night profile for a slot, if one has been learned
    pub fn best_night_profile(
        &self,
        venue_id: &str,
        slot: TimeSlot,
    ) -> Option<&BestNightProfile> {
        self.venues.get(venue_id)?.slots.get(&slot.key())
    }

    /// Full learning summary for a venue; an unknown venue yields the
    /// empty summary with zero confidence
    pub fn learning(&self, venue_id: &str) -> VenueLearning {
        match self.venues.get(venue_id) {
            Some(record) => {
                let weeks = record.observed_weeks.len() as u32;
                VenueLearning {
                    best_nights: record.slots.clone(),
                    weeks_of_data: weeks,
                    confidence: confidence_from_weeks(weeks),
                }
            }
            None => VenueLearning {
                best_nights: BTreeMap::new(),
                weeks_of_data: 0,
                confidence: 0.0,
            },
        }
    }

    /// Load store state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize store state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Confidence percentage for a number of observed weeks
pub fn confidence_from_weeks(weeks: u32) -> f64 {
    (weeks as f64 / CONFIDENCE_SATURATION_WEEKS as f64 * 100.0).min(100.0)
}

fn beats(candidate: &BestNightProfile, existing: &BestNightProfile) -> bool {
    match (candidate.score, existing.score) {
        (Some(new), Some(old)) => new > old,
        (Some(_), None) => true,
        _ => false,
    }
}

fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> TimeSlot {
        TimeSlot {
            weekday: Weekday::Fri,
            block_start_hour: 21,
        }
    }

    fn stats(date: &str, score: Option<f64>) -> SessionStats {
        SessionStats {
            avg_sound_db: 74.0,
            avg_light_lux: 110.0,
            peak_occupancy: 180,
            date: date.parse().unwrap(),
            score,
        }
    }

    #[test]
    fn test_first_session_seeds_empty_slot() {
        let mut store = VenueLearningStore::new();
        assert!(store.record_session("parlaylp", slot(), stats("2026-01-16", None)));

        let profile = store.best_night_profile("parlaylp", slot()).unwrap();
        assert_eq!(profile.day_of_week, Weekday::Fri);
        assert_eq!(profile.peak_occupancy, 180);
        assert!(profile.score.is_none());
    }

    #[test]
    fn test_better_score_replaces() {
        let mut store = VenueLearningStore::new();
        store.record_session("parlaylp", slot(), stats("2026-01-16", Some(72.0)));
        assert!(store.record_session("parlaylp", slot(), stats("2026-01-23", Some(88.0))));

        let profile = store.best_night_profile("parlaylp", slot()).unwrap();
        assert_eq!(profile.date, "2026-01-23".parse::<NaiveDate>().unwrap());
        assert_eq!(profile.score, Some(88.0));
    }

    #[test]
    fn test_worse_score_keeps_incumbent() {
        let mut store = VenueLearningStore::new();
        store.record_session("parlaylp", slot(), stats("2026-01-16", Some(88.0)));
        assert!(!store.record_session("parlaylp", slot(), stats("2026-01-23", Some(72.0))));

        let profile = store.best_night_profile("parlaylp", slot()).unwrap();
        assert_eq!(profile.date, "2026-01-16".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn test_scoreless_session_never_evicts_scored() {
        let mut store = VenueLearningStore::new();
        store.record_session("parlaylp", slot(), stats("2026-01-16", Some(60.0)));
        assert!(!store.record_session("parlaylp", slot(), stats("2026-01-23", None)));
    }

    #[test]
    fn test_scored_session_replaces_scoreless_seed() {
        let mut store = VenueLearningStore::new();
        store.record_session("parlaylp", slot(), stats("2026-01-16", None));
        assert!(store.record_session("parlaylp", slot(), stats("2026-01-23", Some(55.0))));
    }

    #[test]
    fn test_weeks_count_distinct_iso_weeks() {
        let mut store = VenueLearningStore::new();
        // Two sessions in the same week, one the week after
        store.record_session("parlaylp", slot(), stats("2026-01-16", Some(70.0)));
        store.record_session("parlaylp", slot(), stats("2026-01-17", Some(71.0)));
        store.record_session("parlaylp", slot(), stats("2026-01-23", Some(72.0)));

        let learning = store.learning("parlaylp");
        assert_eq!(learning.weeks_of_data, 2);
        assert!((learning.confidence - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_confidence_saturates() {
        assert!((confidence_from_weeks(0) - 0.0).abs() < f64::EPSILON);
        assert!((confidence_from_weeks(4) - 50.0).abs() < 0.001);
        assert!((confidence_from_weeks(8) - 100.0).abs() < 0.001);
        assert!((confidence_from_weeks(20) - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_unknown_venue_yields_empty_summary() {
        let store = VenueLearningStore::new();
        let learning = store.learning("nowhere");
        assert!(learning.best_nights.is_empty());
        assert_eq!(learning.weeks_of_data, 0);
        assert!((learning.confidence - 0.0).abs() < f64::EPSILON);
        assert!(store.best_night_profile("nowhere", slot()).is_none());
    }

    #[test]
    fn test_slots_are_independent() {
        let mut store = VenueLearningStore::new();
        let tuesday = TimeSlot {
            weekday: Weekday::Tue,
            block_start_hour: 21,
        };
        store.record_session("parlaylp", slot(), stats("2026-01-16", Some(88.0)));
        store.record_session("parlaylp", tuesday, stats("2026-01-13", Some(60.0)));

        let learning = store.learning("parlaylp");
        assert_eq!(learning.best_nights.len(), 2);
        assert!(learning.best_nights.contains_key("fri-21"));
        assert!(learning.best_nights.contains_key("tue-21"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut store = VenueLearningStore::new();
        store.record_session("parlaylp", slot(), stats("2026-01-16", Some(88.0)));

        let json = store.to_json().unwrap();
        let loaded = VenueLearningStore::from_json(&json).unwrap();

        assert_eq!(
            loaded.best_night_profile("parlaylp", slot()),
            store.best_night_profile("parlaylp", slot())
        );
        assert_eq!(loaded.learning("parlaylp").weeks_of_data, 1);
    }
}
