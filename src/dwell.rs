//! Dwell-time estimation
//!
//! Matches entry/exit counter deltas FIFO-style into cohort dwell
//! durations. FIFO needs no guest-level identity: it approximates "first
//! arrived, first to leave" at the cohort level, which is adequate once
//! sensors aggregate many guests per interval. Only counter-based venues
//! can support the estimator; presence-only feeds report unavailable.

use crate::bar_day::BarDay;
use crate::types::{DeviceClass, DwellEstimate, Reading};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::VecDeque;

/// Shortest believable individual stay (minutes); anything below is a
/// counter glitch, not a guest
pub const MIN_DWELL_MINUTES: f64 = 1.0;

/// Longest believable individual stay (minutes)
pub const MAX_DWELL_MINUTES: f64 = 360.0;

/// The reported average must land in this band or the whole estimate is
/// withheld; a noisy single figure is worse than no figure
pub const MIN_AVG_DWELL_MINUTES: f64 = 5.0;
pub const MAX_AVG_DWELL_MINUTES: f64 = 240.0;

/// Largest per-interval counter delta treated as real guests; bigger jumps
/// are counter glitches and the whole event is dropped
pub const MAX_INTERVAL_DELTA: u64 = 500;

/// FIFO cohort dwell estimator
pub struct DwellEstimator;

impl DwellEstimator {
    /// Estimate average dwell for one bar day of readings.
    ///
    /// Returns `None` when the device class cannot support estimation, no
    /// matched samples survive sanity filtering, or the resulting average
    /// falls outside the believable band.
    pub fn estimate(
        readings: &[Reading],
        bar_day: &BarDay,
        device_class: DeviceClass,
    ) -> Option<DwellEstimate> {
        if device_class == DeviceClass::PresenceOnly {
            return None;
        }

        let mut window: Vec<&Reading> = readings
            .iter()
            .filter(|r| bar_day.contains(r.timestamp) && r.occupancy.is_some())
            .collect();
        window.sort_by_key(|r| r.timestamp);

        let events = delta_events(&window);
        let samples = match_fifo(&events);

        if samples.is_empty() {
            return None;
        }

        let average = samples.iter().sum::<f64>() / samples.len() as f64;
        if !(MIN_AVG_DWELL_MINUTES..=MAX_AVG_DWELL_MINUTES).contains(&average) {
            debug!(
                "dwell average {average:.1}min outside sanity band, reporting unavailable"
            );
            return None;
        }

        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Some(DwellEstimate {
            average_minutes: average,
            sample_count: samples.len(),
            min_minutes: min,
            max_minutes: max,
        })
    }
}

/// A per-interval counter movement: (timestamp, entries delta, exits delta)
type DeltaEvent = (DateTime<Utc>, u64, u64);

/// Walk consecutive reading pairs into a time-ordered delta event list,
/// skipping intervals where nothing moved
fn delta_events(window: &[&Reading]) -> Vec<DeltaEvent> {
    let mut events = Vec::new();

    for pair in window.windows(2) {
        let (prev, curr) = match (pair[0].occupancy, pair[1].occupancy) {
            (Some(p), Some(c)) => (p, c),
            _ => continue,
        };

        let d_entries = curr.entries.saturating_sub(prev.entries);
        let d_exits = curr.exits.saturating_sub(prev.exits);
        if d_entries == 0 && d_exits == 0 {
            continue;
        }
        if d_entries > MAX_INTERVAL_DELTA || d_exits > MAX_INTERVAL_DELTA {
            warn!(
                "implausible counter jump at {} (+{d_entries}/-{d_exits}), dropping interval",
                pair[1].timestamp
            );
            continue;
        }

        events.push((pair[1].timestamp, d_entries, d_exits));
    }

    events
}

/// FIFO cohort matching: each entry delta pushes that many arrival
/// instants, each exit delta pops the oldest ones and realizes a dwell
/// sample per pop
fn match_fifo(events: &[DeltaEvent]) -> Vec<f64> {
    let mut arrivals: VecDeque<DateTime<Utc>> = VecDeque::new();
    let mut samples = Vec::new();

    for &(timestamp, d_entries, d_exits) in events {
        for _ in 0..d_entries {
            arrivals.push_back(timestamp);
        }
        for _ in 0..d_exits {
            let Some(entered) = arrivals.pop_front() else {
                // Exits with no matched entry: guests who arrived before
                // the bar day opened
                break;
            };
            let minutes = (timestamp - entered).num_seconds() as f64 / 60.0;
            if !(MIN_DWELL_MINUTES..=MAX_DWELL_MINUTES).contains(&minutes) {
                debug!("discarding dwell sample of {minutes:.2}min as a glitch");
                continue;
            }
            samples.push(minutes);
        }
    }

    samples
}
