//! Occupancy reconciliation
//!
//! Venue door sensors come in two flavors: counter devices report
//! cumulative entry/exit counts since boot, presence devices report only a
//! live head count with counters stuck at zero. This module classifies the
//! feed once per window and normalizes both flavors into per-bar-day
//! `current / entries / exits / peak` figures.
//!
//! Resolution is an explicit ordered strategy list: each strategy either
//! produces a snapshot or declines, and the first to produce one wins. The
//! final fallback is the all-zero "no data for this bar day" snapshot,
//! which is a legitimate state for a venue before opening, not an error.

use crate::bar_day::BarDay;
use crate::types::{DeviceClass, OccupancyCounts, OccupancySnapshot, Reading};
use log::{debug, warn};

/// Minimum occupancy-bearing readings before the presence-only
/// classification is trusted; ambiguous windows default to counter-based
pub const MIN_READINGS_FOR_CLASSIFICATION: usize = 3;

/// Headroom multiplier applied to the historical peak when no declared
/// capacity is available
pub const CAPACITY_HEADROOM: f64 = 1.25;

/// Smallest capacity estimate ever produced
pub const CAPACITY_FLOOR: u32 = 50;

/// Classify the sensor feed from observed counter behavior.
///
/// If entries and exits stay at zero while the live head count is positive
/// and changing, the device cannot be counting doors and is classified
/// presence-only. Too few readings to judge defaults to counter-based.
pub fn classify_device(readings: &[&Reading]) -> DeviceClass {
    let with_occupancy: Vec<_> = readings.iter().filter_map(|r| r.occupancy).collect();

    if with_occupancy.len() < MIN_READINGS_FOR_CLASSIFICATION {
        return DeviceClass::CounterBased;
    }

    let counters_move = with_occupancy.iter().any(|o| o.entries > 0 || o.exits > 0);
    if counters_move {
        return DeviceClass::CounterBased;
    }

    let saw_presence = with_occupancy.iter().any(|o| o.current > 0);
    let presence_changes = with_occupancy
        .windows(2)
        .any(|pair| pair[0].current != pair[1].current);

    if saw_presence && presence_changes {
        DeviceClass::PresenceOnly
    } else {
        DeviceClass::CounterBased
    }
}

/// One way of resolving occupancy from a window of readings.
///
/// Implementations inspect the device class and the window and either
/// produce a snapshot or decline with `None`.
pub trait OccupancyStrategy {
    fn name(&self) -> &'static str;

    /// `readings` are scoped to one bar day and sorted by timestamp
    fn resolve(&self, readings: &[&Reading], device_class: DeviceClass)
        -> Option<OccupancySnapshot>;
}

/// Counter-based resolution: baseline the cumulative counters at the
/// earliest reading of the bar day and report deltas from it.
pub struct CounterDeltaStrategy;

impl OccupancyStrategy for CounterDeltaStrategy {
    fn name(&self) -> &'static str {
        "counter-delta"
    }

    fn resolve(
        &self,
        readings: &[&Reading],
        device_class: DeviceClass,
    ) -> Option<OccupancySnapshot> {
        if device_class != DeviceClass::CounterBased {
            return None;
        }

        let with_occupancy: Vec<(&Reading, OccupancyCounts)> = readings
            .iter()
            .filter_map(|r| r.occupancy.map(|o| (*r, o)))
            .collect();

        let (_, baseline) = *with_occupancy.first()?;

        // Track the peak by recomputing current at every reading, not just
        // the latest; saturating subtraction keeps derived figures at >= 0
        // when a rebooted sensor makes raw counters decrease.
        let mut peak: u64 = 0;
        let mut prev = baseline;
        for (reading, occ) in &with_occupancy {
            if occ.entries < prev.entries || occ.exits < prev.exits {
                warn!(
                    "counter regression on {} at {}: entries {} -> {}, exits {} -> {}",
                    reading.device_id,
                    reading.timestamp,
                    prev.entries,
                    occ.entries,
                    prev.exits,
                    occ.exits
                );
            }
            let entries_delta = occ.entries.saturating_sub(baseline.entries);
            let exits_delta = occ.exits.saturating_sub(baseline.exits);
            peak = peak.max(entries_delta.saturating_sub(exits_delta));
            prev = *occ;
        }

        let (_, latest) = *with_occupancy.last()?;
        let today_entries = latest.entries.saturating_sub(baseline.entries);
        let today_exits = latest.exits.saturating_sub(baseline.exits);
        let current = today_entries.saturating_sub(today_exits);

        Some(OccupancySnapshot {
            current: clamp_u32(current),
            today_entries,
            today_exits,
            peak_occupancy: clamp_u32(peak),
            device_class: DeviceClass::CounterBased,
            is_estimated: false,
            has_data: true,
        })
    }
}

/// Presence-only resolution: report the live head count directly and
/// estimate entries/exits by diffing it between consecutive readings.
pub struct PresenceDeltaStrategy;

impl OccupancyStrategy for PresenceDeltaStrategy {
    fn name(&self) -> &'static str {
        "presence-delta"
    }

    fn resolve(
        &self,
        readings: &[&Reading],
        device_class: DeviceClass,
    ) -> Option<OccupancySnapshot> {
        if device_class != DeviceClass::PresenceOnly {
            return None;
        }

        let with_occupancy: Vec<OccupancyCounts> =
            readings.iter().filter_map(|r| r.occupancy).collect();
        let latest = *with_occupancy.last()?;

        let mut estimated_entries: u64 = 0;
        let mut estimated_exits: u64 = 0;
        let mut peak: u32 = 0;
        for pair in with_occupancy.windows(2) {
            let delta = pair[1].current as i64 - pair[0].current as i64;
            if delta > 0 {
                estimated_entries += delta as u64;
            } else {
                estimated_exits += (-delta) as u64;
            }
        }
        for occ in &with_occupancy {
            peak = peak.max(occ.current);
        }

        Some(OccupancySnapshot {
            current: latest.current,
            today_entries: estimated_entries,
            today_exits: estimated_exits,
            peak_occupancy: peak,
            device_class: DeviceClass::PresenceOnly,
            is_estimated: true,
            has_data: true,
        })
    }
}

/// Occupancy reconciler with an explicit, ordered fallback list
pub struct OccupancyReconciler {
    strategies: Vec<Box<dyn OccupancyStrategy>>,
}

impl Default for OccupancyReconciler {
    fn default() -> Self {
        Self {
            strategies: vec![Box::new(CounterDeltaStrategy), Box::new(PresenceDeltaStrategy)],
        }
    }
}

impl OccupancyReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the strategy list, keeping the try-in-order semantics
    pub fn with_strategies(strategies: Vec<Box<dyn OccupancyStrategy>>) -> Self {
        Self { strategies }
    }

    /// Reconcile a window of readings into a bar-day occupancy snapshot.
    ///
    /// The caller does not have to scope or sort the input; readings
    /// outside the bar day are dropped here.
    pub fn reconcile(&self, readings: &[Reading], bar_day: &BarDay) -> OccupancySnapshot {
        let mut window: Vec<&Reading> = readings
            .iter()
            .filter(|r| bar_day.contains(r.timestamp))
            .collect();
        window.sort_by_key(|r| r.timestamp);

        let device_class = classify_device(&window);

        for strategy in &self.strategies {
            if let Some(snapshot) = strategy.resolve(&window, device_class) {
                debug!("occupancy resolved by {} strategy", strategy.name());
                return snapshot;
            }
        }

        debug!("no occupancy data for this bar day");
        OccupancySnapshot::no_data()
    }
}

/// Estimated capacity: declared when the installation reports one,
/// otherwise the historical peak with headroom, floored
pub fn estimate_capacity(declared: Option<u32>, peak_occupancy: u32) -> u32 {
    match declared {
        Some(cap) if cap > 0 => cap,
        _ => ((peak_occupancy as f64 * CAPACITY_HEADROOM) as u32).max(CAPACITY_FLOOR),
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
