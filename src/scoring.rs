//! Composite environmental scoring
//!
//! Blends sound, light, crowd, and music sub-scores into a single 0-100
//! pulse score against the venue's optimal ranges — learned from its best
//! nights when a profile exists, static defaults while it is still
//! learning. Factors without data are excluded from the weighted sum, not
//! scored as zero, and the weights are re-normalized over what remains.

use crate::learning::BestNightProfile;
use crate::types::{FactorScores, OccupancySnapshot, Reading, ScoreResult, VenueStatus};
use serde::{Deserialize, Serialize};

/// Score at or above which a venue is "optimal"
pub const OPTIMAL_THRESHOLD: f64 = 85.0;

/// Score at or above which a venue is "good"
pub const GOOD_THRESHOLD: f64 = 70.0;

/// Default optimal sound band (dB)
pub const DEFAULT_SOUND_BAND: ToleranceBand = ToleranceBand {
    min: 68.0,
    max: 82.0,
};

/// Default optimal light band (lux)
pub const DEFAULT_LIGHT_BAND: ToleranceBand = ToleranceBand {
    min: 40.0,
    max: 160.0,
};

/// Default optimal crowd band, as a fraction of capacity
pub const DEFAULT_CROWD_BAND: ToleranceBand = ToleranceBand {
    min: 0.60,
    max: 0.90,
};

/// Inclusive tolerance band with linear falloff past the edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBand {
    pub min: f64,
    pub max: f64,
}

impl ToleranceBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// A band of the given width centered on `center`; used to re-center
    /// default-width bands on a best night's recorded values
    pub fn centered_on(center: f64, width: f64) -> Self {
        Self {
            min: center - width / 2.0,
            max: center + width / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// 0-100: full score inside the band, linearly decaying to 0 as the
    /// value moves past the nearest bound by up to half the band width
    pub fn score(&self, value: f64) -> f64 {
        if value >= self.min && value <= self.max {
            return 100.0;
        }
        let half_width = self.width() / 2.0;
        if half_width <= 0.0 {
            return 0.0;
        }
        let overshoot = if value < self.min {
            self.min - value
        } else {
            value - self.max
        };
        (100.0 * (1.0 - overshoot / half_width)).clamp(0.0, 100.0)
    }
}

/// Fixed factor weight split, re-normalized over available factors.
///
/// Sound and light weigh more than crowd and music: the environment is
/// what the venue controls directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub sound: f64,
    pub light: f64,
    pub crowd: f64,
    pub music: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            sound: 0.30,
            light: 0.30,
            crowd: 0.20,
            music: 0.20,
        }
    }
}

/// Optimal ranges for one venue and time slot, learned or default
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalRanges {
    pub sound: ToleranceBand,
    pub light: ToleranceBand,
    /// Capacity-relative, so it is never re-centered by learning
    pub crowd: ToleranceBand,
    /// True when the bands came from a learned profile
    pub learned: bool,
}

impl Default for OptimalRanges {
    fn default() -> Self {
        Self {
            sound: DEFAULT_SOUND_BAND,
            light: DEFAULT_LIGHT_BAND,
            crowd: DEFAULT_CROWD_BAND,
            learned: false,
        }
    }
}

impl OptimalRanges {
    /// Default-width bands re-centered on a best-night profile
    pub fn from_profile(profile: &BestNightProfile) -> Self {
        Self {
            sound: ToleranceBand::centered_on(profile.avg_sound_db, DEFAULT_SOUND_BAND.width()),
            light: ToleranceBand::centered_on(profile.avg_light_lux, DEFAULT_LIGHT_BAND.width()),
            crowd: DEFAULT_CROWD_BAND,
            learned: true,
        }
    }

    /// Ranges for a slot: learned when a profile exists, defaults otherwise
    pub fn for_slot(profile: Option<&BestNightProfile>) -> Self {
        profile.map(Self::from_profile).unwrap_or_default()
    }
}

/// Composite scorer
pub struct PulseScorer {
    weights: ScoreWeights,
}

impl Default for PulseScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

impl PulseScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Score the venue's current conditions.
    ///
    /// Returns `None` when there is no reading to score — "no data" must
    /// stay distinguishable from "quiet venue".
    pub fn score(
        &self,
        latest: Option<&Reading>,
        occupancy: &OccupancySnapshot,
        capacity: u32,
        ranges: &OptimalRanges,
        profile: Option<&BestNightProfile>,
    ) -> Option<ScoreResult> {
        let reading = latest?;

        let sound = ranges.sound.score(reading.sound_level_db);
        let light = ranges.light.score(reading.light_level_lux);

        let crowd = if occupancy.has_data && capacity > 0 {
            let fill = occupancy.current as f64 / capacity as f64;
            Some(ranges.crowd.score(fill))
        } else {
            None
        };

        // With only title/artist on the wire, an actively programmed venue
        // scores full marks; no track excludes the factor entirely rather
        // than penalizing the composite.
        let music = reading.track.as_ref().map(|_| 100.0);

        let factor_scores = FactorScores {
            sound,
            light,
            crowd,
            music,
        };
        let score = self.weighted(&factor_scores);

        Some(ScoreResult {
            score,
            status: status_for(score),
            factor_scores,
            using_historical_data: ranges.learned,
            proximity_to_best: profile.map(|p| proximity_to_best(reading, p)),
        })
    }

    /// Composite score for a completed session's aggregates; used when
    /// folding a finished bar day into the learning store. Music is
    /// unknowable at session granularity and stays excluded.
    pub fn score_session(
        &self,
        avg_sound_db: f64,
        avg_light_lux: f64,
        peak_occupancy: u32,
        capacity: u32,
        ranges: &OptimalRanges,
    ) -> f64 {
        let crowd = if capacity > 0 {
            Some(ranges.crowd.score(peak_occupancy as f64 / capacity as f64))
        } else {
            None
        };
        self.weighted(&FactorScores {
            sound: ranges.sound.score(avg_sound_db),
            light: ranges.light.score(avg_light_lux),
            crowd,
            music: None,
        })
    }

    /// Weighted sum over available factors, weights re-normalized so an
    /// absent factor never drags the composite down
    fn weighted(&self, factors: &FactorScores) -> f64 {
        let mut numerator = self.weights.sound * factors.sound + self.weights.light * factors.light;
        let mut denominator = self.weights.sound + self.weights.light;

        if let Some(crowd) = factors.crowd {
            numerator += self.weights.crowd * crowd;
            denominator += self.weights.crowd;
        }
        if let Some(music) = factors.music {
            numerator += self.weights.music * music;
            denominator += self.weights.music;
        }

        if denominator <= 0.0 {
            return 0.0;
        }
        numerator / denominator
    }
}

fn status_for(score: f64) -> VenueStatus {
    if score >= OPTIMAL_THRESHOLD {
        VenueStatus::Optimal
    } else if score >= GOOD_THRESHOLD {
        VenueStatus::Good
    } else {
        VenueStatus::Poor
    }
}

/// 0-100 similarity between current sound/light and the best night's
/// recorded values: symmetric distance-to-band scoring, same shape as the
/// factor scores
fn proximity_to_best(reading: &Reading, profile: &BestNightProfile) -> f64 {
    let sound_band =
        ToleranceBand::centered_on(profile.avg_sound_db, DEFAULT_SOUND_BAND.width());
    let light_band =
        ToleranceBand::centered_on(profile.avg_light_lux, DEFAULT_LIGHT_BAND.width());
    (sound_band.score(reading.sound_level_db) + light_band.score(reading.light_level_lux)) / 2.0
}
