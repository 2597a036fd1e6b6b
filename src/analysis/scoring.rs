//! Ecosystem health scoring.
//!
//! Four component scores, each an integer in `0..=100`, combined with fixed
//! weights into an overall score. Every function here is total: missing
//! inputs fall back to a neutral default and inconsistent upstream counts
//! (e.g. more threatened species than species) still yield a bounded score.

use crate::analysis::climatology::round_to;
use crate::model::{Confidence, EnvironmentalReading, ScoreBreakdown, SpeciesSummary};

/// Weights in percent: biodiversity, water quality, thermal stress,
/// productivity. Integer percentages keep the weighted sum exact.
pub const WEIGHTS_PERCENT: [u32; 4] = [30, 25, 25, 20];

/// Score used when a component has no inputs at all.
pub const DEFAULT_SCORE: u8 = 70;

/// Optimal (min, max) ranges.
pub const OPTIMAL_OXYGEN: (f64, f64) = (5.0, 8.0);
pub const OPTIMAL_PH: (f64, f64) = (8.0, 8.3);
pub const OPTIMAL_SALINITY: (f64, f64) = (33.0, 37.0);
pub const OPTIMAL_CHLOROPHYLL: (f64, f64) = (0.1, 3.0);

/// Floors after snapping away binary noise, so 0.3 * 100 floors to 30.
fn floor_stable(value: f64) -> f64 {
    round_to(value, 6).floor()
}

fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0) as u8
}

fn mean_score(scores: &[u8]) -> Option<u8> {
    if scores.is_empty() {
        return None;
    }
    let sum: u32 = scores.iter().map(|&s| s as u32).sum();
    Some((sum / scores.len() as u32) as u8)
}

/// Distance from `value` to the nearer edge of `range`; zero inside it.
fn deviation_from(value: f64, (min, max): (f64, f64)) -> f64 {
    if value < min {
        min - value
    } else if value > max {
        value - max
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Biodiversity
// ---------------------------------------------------------------------------

pub fn biodiversity_score(species: &SpeciesSummary) -> u8 {
    let mut score = 50.0;

    // Richness: log scale, contributes -15..=+15. An empty checklist says
    // nothing about richness, so it leaves the base untouched.
    if species.total_species > 0 {
        let richness = floor_stable(((species.total_species as f64) + 1.0).log10() * 15.0).clamp(0.0, 30.0);
        score += richness - 15.0;
    }

    if let Some(index) = species.biodiversity_index {
        score += if index >= 3.5 {
            20.0
        } else if index >= 2.5 {
            15.0
        } else if index >= 1.5 {
            10.0
        } else {
            5.0
        };
    }

    if species.total_observations > 0 {
        let recent_ratio = species.recent_observations as f64 / species.total_observations as f64;
        score += floor_stable(recent_ratio * 15.0);
    }

    if species.total_species > 0 {
        let threatened_ratio = species.threatened_species as f64 / species.total_species as f64;
        if threatened_ratio > 0.15 {
            score -= 10.0;
        } else if threatened_ratio > 0.10 {
            score -= 5.0;
        }
    }

    clamp_score(score)
}

// ---------------------------------------------------------------------------
// Water quality
// ---------------------------------------------------------------------------

pub fn oxygen_score(oxygen: f64) -> u8 {
    let (min, max) = OPTIMAL_OXYGEN;
    if oxygen < min {
        clamp_score(floor_stable((oxygen / min) * 100.0))
    } else if oxygen > max {
        // Supersaturation decays steeply.
        clamp_score(100.0 - floor_stable((oxygen - max) * 20.0))
    } else {
        100
    }
}

pub fn ph_score(ph: f64) -> u8 {
    clamp_score(100.0 - floor_stable(deviation_from(ph, OPTIMAL_PH) * 100.0))
}

pub fn salinity_score(salinity: f64) -> u8 {
    clamp_score(100.0 - floor_stable(deviation_from(salinity, OPTIMAL_SALINITY) * 10.0))
}

pub fn water_quality_score(env: &EnvironmentalReading) -> u8 {
    let scores: Vec<u8> = [
        env.dissolved_oxygen.map(oxygen_score),
        env.ph.map(ph_score),
        env.salinity.map(salinity_score),
    ]
    .into_iter()
    .flatten()
    .collect();

    mean_score(&scores).unwrap_or(DEFAULT_SCORE)
}

// ---------------------------------------------------------------------------
// Thermal stress
// ---------------------------------------------------------------------------

/// Higher is better: 100 means no thermal stress.
pub fn thermal_stress_score(env: &EnvironmentalReading) -> u8 {
    let Some(anomaly) = env.sst_anomaly else {
        return DEFAULT_SCORE;
    };

    let anomaly = anomaly.abs();
    if anomaly <= 0.5 {
        100
    } else if anomaly <= 1.0 {
        85
    } else if anomaly <= 1.5 {
        65
    } else if anomaly <= 2.0 {
        40
    } else {
        clamp_score(floor_stable(100.0 - anomaly * 40.0))
    }
}

// ---------------------------------------------------------------------------
// Productivity
// ---------------------------------------------------------------------------

pub fn chlorophyll_score(chlorophyll: f64) -> u8 {
    let (min, max) = OPTIMAL_CHLOROPHYLL;
    if chlorophyll < min {
        // Oligotrophic; never below 40.
        clamp_score(floor_stable((chlorophyll / min) * 100.0).max(40.0))
    } else if chlorophyll > max {
        // Possible eutrophication; never below 30.
        clamp_score((100.0 - floor_stable((chlorophyll - max) * 10.0)).max(30.0))
    } else {
        100
    }
}

/// Observation density as a proxy for ecosystem activity.
pub fn observation_density_score(total_observations: u64) -> u8 {
    (total_observations / 50).min(100) as u8
}

pub fn productivity_score(env: &EnvironmentalReading, species: &SpeciesSummary) -> u8 {
    let mut scores = Vec::with_capacity(2);
    if let Some(chl) = env.chlorophyll {
        scores.push(chlorophyll_score(chl));
    }
    if species.total_observations > 0 {
        scores.push(observation_density_score(species.total_observations));
    }
    mean_score(&scores).unwrap_or(DEFAULT_SCORE)
}

// ---------------------------------------------------------------------------
// Overall score and confidence
// ---------------------------------------------------------------------------

pub fn score_breakdown(env: &EnvironmentalReading, species: &SpeciesSummary) -> ScoreBreakdown {
    ScoreBreakdown {
        biodiversity: biodiversity_score(species),
        water_quality: water_quality_score(env),
        thermal_stress: thermal_stress_score(env),
        productivity: productivity_score(env, species),
    }
}

/// Weighted sum of the component scores, floored.
pub fn overall_score(breakdown: &ScoreBreakdown) -> u8 {
    let components = [
        breakdown.biodiversity,
        breakdown.water_quality,
        breakdown.thermal_stress,
        breakdown.productivity,
    ];
    let weighted: u32 = components
        .iter()
        .zip(WEIGHTS_PERCENT.iter())
        .map(|(&score, &weight)| score as u32 * weight)
        .sum();
    (weighted / 100).min(100) as u8
}

/// Number of tracked inputs present, out of `CONFIDENCE_FIELDS`.
pub const CONFIDENCE_FIELDS: usize = 6;

pub fn fields_present(env: &EnvironmentalReading, species: &SpeciesSummary) -> usize {
    [
        env.sst.is_some(),
        env.chlorophyll.is_some(),
        env.dissolved_oxygen.is_some(),
        env.ph.is_some(),
        species.total_species > 0,
        species.total_observations > 0,
    ]
    .iter()
    .filter(|&&present| present)
    .count()
}

pub fn confidence_for(present: usize) -> Confidence {
    let ratio = present as f64 / CONFIDENCE_FIELDS as f64;
    if ratio >= 0.8 {
        Confidence::High
    } else if ratio >= 0.5 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

pub fn confidence(env: &EnvironmentalReading, species: &SpeciesSummary) -> Confidence {
    confidence_for(fields_present(env, species))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
