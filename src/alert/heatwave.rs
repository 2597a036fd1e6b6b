//! Marine heatwave classification.
//!
//! Compares current SST with the climatological mean for the location and
//! day. The 90th-percentile threshold is approximated as the mean plus a
//! latitude-banded margin, and the intensity ratio (anomaly over that
//! margin) selects a Hobday-style category. Impact text and
//! recommendations are static tables keyed by category.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};

use crate::analysis::climatology::{self, round_to};
use crate::cache::{CacheKey, CacheKind, TtlCache};
use crate::logging::{self, DataSource};
use crate::model::{HeatwaveAssessment, HeatwaveCategory, Point, Provenance};
use crate::service::environment::EnvironmentalAggregator;

/// Longest duration ever estimated, in days.
pub const MAX_DURATION_DAYS: f64 = 30.0;

// ---------------------------------------------------------------------------
// Pure classification
// ---------------------------------------------------------------------------

/// Margin in °C between the climatological mean and the p90 threshold.
///
/// Tropical water varies least, mid-latitudes most.
pub fn threshold_delta(lat: f64) -> f64 {
    let abs_lat = lat.abs();
    if abs_lat < 25.0 {
        1.0
    } else if abs_lat < 50.0 {
        2.0
    } else {
        1.5
    }
}

/// `anomaly / delta`, or 0 when the threshold does not sit above the mean.
pub fn intensity_ratio(anomaly: f64, delta: f64) -> f64 {
    if delta > 0.0 { anomaly / delta } else { 0.0 }
}

/// Category bands on the intensity ratio; lower bounds are inclusive.
pub fn category_for_ratio(ratio: f64) -> HeatwaveCategory {
    if ratio >= 4.0 {
        HeatwaveCategory::Extreme
    } else if ratio >= 3.0 {
        HeatwaveCategory::Severe
    } else if ratio >= 2.0 {
        HeatwaveCategory::Strong
    } else if ratio >= 1.0 {
        HeatwaveCategory::Moderate
    } else {
        HeatwaveCategory::None
    }
}

/// `floor(min(5 + 5·ratio, 30))` days.
pub fn estimated_duration_days(ratio: f64) -> u32 {
    (5.0 + ratio * 5.0).min(MAX_DURATION_DAYS).max(0.0).floor() as u32
}

pub fn impact_for(category: HeatwaveCategory) -> &'static str {
    match category {
        HeatwaveCategory::None => "Water temperatures are within the normal range for this location and season.",
        HeatwaveCategory::Moderate => {
            "Elevated temperatures may stress sensitive species. Early signs of coral bleaching are possible."
        }
        HeatwaveCategory::Strong => {
            "Significant thermal stress. Coral bleaching is likely and mobile species may shift their range."
        }
        HeatwaveCategory::Severe => {
            "Severe thermal stress. Widespread bleaching and mortality of sensitive species are expected."
        }
        HeatwaveCategory::Extreme => {
            "Extreme thermal stress. Mass mortality events and lasting ecosystem damage are likely."
        }
    }
}

pub fn recommendations_for(category: HeatwaveCategory) -> &'static [&'static str] {
    match category {
        HeatwaveCategory::None => &["Continue routine temperature monitoring"],
        HeatwaveCategory::Moderate => &[
            "Increase monitoring frequency of coral and invertebrate health",
            "Alert local stakeholders to elevated temperatures",
        ],
        HeatwaveCategory::Strong => &[
            "Conduct daily bleaching surveys at sentinel sites",
            "Reduce additional stressors such as anchoring and runoff",
            "Notify fisheries managers of possible stock displacement",
        ],
        HeatwaveCategory::Severe => &[
            "Activate the heatwave response plan",
            "Consider temporary closures of vulnerable areas",
            "Document mortality events for post-event assessment",
            "Coordinate with regional monitoring networks",
        ],
        HeatwaveCategory::Extreme => &[
            "Declare a thermal emergency and activate all response protocols",
            "Close heavily affected areas to extractive and recreational use",
            "Prioritise rescue or relocation of critical species where feasible",
            "Record ecosystem damage for recovery planning",
            "Issue public advisories",
        ],
    }
}

/// Classifies `current_sst` at `lat` against the climatology for `now`.
///
/// Anomaly and ratio are rounded to two decimals before banding so that
/// category boundaries do not depend on floating-point noise.
pub fn assess(lat: f64, current_sst: f64, sst_provenance: Provenance, now: DateTime<Utc>) -> HeatwaveAssessment {
    let mean = climatology::estimate_sst(lat, now.ordinal());
    let delta = threshold_delta(lat);
    let anomaly = round_to(current_sst - mean, 2);
    let ratio = round_to(intensity_ratio(anomaly, delta), 2);

    let category = category_for_ratio(ratio);
    let active = category != HeatwaveCategory::None;

    HeatwaveAssessment {
        active,
        category,
        current_sst: round_to(current_sst, 2),
        climatological_mean: round_to(mean, 2),
        p90_threshold: round_to(mean + delta, 2),
        anomaly,
        intensity_ratio: ratio,
        estimated_duration_days: active.then(|| estimated_duration_days(ratio)),
        impact: impact_for(category).to_string(),
        recommendations: recommendations_for(category).iter().map(|r| r.to_string()).collect(),
        sst_provenance,
        assessed_at: now,
    }
}

// ---------------------------------------------------------------------------
// Cached classifier
// ---------------------------------------------------------------------------

pub struct HeatwaveClassifier {
    environment: Arc<EnvironmentalAggregator>,
    cache: TtlCache<HeatwaveAssessment>,
}

impl HeatwaveClassifier {
    pub fn new(environment: Arc<EnvironmentalAggregator>, cache: TtlCache<HeatwaveAssessment>) -> Self {
        Self { environment, cache }
    }

    pub fn classify(&self, point: &Point) -> HeatwaveAssessment {
        self.classify_at(point, Utc::now())
    }

    pub fn classify_at(&self, point: &Point, now: DateTime<Utc>) -> HeatwaveAssessment {
        let key = CacheKey::for_point(CacheKind::Heatwave, point);
        self.cache.get_or_insert_with(key, || {
            let (sst, provenance) = self.environment.current_sst_at(point, now);
            let assessment = assess(point.latitude(), sst, provenance, now);
            if assessment.active {
                logging::warn(
                    DataSource::Climatology,
                    Some(point.id()),
                    &format!(
                        "{} marine heatwave: anomaly {:+.2}°C, ratio {:.2}",
                        assessment.category, assessment.anomaly, assessment.intensity_ratio
                    ),
                );
            }
            assessment
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
