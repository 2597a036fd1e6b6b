//! Health score calculator.
//!
//! Fetches the environmental reading and the species summary on two
//! threads, then scores them. Both inputs degrade to estimates on their
//! own, so the calculation always completes.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};

use crate::analysis::scoring;
use crate::logging::{self, DataSource};
use crate::model::{EnvironmentalReading, HealthAssessment, Point, SpeciesSummary};
use crate::service::biodiversity::BiodiversityAggregator;
use crate::service::environment::EnvironmentalAggregator;

pub struct HealthCalculator {
    environment: Arc<EnvironmentalAggregator>,
    biodiversity: Arc<BiodiversityAggregator>,
    radius_km: f64,
}

impl HealthCalculator {
    /// `radius_km` must already be validated; it is the default species
    /// search radius.
    pub fn new(environment: Arc<EnvironmentalAggregator>, biodiversity: Arc<BiodiversityAggregator>, radius_km: f64) -> Self {
        Self {
            environment,
            biodiversity,
            radius_km,
        }
    }

    pub fn calculate(&self, point: &Point) -> HealthAssessment {
        self.calculate_at(point, Utc::now())
    }

    pub fn calculate_at(&self, point: &Point, now: DateTime<Utc>) -> HealthAssessment {
        self.calculate_within_at(point, self.radius_km, now)
    }

    /// Same as `calculate_at` with an explicit, already validated species
    /// search radius.
    pub fn calculate_within_at(&self, point: &Point, radius_km: f64, now: DateTime<Utc>) -> HealthAssessment {
        let (environmental, species) = self.gather_inputs(point, radius_km, now);

        let breakdown = scoring::score_breakdown(&environmental, &species);
        let score = scoring::overall_score(&breakdown);
        let confidence = scoring::confidence(&environmental, &species);
        let data_sources = self.data_sources(&environmental);

        logging::debug(
            DataSource::System,
            Some(point.id()),
            &format!("health score {} ({} confidence) from {:?}", score, confidence, data_sources),
        );

        HealthAssessment {
            point: point.clone(),
            score,
            confidence,
            breakdown,
            environmental,
            species,
            data_sources,
            calculated_at: now,
        }
    }

    fn gather_inputs(&self, point: &Point, radius_km: f64, now: DateTime<Utc>) -> (EnvironmentalReading, SpeciesSummary) {
        thread::scope(|s| {
            let env_handle = s.spawn(|| self.environment.get_environmental_reading_at(point, now));
            let species = self.biodiversity.summary_at(point, radius_km, now.date_naive());

            let environmental = env_handle.join().unwrap_or_else(|_| {
                logging::error(
                    DataSource::System,
                    Some(point.id()),
                    "environmental worker panicked, scoring against climatology",
                );
                self.environment.estimated_reading(point, now)
            });

            (environmental, species)
        })
    }

    /// The species provider is always listed; the marine provider only
    /// when it supplied the temperature.
    fn data_sources(&self, environmental: &EnvironmentalReading) -> Vec<String> {
        let mut sources = vec![self.biodiversity.source_label().to_string()];
        if environmental.has_live_sst() {
            sources.push(self.environment.source_label().to_string());
        }
        sources
    }
}
