//! Assessment entry points.
//!
//! `AssessmentService` owns one instance of every component and is meant
//! to be built once by the host application and shared (it is `Sync`).
//! Submodules:
//! - `environment` — live/estimated environmental readings.
//! - `biodiversity` — species statistics with estimate fallback.
//! - `health` — composite score over both.

pub mod biodiversity;
pub mod environment;
pub mod health;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::alert::heatwave::HeatwaveClassifier;
use crate::cache::TtlCache;
use crate::config::ServiceConfig;
use crate::ingest::copernicus::CopernicusClient;
use crate::ingest::obis::ObisClient;
use crate::ingest::{BiodiversitySource, MarineDataSource, MarineVariable};
use crate::logging::{self, DataSource};
use crate::model::{
    validate_radius, AssessmentError, EnvironmentalReading, HealthAssessment, HeatwaveAssessment, Point,
    SpeciesRecord, SpeciesSummary, SstSample,
};

use biodiversity::BiodiversityAggregator;
use environment::EnvironmentalAggregator;
use health::HealthCalculator;

pub struct AssessmentService {
    environment: Arc<EnvironmentalAggregator>,
    biodiversity: Arc<BiodiversityAggregator>,
    heatwave: HeatwaveClassifier,
    health: HealthCalculator,
    default_radius_km: f64,
}

impl AssessmentService {
    /// Builds the service against the real Copernicus and OBIS endpoints.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, AssessmentError> {
        let copernicus = CopernicusClient::new(&config.copernicus, config.credentials.clone())
            .map_err(AssessmentError::ClientInit)?;
        let obis = ObisClient::new(&config.obis).map_err(AssessmentError::ClientInit)?;

        if config.credentials.is_none() {
            logging::info(
                DataSource::Copernicus,
                None,
                "no credentials configured, biogeochemistry will come from climatology",
            );
        }

        Self::with_sources(config, Arc::new(copernicus), Arc::new(obis))
    }

    /// Builds the service over arbitrary sources.
    pub fn with_sources(
        config: &ServiceConfig,
        marine: Arc<dyn MarineDataSource>,
        species: Arc<dyn BiodiversitySource>,
    ) -> Result<Self, AssessmentError> {
        config.validate()?;
        let cache = &config.cache;

        let environment = Arc::new(EnvironmentalAggregator::new(
            marine,
            TtlCache::new(cache.environmental_ttl(), cache.max_entries),
        ));
        let biodiversity = Arc::new(BiodiversityAggregator::new(
            species,
            TtlCache::new(cache.species_ttl(), cache.max_entries),
            config.estimates.fallback_jitter,
        ));
        let heatwave = HeatwaveClassifier::new(
            environment.clone(),
            TtlCache::new(cache.environmental_ttl(), cache.max_entries),
        );
        let health = HealthCalculator::new(environment.clone(), biodiversity.clone(), config.obis.default_radius_km);

        Ok(Self {
            environment,
            biodiversity,
            heatwave,
            health,
            default_radius_km: config.obis.default_radius_km,
        })
    }

    pub fn environment(&self) -> &EnvironmentalAggregator {
        &self.environment
    }

    pub fn biodiversity(&self) -> &BiodiversityAggregator {
        &self.biodiversity
    }

    // ---------------------------------------------------------------------
    // Entry points
    // ---------------------------------------------------------------------

    pub fn get_environmental_reading(&self, point: &Point) -> EnvironmentalReading {
        self.environment.get_environmental_reading(point)
    }

    pub fn get_environmental_reading_at(&self, point: &Point, now: DateTime<Utc>) -> EnvironmentalReading {
        self.environment.get_environmental_reading_at(point, now)
    }

    /// `radius_km` defaults to the configured search radius.
    pub fn get_species_summary(&self, point: &Point, radius_km: Option<f64>) -> Result<SpeciesSummary, AssessmentError> {
        self.biodiversity
            .get_species_summary(point, radius_km.unwrap_or(self.default_radius_km))
    }

    pub fn classify_heatwave(&self, point: &Point) -> HeatwaveAssessment {
        self.heatwave.classify(point)
    }

    pub fn classify_heatwave_at(&self, point: &Point, now: DateTime<Utc>) -> HeatwaveAssessment {
        self.heatwave.classify_at(point, now)
    }

    pub fn calculate_health(&self, point: &Point) -> HealthAssessment {
        self.health.calculate(point)
    }

    pub fn calculate_health_at(&self, point: &Point, now: DateTime<Utc>) -> HealthAssessment {
        self.health.calculate_at(point, now)
    }

    /// Health with the species search limited to `radius_km`, typically a
    /// site's own extent. Shares the species cache with `get_species_summary`.
    pub fn calculate_health_within(&self, point: &Point, radius_km: f64) -> Result<HealthAssessment, AssessmentError> {
        self.calculate_health_within_at(point, radius_km, Utc::now())
    }

    pub fn calculate_health_within_at(
        &self,
        point: &Point,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> Result<HealthAssessment, AssessmentError> {
        let radius_km = validate_radius(radius_km)?;
        Ok(self.health.calculate_within_at(point, radius_km, now))
    }

    /// Fails with `MissingCredentials` when no upstream login is configured.
    pub fn live_biogeochemistry(&self, point: &Point) -> Result<Vec<(MarineVariable, Option<f64>)>, AssessmentError> {
        self.environment.live_biogeochemistry(point)
    }

    pub fn sst_timeseries(&self, point: &Point, days: u32) -> Vec<SstSample> {
        self.environment.sst_timeseries(point, days)
    }

    pub fn species_list(
        &self,
        point: &Point,
        radius_km: Option<f64>,
        limit: usize,
    ) -> Result<Vec<SpeciesRecord>, AssessmentError> {
        self.biodiversity
            .get_species_list(point, radius_km.unwrap_or(self.default_radius_km), limit)
    }
}
