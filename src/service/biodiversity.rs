//! Biodiversity aggregator.
//!
//! Three occurrence queries per region (all-time total, checklist, last
//! 365 days). If any one fails the others are discarded and the whole
//! summary comes from the latitude-banded estimate, so a summary is never
//! half live and half guessed.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::analysis::diversity::{self, DIVERSITY_SAMPLE_LIMIT};
use crate::cache::{CacheKey, CacheStats, TtlCache};
use crate::ingest::obis::BoundingBox;
use crate::ingest::BiodiversitySource;
use crate::logging::{self, DataSource};
use crate::model::{validate_radius, AssessmentError, IngestError, Point, SpeciesRecord, SpeciesSummary};

/// Window for `recent_observations`.
pub const RECENT_WINDOW_DAYS: i64 = 365;
pub const MAX_SPECIES_LIST: usize = 100;

pub struct BiodiversityAggregator {
    source: Arc<dyn BiodiversitySource>,
    cache: TtlCache<SpeciesSummary>,
    fallback_jitter: bool,
}

impl BiodiversityAggregator {
    pub fn new(source: Arc<dyn BiodiversitySource>, cache: TtlCache<SpeciesSummary>, fallback_jitter: bool) -> Self {
        Self {
            source,
            cache,
            fallback_jitter,
        }
    }

    pub fn source_label(&self) -> &'static str {
        self.source.label()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Species statistics within `radius_km` of `point`.
    ///
    /// Errors only for a radius outside 1..=500 km; upstream failures
    /// produce an estimate instead.
    pub fn get_species_summary(&self, point: &Point, radius_km: f64) -> Result<SpeciesSummary, AssessmentError> {
        let radius_km = validate_radius(radius_km)?;
        Ok(self.summary_at(point, radius_km, Utc::now().date_naive()))
    }

    /// Cached summary for an already validated radius, as of `today`.
    pub fn summary_at(&self, point: &Point, radius_km: f64, today: NaiveDate) -> SpeciesSummary {
        let key = CacheKey::species(point, radius_km);
        self.cache.get_or_insert_with(key, || match self.query_upstream(point, radius_km, today) {
            Ok(summary) => summary,
            Err(e) => {
                logging::log_ingest_failure(DataSource::Obis, Some(point.id()), "species summary", &e);
                logging::info(
                    DataSource::Obis,
                    Some(point.id()),
                    "discarding partial results, using latitude-banded species estimate",
                );
                diversity::estimate_species_summary(point.latitude(), point.longitude(), self.fallback_jitter)
            }
        })
    }

    fn query_upstream(&self, point: &Point, radius_km: f64, today: NaiveDate) -> Result<SpeciesSummary, IngestError> {
        let region = BoundingBox::around(point.latitude(), point.longitude(), radius_km);
        let since = today - Duration::days(RECENT_WINDOW_DAYS);

        let total_observations = self.source.occurrence_count(&region, None)?;
        let checklist = self.source.checklist(&region, DIVERSITY_SAMPLE_LIMIT)?;
        let recent_observations = self.source.occurrence_count(&region, Some(since))?;

        let threatened_species = checklist
            .results
            .iter()
            .take(DIVERSITY_SAMPLE_LIMIT)
            .filter(|entry| diversity::is_threatened(entry.category.as_deref()))
            .count() as u64;

        Ok(SpeciesSummary {
            total_species: checklist.total,
            total_observations,
            // Endemism needs a range dataset the occurrence service does not offer.
            endemic_species: 0,
            threatened_species,
            recent_observations,
            biodiversity_index: diversity::shannon_index(&checklist.record_counts(DIVERSITY_SAMPLE_LIMIT)),
            live: true,
        })
    }

    /// Up to `limit` (clamped to 1..=100) checklist entries. Uncached; an
    /// upstream failure yields an empty list.
    pub fn get_species_list(&self, point: &Point, radius_km: f64, limit: usize) -> Result<Vec<SpeciesRecord>, AssessmentError> {
        let radius_km = validate_radius(radius_km)?;
        let limit = limit.clamp(1, MAX_SPECIES_LIST);
        let region = BoundingBox::around(point.latitude(), point.longitude(), radius_km);

        match self.source.checklist(&region, limit) {
            Ok(page) => Ok(page.results.iter().take(limit).map(|e| e.to_species_record()).collect()),
            Err(e) => {
                logging::log_ingest_failure(DataSource::Obis, Some(point.id()), "species list", &e);
                Ok(Vec::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
