//! Environmental aggregator.
//!
//! Merges live point values with climatology, field by field: a live value
//! always wins, the estimator fills whatever is missing. Salinity has no
//! live source and is always estimated.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::analysis::climatology::{self, round_to};
use crate::cache::{CacheKey, CacheKind, CacheStats, TtlCache};
use crate::ingest::{MarineDataSource, MarineVariable};
use crate::logging;
use crate::model::{AssessmentError, EnvironmentalReading, FieldProvenance, Point, Provenance, SstSample};

pub const MIN_SERIES_DAYS: u32 = 7;
pub const MAX_SERIES_DAYS: u32 = 365;

pub struct EnvironmentalAggregator {
    source: Arc<dyn MarineDataSource>,
    cache: TtlCache<EnvironmentalReading>,
}

impl EnvironmentalAggregator {
    pub fn new(source: Arc<dyn MarineDataSource>, cache: TtlCache<EnvironmentalReading>) -> Self {
        Self { source, cache }
    }

    pub fn source_label(&self) -> &'static str {
        self.source.label()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn get_environmental_reading(&self, point: &Point) -> EnvironmentalReading {
        self.get_environmental_reading_at(point, Utc::now())
    }

    /// Cached reading for `point`, assembled on a miss as of `now`.
    pub fn get_environmental_reading_at(&self, point: &Point, now: DateTime<Utc>) -> EnvironmentalReading {
        let key = CacheKey::for_point(CacheKind::Environmental, point);
        self.cache.get_or_insert_with(key, || self.assemble_reading(point, now))
    }

    fn assemble_reading(&self, point: &Point, now: DateTime<Utc>) -> EnvironmentalReading {
        let lat = point.latitude();
        let lon = point.longitude();
        let day = now.ordinal();

        let live_sst = self.source.fetch_point_value(MarineVariable::Sst, lat, lon);

        let (live_chl, live_oxygen, live_ph) = if self.source.has_credentials() {
            match self
                .source
                .fetch_point_values(&MarineVariable::BIOGEOCHEMISTRY, lat, lon)
                .as_slice()
            {
                &[chl, oxygen, ph] => (chl, oxygen, ph),
                _ => (None, None, None),
            }
        } else {
            (None, None, None)
        };

        let mut provenance = FieldProvenance::all_estimated();
        let mut estimated: Vec<&str> = Vec::new();

        let sst = merge(live_sst, &mut provenance.sst, "sst", &mut estimated, || {
            climatology::estimate_sst(lat, day)
        });
        let chlorophyll = merge(live_chl, &mut provenance.chlorophyll, "chlorophyll", &mut estimated, || {
            climatology::estimate_chlorophyll(lat, day)
        });
        let dissolved_oxygen = merge(live_oxygen, &mut provenance.dissolved_oxygen, "dissolved_oxygen", &mut estimated, || {
            climatology::estimate_oxygen(sst)
        });
        let ph = merge(live_ph, &mut provenance.ph, "ph", &mut estimated, || climatology::estimate_ph(lat));
        let salinity = climatology::estimate_salinity(lat);
        estimated.push("salinity");

        // Only a measured temperature has a meaningful departure from normal.
        let sst_anomaly = live_sst.map(|v| round_to(v - climatology::estimate_sst(lat, day), 2));

        logging::log_fallback(point.id(), &estimated);

        EnvironmentalReading {
            sst: Some(round_to(sst, 1)),
            sst_anomaly,
            chlorophyll: Some(round_to(chlorophyll, 2)),
            dissolved_oxygen: Some(round_to(dissolved_oxygen, 1)),
            ph: Some(round_to(ph, 2)),
            salinity: Some(round_to(salinity, 1)),
            measurement_timestamp: Some(now),
            provenance,
        }
    }

    /// A reading built from climatology alone, bypassing source and cache.
    pub fn estimated_reading(&self, point: &Point, now: DateTime<Utc>) -> EnvironmentalReading {
        let lat = point.latitude();
        let day = now.ordinal();
        let sst = climatology::estimate_sst(lat, day);
        EnvironmentalReading {
            sst: Some(round_to(sst, 1)),
            sst_anomaly: None,
            chlorophyll: Some(round_to(climatology::estimate_chlorophyll(lat, day), 2)),
            dissolved_oxygen: Some(round_to(climatology::estimate_oxygen(sst), 1)),
            ph: Some(round_to(climatology::estimate_ph(lat), 2)),
            salinity: Some(round_to(climatology::estimate_salinity(lat), 1)),
            measurement_timestamp: Some(now),
            provenance: FieldProvenance::all_estimated(),
        }
    }

    /// Unrounded, uncached current SST and where it came from.
    pub fn current_sst_at(&self, point: &Point, now: DateTime<Utc>) -> (f64, Provenance) {
        match self
            .source
            .fetch_point_value(MarineVariable::Sst, point.latitude(), point.longitude())
        {
            Some(sst) => (sst, Provenance::Live),
            None => {
                logging::log_fallback(point.id(), &["sst"]);
                (climatology::estimate_sst(point.latitude(), now.ordinal()), Provenance::Estimated)
            }
        }
    }

    /// Raw live biogeochemistry values with no estimate fill and no caching.
    /// Unlike every other operation here it fails without credentials.
    pub fn live_biogeochemistry(&self, point: &Point) -> Result<Vec<(MarineVariable, Option<f64>)>, AssessmentError> {
        if !self.source.has_credentials() {
            return Err(AssessmentError::MissingCredentials {
                operation: "live biogeochemistry",
            });
        }
        let values = self.source.fetch_point_values(
            &MarineVariable::BIOGEOCHEMISTRY,
            point.latitude(),
            point.longitude(),
        );
        Ok(MarineVariable::BIOGEOCHEMISTRY.into_iter().zip(values).collect())
    }

    /// Daily climatological SST ending today; `days` is clamped to 7..=365.
    pub fn sst_timeseries(&self, point: &Point, days: u32) -> Vec<SstSample> {
        self.sst_timeseries_until(point, days, Utc::now().date_naive())
    }

    pub fn sst_timeseries_until(&self, point: &Point, days: u32, end: NaiveDate) -> Vec<SstSample> {
        let days = days.clamp(MIN_SERIES_DAYS, MAX_SERIES_DAYS);
        climatology::sst_series(point.latitude(), end, days)
    }
}

fn merge<'a>(
    live: Option<f64>,
    provenance: &mut Provenance,
    field: &'a str,
    estimated: &mut Vec<&'a str>,
    estimate: impl FnOnce() -> f64,
) -> f64 {
    match live {
        Some(value) => {
            *provenance = Provenance::Live;
            value
        }
        None => {
            estimated.push(field);
            estimate()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
