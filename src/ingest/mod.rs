/// Upstream data clients.
///
/// Two external services feed the assessments:
/// - `copernicus` — Copernicus Marine WMS point values (SST, biogeochemistry).
/// - `obis` — Ocean Biodiversity Information System occurrence statistics.
///
/// The aggregators in `service` only see the traits defined here, so tests
/// can drive them with in-memory fakes instead of the network.

pub mod copernicus;
pub mod obis;
pub mod token;

use chrono::NaiveDate;

use crate::model::IngestError;
use obis::{BoundingBox, ChecklistPage};

// ---------------------------------------------------------------------------
// Marine variables
// ---------------------------------------------------------------------------

/// Water-column variables that can be requested as a point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarineVariable {
    /// Sea-surface temperature, reported in Kelvin upstream.
    Sst,
    /// Chlorophyll-a, mg/m³.
    Chlorophyll,
    /// Dissolved oxygen, reported in mmol/m³ upstream.
    Oxygen,
    Ph,
}

/// Molar volume of O₂ at STP: 1 ml/L = 44.661 mmol/m³.
const OXYGEN_MMOL_PER_ML: f64 = 44.661;
const KELVIN_OFFSET: f64 = 273.15;

impl MarineVariable {
    /// Layer name on the WMS endpoint and property name in the response.
    pub fn layer(&self) -> &'static str {
        match self {
            MarineVariable::Sst => "analysed_sst",
            MarineVariable::Chlorophyll => "chl",
            MarineVariable::Oxygen => "o2",
            MarineVariable::Ph => "ph",
        }
    }

    /// Biogeochemistry layers sit behind the authenticated endpoint.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, MarineVariable::Sst)
    }

    /// Converts an upstream value to the unit used in readings
    /// (°C, mg/m³, ml/L, pH units).
    pub fn to_reading_units(&self, raw: f64) -> f64 {
        match self {
            MarineVariable::Sst => raw - KELVIN_OFFSET,
            MarineVariable::Oxygen => raw / OXYGEN_MMOL_PER_ML,
            MarineVariable::Chlorophyll | MarineVariable::Ph => raw,
        }
    }

    /// Half-width in degrees of the GetFeatureInfo query box; the
    /// biogeochemistry grid is coarser than the SST analysis.
    pub fn bbox_half_width(&self) -> f64 {
        if self.requires_auth() { 0.25 } else { 0.1 }
    }

    pub const BIOGEOCHEMISTRY: [MarineVariable; 3] =
        [MarineVariable::Chlorophyll, MarineVariable::Oxygen, MarineVariable::Ph];
}

impl std::fmt::Display for MarineVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MarineVariable::Sst => "sst",
            MarineVariable::Chlorophyll => "chlorophyll",
            MarineVariable::Oxygen => "dissolved_oxygen",
            MarineVariable::Ph => "ph",
        };
        write!(f, "{}", name)
    }
}

// ---------------------------------------------------------------------------
// Source traits
// ---------------------------------------------------------------------------

/// A provider of live point values for marine variables.
///
/// Implementations must never fail: every network, auth or decode problem
/// is logged and reported as `None`.
pub trait MarineDataSource: Send + Sync {
    /// Whether the authenticated layers can be attempted at all.
    fn has_credentials(&self) -> bool;

    /// Value of `variable` in reading units at the grid cell nearest to
    /// (`lat`, `lon`), or `None`.
    fn fetch_point_value(&self, variable: MarineVariable, lat: f64, lon: f64) -> Option<f64>;

    /// Values for several variables at one point, in the order given.
    /// Sources that can answer several layers in one request override this.
    fn fetch_point_values(&self, variables: &[MarineVariable], lat: f64, lon: f64) -> Vec<Option<f64>> {
        variables
            .iter()
            .map(|&variable| self.fetch_point_value(variable, lat, lon))
            .collect()
    }

    /// Label reported in `HealthAssessment::data_sources`.
    fn label(&self) -> &'static str;
}

/// A provider of species occurrence statistics.
///
/// Unlike `MarineDataSource` this surfaces errors, because the caller
/// must discard partial results when any of its queries fails.
pub trait BiodiversitySource: Send + Sync {
    /// Number of occurrence records inside `region`, optionally limited to
    /// records dated on or after `since`.
    fn occurrence_count(&self, region: &BoundingBox, since: Option<NaiveDate>) -> Result<u64, IngestError>;

    /// First `size` checklist entries for `region`, plus the total number of
    /// distinct taxa.
    fn checklist(&self, region: &BoundingBox, size: usize) -> Result<ChecklistPage, IngestError>;

    fn label(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
