/// Core data types for the marine protected area health service.
///
/// This module defines the shared domain model imported by all other modules:
/// the request point, the environmental and species value objects, the
/// heatwave and health assessments, and the error enums. Everything here is
/// request-scoped; nothing is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request point
// ---------------------------------------------------------------------------

/// Smallest and largest accepted species search radius, in kilometres.
pub const MIN_RADIUS_KM: f64 = 1.0;
pub const MAX_RADIUS_KM: f64 = 500.0;

/// A geographic point identifying a marine protected area.
///
/// Fields are private so a `Point` can only be obtained through
/// [`Point::new`], which rejects out-of-range or non-finite coordinates.
/// The identifier is opaque and only used for cache identity and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    id: String,
    latitude: f64,
    longitude: f64,
}

impl Point {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Result<Self, AssessmentError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AssessmentError::InvalidPoint("identifier must not be empty".to_string()));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AssessmentError::InvalidPoint(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AssessmentError::InvalidPoint(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self { id, latitude, longitude })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Checks a species search radius against the accepted range.
pub fn validate_radius(radius_km: f64) -> Result<f64, AssessmentError> {
    if radius_km.is_finite() && (MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius_km) {
        Ok(radius_km)
    } else {
        Err(AssessmentError::InvalidRadius(radius_km))
    }
}

// ---------------------------------------------------------------------------
// Environmental reading
// ---------------------------------------------------------------------------

/// Where a single environmental field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Fetched from the upstream marine data service.
    Live,
    /// Filled from the climatology estimator.
    Estimated,
}

/// Per-field provenance for an `EnvironmentalReading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub sst: Provenance,
    pub chlorophyll: Provenance,
    pub dissolved_oxygen: Provenance,
    pub ph: Provenance,
    pub salinity: Provenance,
}

impl FieldProvenance {
    pub fn all_estimated() -> Self {
        Self {
            sst: Provenance::Estimated,
            chlorophyll: Provenance::Estimated,
            dissolved_oxygen: Provenance::Estimated,
            ph: Provenance::Estimated,
            salinity: Provenance::Estimated,
        }
    }
}

/// Environmental conditions at a point.
///
/// Every measurement is optional. `None` means unknown and is distinct from
/// a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalReading {
    pub sst: Option<f64>,               // °C, 1 decimal
    pub sst_anomaly: Option<f64>,       // °C vs climatology, 2 decimals
    pub chlorophyll: Option<f64>,       // mg/m³, 2 decimals
    pub dissolved_oxygen: Option<f64>,  // ml/L, 1 decimal
    pub ph: Option<f64>,                // 2 decimals
    pub salinity: Option<f64>,          // PSU, 1 decimal
    pub measurement_timestamp: Option<DateTime<Utc>>,
    pub provenance: FieldProvenance,
}

impl EnvironmentalReading {
    /// True when the SST value came from the upstream service rather than
    /// the climatology estimator.
    pub fn has_live_sst(&self) -> bool {
        self.sst.is_some() && self.provenance.sst == Provenance::Live
    }
}

/// One entry of a daily SST series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SstSample {
    pub date: chrono::NaiveDate,
    pub sst: f64,
}

// ---------------------------------------------------------------------------
// Species summary
// ---------------------------------------------------------------------------

/// Species occurrence statistics for an area around a point.
///
/// The upstream service does not guarantee `threatened_species <= total_species`
/// or `recent_observations <= total_observations`; consumers must tolerate
/// either being violated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSummary {
    pub total_species: u64,
    pub total_observations: u64,
    pub endemic_species: u64,
    pub threatened_species: u64,
    pub recent_observations: u64,
    /// Shannon entropy in nats, absent when it cannot be computed.
    pub biodiversity_index: Option<f64>,
    /// False when the numbers come from the latitude-banded estimate.
    pub live: bool,
}

/// A single checklist row, as returned by the species list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub records: u64,
    pub redlist_category: Option<String>,
}

// ---------------------------------------------------------------------------
// Heatwave assessment
// ---------------------------------------------------------------------------

/// Marine heatwave intensity categories, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatwaveCategory {
    None,
    Moderate,
    Strong,
    Severe,
    Extreme,
}

impl std::fmt::Display for HeatwaveCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HeatwaveCategory::None => "none",
            HeatwaveCategory::Moderate => "moderate",
            HeatwaveCategory::Strong => "strong",
            HeatwaveCategory::Severe => "severe",
            HeatwaveCategory::Extreme => "extreme",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatwaveAssessment {
    pub active: bool,
    pub category: HeatwaveCategory,
    pub current_sst: f64,
    pub climatological_mean: f64,
    pub p90_threshold: f64,
    pub anomaly: f64,
    pub intensity_ratio: f64,
    /// Present only while a heatwave is active.
    pub estimated_duration_days: Option<u32>,
    pub impact: String,
    pub recommendations: Vec<String>,
    pub sst_provenance: Provenance,
    pub assessed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Health assessment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// The four component scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub biodiversity: u8,
    pub water_quality: u8,
    /// Higher means less thermal stress.
    pub thermal_stress: u8,
    pub productivity: u8,
}

impl ScoreBreakdown {
    pub fn max_component(&self) -> u8 {
        self.biodiversity
            .max(self.water_quality)
            .max(self.thermal_stress)
            .max(self.productivity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub point: Point,
    pub score: u8,
    pub confidence: Confidence,
    pub breakdown: ScoreBreakdown,
    pub environmental: EnvironmentalReading,
    pub species: SpeciesSummary,
    pub data_sources: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or decoding upstream data.
///
/// None of these escape the assessment entry points; they are logged and
/// replaced with estimates at the ingest boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpError(u16),
    /// Connection failure, timeout, or body read failure.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body did not have the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),
    /// The response was well formed but carried no usable value.
    #[error("No data available: {0}")]
    NoDataAvailable(String),
    /// The operation needs credentials and none are configured.
    #[error("Credentials not configured")]
    MissingCredentials,
    /// The token exchange was rejected or could not be decoded.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            IngestError::HttpError(status.as_u16())
        } else if err.is_timeout() {
            IngestError::Transport(format!("timeout: {}", err))
        } else {
            IngestError::Transport(err.to_string())
        }
    }
}

/// Errors surfaced to callers of the assessment service.
///
/// These indicate programmer or configuration mistakes, never upstream
/// outages.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("invalid point: {0}")]
    InvalidPoint(String),
    #[error("invalid radius: {0} km (expected 1 to 500)")]
    InvalidRadius(f64),
    #[error("{operation} requires upstream credentials, none configured")]
    MissingCredentials { operation: &'static str },
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("failed to initialise upstream client: {0}")]
    ClientInit(#[source] IngestError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
