//! Data Source Verification Module
//!
//! Checks the live upstream services at each reference site to show which
//! data paths are reachable and returning values. Intended for operators
//! checking a deployment; the assessment path never calls it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::ingest::copernicus::CopernicusClient;
use crate::ingest::obis::{BoundingBox, ObisClient};
use crate::ingest::{BiodiversitySource, MarineVariable};
use crate::model::IngestError;
use crate::sites::{Site, SITE_REGISTRY};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub credentials_configured: bool,
    pub results: Vec<EndpointVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointVerification {
    /// `copernicus-sst`, `copernicus-bgc` or `obis`.
    pub check: String,
    pub site_id: String,
    pub status: VerificationStatus,
    /// Value or count returned by the check, if any.
    pub sample: Option<f64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    /// Endpoint answered but had nothing for this location.
    PartialSuccess,
    Failed,
    /// Not attempted, e.g. no credentials for an authenticated layer.
    Skipped,
}

impl EndpointVerification {
    fn new(check: &str, site: &Site) -> Self {
        Self {
            check: check.to_string(),
            site_id: site.id.to_string(),
            status: VerificationStatus::Failed,
            sample: None,
            error_message: None,
        }
    }

    fn with_outcome(mut self, outcome: Result<f64, IngestError>) -> Self {
        match outcome {
            Ok(value) => {
                self.status = VerificationStatus::Success;
                self.sample = Some(value);
            }
            Err(IngestError::NoDataAvailable(msg)) => {
                self.status = VerificationStatus::PartialSuccess;
                self.error_message = Some(msg);
            }
            Err(IngestError::MissingCredentials) => {
                self.status = VerificationStatus::Skipped;
                self.error_message = Some("COPERNICUS_USERNAME / COPERNICUS_PASSWORD not set".to_string());
            }
            Err(e) => {
                self.status = VerificationStatus::Failed;
                self.error_message = Some(e.to_string());
            }
        }
        self
    }
}

// ============================================================================
// Individual checks
// ============================================================================

/// Public SST layer at the site centroid.
pub fn verify_sst(client: &CopernicusClient, site: &Site) -> EndpointVerification {
    EndpointVerification::new("copernicus-sst", site)
        .with_outcome(client.try_fetch_point_value(MarineVariable::Sst, site.latitude, site.longitude))
}

/// Token exchange plus one authenticated chlorophyll lookup. Skipped
/// without credentials.
pub fn verify_bgc(client: &CopernicusClient, site: &Site) -> EndpointVerification {
    let outcome = client
        .require_token()
        .and_then(|_| client.try_fetch_point_value(MarineVariable::Chlorophyll, site.latitude, site.longitude));
    EndpointVerification::new("copernicus-bgc", site).with_outcome(outcome)
}

/// Occurrence count inside the site's search box. Zero records counts as
/// a partial success.
pub fn verify_obis(source: &dyn BiodiversitySource, site: &Site) -> EndpointVerification {
    let region = BoundingBox::around(site.latitude, site.longitude, site.radius_km);
    let outcome = source.occurrence_count(&region, None).and_then(|count| {
        if count > 0 {
            Ok(count as f64)
        } else {
            Err(IngestError::NoDataAvailable("no occurrence records in region".to_string()))
        }
    });
    EndpointVerification::new("obis", site).with_outcome(outcome)
}

pub fn summarize(results: &[EndpointVerification]) -> VerificationSummary {
    let mut summary = VerificationSummary {
        total: results.len(),
        ..Default::default()
    };
    for result in results {
        match result.status {
            VerificationStatus::Success | VerificationStatus::PartialSuccess => summary.working += 1,
            VerificationStatus::Failed => summary.failed += 1,
            VerificationStatus::Skipped => summary.skipped += 1,
        }
    }
    summary
}

// ============================================================================
// Full run
// ============================================================================

/// Runs every check against every reference site.
pub fn verify_sources(config: &ServiceConfig) -> Result<VerificationReport, IngestError> {
    let copernicus = CopernicusClient::new(&config.copernicus, config.credentials.clone())?;
    let obis = ObisClient::new(&config.obis)?;

    let mut results = Vec::new();
    for site in SITE_REGISTRY {
        results.push(verify_sst(&copernicus, site));
        results.push(verify_bgc(&copernicus, site));
        results.push(verify_obis(&obis, site));
    }

    Ok(VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        credentials_configured: config.credentials.is_some(),
        summary: summarize(&results),
        results,
    })
}

/// Human-readable summary on stderr, leaving stdout for the JSON report.
pub fn print_summary(report: &VerificationReport) {
    eprintln!("══════════════════════════════════════════════════════════");
    eprintln!("DATA SOURCE VERIFICATION ({})", report.timestamp);
    eprintln!("══════════════════════════════════════════════════════════");
    for result in &report.results {
        let mark = match result.status {
            VerificationStatus::Success => "✓",
            VerificationStatus::PartialSuccess => "⚠",
            VerificationStatus::Failed => "✗",
            VerificationStatus::Skipped => "-",
        };
        eprintln!(
            "  {} {:<15} {:<20} {}",
            mark,
            result.check,
            result.site_id,
            result.error_message.as_deref().unwrap_or("")
        );
    }
    eprintln!();
    eprintln!(
        "{}/{} working, {} failed, {} skipped",
        report.summary.working, report.summary.total, report.summary.failed, report.summary.skipped
    );
}

// ============================================================================
// Tests
// ============================================================================
