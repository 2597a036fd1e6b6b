/// OBIS (Ocean Biodiversity Information System) API client
///
/// Retrieves occurrence counts and species checklists for a square region
/// around a point. All queries take a WKT polygon in the `geometry`
/// parameter.
///
/// API Documentation: https://api.obis.org/

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;

use crate::config::ObisConfig;
use crate::ingest::BiodiversitySource;
use crate::model::{IngestError, SpeciesRecord};

pub const SOURCE_LABEL: &str = "obis";

const KM_PER_DEGREE_LAT: f64 = 111.0;
/// Floor on cos(lat) so the box stays finite at the poles.
const MIN_LON_SCALE: f64 = 0.01;

// ============================================================================
// Query region
// ============================================================================

/// Axis-aligned box approximating a circle of `radius_km` around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// One degree of latitude is ~111 km everywhere; a degree of longitude
    /// shrinks with cos(lat). The box is clamped to valid coordinates and
    /// does not wrap the antimeridian.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Self {
        let lat_offset = radius_km / KM_PER_DEGREE_LAT;
        let lon_scale = lat.to_radians().cos().abs().max(MIN_LON_SCALE);
        let lon_offset = (radius_km / (KM_PER_DEGREE_LAT * lon_scale)).min(180.0);

        Self {
            min_lat: (lat - lat_offset).max(-90.0),
            max_lat: (lat + lat_offset).min(90.0),
            min_lon: (lon - lon_offset).max(-180.0),
            max_lon: (lon + lon_offset).min(180.0),
        }
    }

    /// Closed counter-clockwise ring in lon/lat order.
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({x0:.4} {y0:.4},{x1:.4} {y0:.4},{x1:.4} {y1:.4},{x0:.4} {y1:.4},{x0:.4} {y0:.4}))",
            x0 = self.min_lon,
            y0 = self.min_lat,
            x1 = self.max_lon,
            y1 = self.max_lat,
        )
    }
}

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct OccurrenceResponse {
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChecklistResponse {
    total: Option<u64>,
    #[serde(default)]
    results: Vec<ChecklistEntry>,
}

/// One taxon in a checklist response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChecklistEntry {
    #[serde(rename = "scientificName", default)]
    pub scientific_name: String,
    #[serde(rename = "vernacularName", default)]
    pub vernacular_name: Option<String>,
    #[serde(default)]
    pub phylum: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub records: Option<u64>,
    /// IUCN Red List category code, e.g. "VU".
    #[serde(default)]
    pub category: Option<String>,
}

impl ChecklistEntry {
    pub fn to_species_record(&self) -> SpeciesRecord {
        SpeciesRecord {
            scientific_name: self.scientific_name.clone(),
            common_name: self.vernacular_name.clone(),
            phylum: self.phylum.clone(),
            class: self.class.clone(),
            records: self.records.unwrap_or(0),
            redlist_category: self.category.clone(),
        }
    }
}

/// A page of checklist entries plus the number of taxa in the region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChecklistPage {
    pub total: u64,
    pub results: Vec<ChecklistEntry>,
}

impl ChecklistPage {
    /// Per-taxon record counts of the first `limit` entries. An entry
    /// without a count stands for one record.
    pub fn record_counts(&self, limit: usize) -> Vec<u64> {
        self.results
            .iter()
            .take(limit)
            .map(|e| e.records.unwrap_or(1))
            .collect()
    }
}

// ============================================================================
// URL building and parsing
// ============================================================================

fn endpoint(base_url: &str, path: &str, params: &[(&str, String)]) -> Result<Url, IngestError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Url::parse_with_params(&url, params).map_err(|e| IngestError::ParseError(format!("bad OBIS url {}: {}", url, e)))
}

/// `GET /occurrence` asking only for the total (`size=0`).
pub fn build_occurrence_url(base_url: &str, region: &BoundingBox, since: Option<NaiveDate>) -> Result<Url, IngestError> {
    let mut params = vec![("geometry", region.to_wkt()), ("size", "0".to_string())];
    if let Some(date) = since {
        params.push(("startdate", date.format("%Y-%m-%d").to_string()));
    }
    endpoint(base_url, "occurrence", &params)
}

/// `GET /checklist` returning at most `size` taxa.
pub fn build_checklist_url(base_url: &str, region: &BoundingBox, size: usize) -> Result<Url, IngestError> {
    endpoint(
        base_url,
        "checklist",
        &[("geometry", region.to_wkt()), ("size", size.to_string())],
    )
}

pub fn parse_occurrence_total(body: &str) -> Result<u64, IngestError> {
    let response: OccurrenceResponse =
        serde_json::from_str(body).map_err(|e| IngestError::ParseError(format!("occurrence response: {}", e)))?;
    response
        .total
        .ok_or_else(|| IngestError::ParseError("occurrence response has no 'total'".to_string()))
}

/// Decodes a checklist response. A missing `total` falls back to the
/// number of returned entries.
pub fn parse_checklist(body: &str) -> Result<ChecklistPage, IngestError> {
    let response: ChecklistResponse =
        serde_json::from_str(body).map_err(|e| IngestError::ParseError(format!("checklist response: {}", e)))?;
    Ok(ChecklistPage {
        total: response.total.unwrap_or(response.results.len() as u64),
        results: response.results,
    })
}

// ============================================================================
// Client
// ============================================================================

pub struct ObisClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl ObisClient {
    pub fn new(config: &ObisConfig) -> Result<Self, IngestError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    fn get_text(&self, url: Url) -> Result<String, IngestError> {
        let response = self.http.get(url).header("Accept", "application/json").send()?;
        if !response.status().is_success() {
            return Err(IngestError::HttpError(response.status().as_u16()));
        }
        Ok(response.text()?)
    }
}

impl BiodiversitySource for ObisClient {
    fn occurrence_count(&self, region: &BoundingBox, since: Option<NaiveDate>) -> Result<u64, IngestError> {
        let url = build_occurrence_url(&self.base_url, region, since)?;
        parse_occurrence_total(&self.get_text(url)?)
    }

    fn checklist(&self, region: &BoundingBox, size: usize) -> Result<ChecklistPage, IngestError> {
        let url = build_checklist_url(&self.base_url, region, size)?;
        parse_checklist(&self.get_text(url)?)
    }

    fn label(&self) -> &'static str {
        SOURCE_LABEL
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_at_equator_is_square_in_degrees() {
        let b = BoundingBox::around(0.0, 0.0, 111.0);
        assert_relative_eq!(b.max_lat, 1.0);
        assert_relative_eq!(b.min_lat, -1.0);
        assert_relative_eq!(b.max_lon, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_box_widens_in_longitude_toward_poles() {
        let b = BoundingBox::around(60.0, 10.0, 111.0);
        // cos(60°) = 0.5, so a degree of longitude is half as long.
        assert_relative_eq!(b.max_lon - 10.0, 2.0, epsilon = 1e-9);
        assert_relative_eq!(b.max_lat - 60.0, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_box_is_clamped_near_pole_and_antimeridian() {
        let b = BoundingBox::around(89.9, 179.9, 500.0);
        assert!(b.max_lat <= 90.0);
        assert!(b.max_lon <= 180.0);
        assert!(b.min_lon >= -180.0);
        assert!(b.min_lat.is_finite() && b.min_lon.is_finite());
    }

    #[test]
    fn test_wkt_ring_is_closed() {
        let wkt = BoundingBox {
            min_lat: -1.0,
            max_lat: 1.0,
            min_lon: 2.0,
            max_lon: 3.0,
        }
        .to_wkt();
        assert_eq!(
            wkt,
            "POLYGON((2.0000 -1.0000,3.0000 -1.0000,3.0000 1.0000,2.0000 1.0000,2.0000 -1.0000))"
        );
    }

    #[test]
    fn test_occurrence_url_encodes_geometry_and_date() {
        let region = BoundingBox::around(-18.29, 147.70, 50.0);
        let since = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        let url = build_occurrence_url("https://api.obis.org/v3/", &region, Some(since)).unwrap();
        assert_eq!(url.path(), "/v3/occurrence");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("startdate".to_string(), "2023-05-01".to_string())));
        assert!(pairs.contains(&("geometry".to_string(), region.to_wkt())));
        assert!(!url.as_str().contains(' '), "geometry must be percent-encoded: {}", url);
    }

    #[test]
    fn test_parse_occurrence_total() {
        assert_eq!(parse_occurrence_total(r#"{"total": 48213, "results": []}"#).unwrap(), 48_213);
        assert!(matches!(
            parse_occurrence_total(r#"{"results": []}"#),
            Err(IngestError::ParseError(_))
        ));
        assert!(parse_occurrence_total("Bad Gateway").is_err());
    }

    #[test]
    fn test_parse_checklist() {
        let body = r#"{
            "total": 812,
            "results": [
                {"scientificName": "Chelonia mydas", "vernacularName": "green turtle",
                 "phylum": "Chordata", "class": "Reptilia", "records": 340, "category": "EN"},
                {"scientificName": "Acropora millepora", "phylum": "Cnidaria", "records": 120},
                {"scientificName": "Tridacna gigas", "category": "VU"}
            ]
        }"#;
        let page = parse_checklist(body).expect("valid checklist");
        assert_eq!(page.total, 812);
        assert_eq!(page.results.len(), 3);
        assert_eq!(page.record_counts(100), vec![340, 120, 1]);
        assert_eq!(page.record_counts(2), vec![340, 120]);

        let record = page.results[0].to_species_record();
        assert_eq!(record.common_name.as_deref(), Some("green turtle"));
        assert_eq!(record.redlist_category.as_deref(), Some("EN"));
        assert_eq!(page.results[2].to_species_record().records, 0);
    }

    #[test]
    fn test_checklist_total_defaults_to_result_count() {
        let page = parse_checklist(r#"{"results":[{"scientificName":"A"},{"scientificName":"B"}]}"#).unwrap();
        assert_eq!(page.total, 2);
    }
}
