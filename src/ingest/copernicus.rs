/// Copernicus Marine Service client
///
/// Reads point values from the Copernicus THREDDS WMS endpoints with
/// `GetFeatureInfo` requests against a small box around the point:
/// - SST from the public L4 analysis (`analysed_sst`, Kelvin). No auth.
/// - Chlorophyll, oxygen and pH from the global biogeochemistry forecast,
///   which needs a bearer token obtained with the account credentials.
///
/// Every public fetch degrades to `None` on failure. The only exception is
/// `require_token`, used by callers that cannot run without a token.
///
/// WMS docs: https://help.marine.copernicus.eu/en/articles/6152813

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::{CopernicusConfig, Credentials};
use crate::ingest::token::{self, AccessToken, AuthState};
use crate::ingest::{MarineDataSource, MarineVariable};
use crate::logging::{self, DataSource};
use crate::model::IngestError;

pub const SOURCE_LABEL: &str = "copernicus";

// ---------------------------------------------------------------------------
// Request building and response parsing
// ---------------------------------------------------------------------------

/// Builds a WMS 1.3.0 `GetFeatureInfo` URL for the centre pixel of a 3×3
/// image spanning `half_width` degrees either side of the point. `layer`
/// may be a comma-separated list to query several layers at once.
///
/// The box is given in lon,lat order, which is what the THREDDS server
/// expects for `CRS=EPSG:4326`.
pub fn build_feature_info_url(base_url: &str, layer: &str, lat: f64, lon: f64, half_width: f64) -> String {
    let bbox = format!(
        "{},{},{},{}",
        lon - half_width,
        lat - half_width,
        lon + half_width,
        lat + half_width
    );

    format!(
        "{}?SERVICE=WMS&VERSION=1.3.0&REQUEST=GetFeatureInfo\
         &LAYERS={layer}&QUERY_LAYERS={layer}&INFO_FORMAT=application/json\
         &CRS=EPSG:4326&BBOX={}&WIDTH=3&HEIGHT=3&I=1&J=1",
        base_url.trim_end_matches('/'),
        bbox,
        layer = layer,
    )
}

fn features_of(body: &str) -> Result<Vec<Value>, IngestError> {
    let mut json: Value = serde_json::from_str(body)
        .map_err(|e| IngestError::ParseError(format!("GetFeatureInfo body is not JSON: {}", e)))?;

    match json.get_mut("features").map(Value::take) {
        Some(Value::Array(features)) => Ok(features),
        _ => Err(IngestError::ParseError("missing 'features' array".to_string())),
    }
}

/// Finite value of `layer` in one feature's properties. The value may be a
/// number or a numeric string; null, `"NaN"` and absent properties mean the
/// cell has no data (land, sea ice, outside the model domain).
fn property_value(feature: &Value, layer: &str) -> Option<f64> {
    let value = match feature.get("properties")?.get(layer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Extracts the raw value of `layer` from a GeoJSON `GetFeatureInfo`
/// response, in upstream units. Only the first feature is read.
pub fn parse_feature_info(body: &str, layer: &str) -> Result<f64, IngestError> {
    let features = features_of(body)?;

    let first = features
        .first()
        .ok_or_else(|| IngestError::NoDataAvailable(format!("no feature returned for {}", layer)))?;

    property_value(first, layer)
        .ok_or_else(|| IngestError::NoDataAvailable(format!("{} has no value at this cell", layer)))
}

/// Raw values of several layers from one multi-layer response, in the order
/// of `layers`. Servers answer either with one feature carrying every layer
/// or with one feature per layer, so every feature is searched.
pub fn parse_feature_info_layers(body: &str, layers: &[&str]) -> Result<Vec<Option<f64>>, IngestError> {
    let features = features_of(body)?;

    Ok(layers
        .iter()
        .map(|layer| features.iter().find_map(|f| property_value(f, layer)))
        .collect())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Copernicus client with a process-wide cached bearer token.
///
/// The token lives behind a mutex that is held across the refresh, so
/// concurrent callers that find the token missing or expiring wait for one
/// exchange instead of each performing their own.
pub struct CopernicusClient {
    http: reqwest::blocking::Client,
    config: CopernicusConfig,
    credentials: Option<Credentials>,
    token: Mutex<Option<AccessToken>>,
}

impl CopernicusClient {
    pub fn new(config: &CopernicusConfig, credentials: Option<Credentials>) -> Result<Self, IngestError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
            credentials,
            token: Mutex::new(None),
        })
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<AccessToken>> {
        // A panic while holding the lock leaves at worst a stale token,
        // which the freshness check handles.
        match self.token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn auth_state_at(&self, now: DateTime<Utc>) -> AuthState {
        token::auth_state_at(self.token_slot().as_ref(), now)
    }

    /// Current bearer token, or `None` if there are no credentials or the
    /// exchange failed. Failures are logged, never returned.
    pub fn get_token(&self) -> Option<String> {
        self.get_token_at(Utc::now())
    }

    pub fn get_token_at(&self, now: DateTime<Utc>) -> Option<String> {
        match self.token_at(now) {
            Ok(token) => Some(token),
            Err(e) => {
                logging::log_ingest_failure(DataSource::Copernicus, None, "token exchange", &e);
                None
            }
        }
    }

    /// Like `get_token` but reports why no token is available.
    pub fn require_token(&self) -> Result<String, IngestError> {
        self.token_at(Utc::now())
    }

    fn token_at(&self, now: DateTime<Utc>) -> Result<String, IngestError> {
        let credentials = self.credentials.as_ref().ok_or(IngestError::MissingCredentials)?;

        let mut slot = self.token_slot();
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh_at(now) {
                return Ok(cached.token.clone());
            }
        }

        match self.exchange_credentials(credentials, now) {
            Ok(fresh) => {
                logging::debug(
                    DataSource::Copernicus,
                    None,
                    &format!("obtained access token valid until {}", fresh.expires_at),
                );
                let value = fresh.token.clone();
                *slot = Some(fresh);
                Ok(value)
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        }
    }

    /// OAuth2 password grant against the CAS endpoint.
    fn exchange_credentials(&self, credentials: &Credentials, now: DateTime<Utc>) -> Result<AccessToken, IngestError> {
        let response = self
            .http
            .post(&self.config.auth_url)
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::AuthFailed(format!("token endpoint returned {}", status.as_u16())));
        }

        let body = response.text()?;
        token::parse_token_response(&body, now)
    }

    fn endpoint_for(&self, variable: MarineVariable) -> &str {
        if variable.requires_auth() {
            &self.config.bgc_wms_url
        } else {
            &self.config.sst_wms_url
        }
    }

    /// One `GetFeatureInfo` request for `variables`, which must all live on
    /// the same endpoint (the first variable picks it). Returns the body.
    fn query_layers(&self, variables: &[MarineVariable], lat: f64, lon: f64) -> Result<String, IngestError> {
        let Some(&first) = variables.first() else {
            return Err(IngestError::NoDataAvailable("no layers requested".to_string()));
        };

        let bearer = if first.requires_auth() {
            Some(self.token_at(Utc::now())?)
        } else {
            None
        };

        let layers = variables.iter().map(|v| v.layer()).collect::<Vec<_>>().join(",");
        let url = build_feature_info_url(self.endpoint_for(first), &layers, lat, lon, first.bbox_half_width());

        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(IngestError::HttpError(response.status().as_u16()));
        }

        Ok(response.text()?)
    }

    /// Fetches one variable and reports why it failed, in reading units.
    pub fn try_fetch_point_value(&self, variable: MarineVariable, lat: f64, lon: f64) -> Result<f64, IngestError> {
        let body = self.query_layers(&[variable], lat, lon)?;
        let raw = parse_feature_info(&body, variable.layer())?;
        let value = variable.to_reading_units(raw);

        if value.is_finite() {
            Ok(value)
        } else {
            Err(IngestError::NoDataAvailable(format!("{} converted to a non-finite value", variable)))
        }
    }

    /// Fetches several same-endpoint variables with a single request. A
    /// layer missing from the response is `None`; a failed request is an
    /// error for all of them.
    pub fn try_fetch_point_values(
        &self,
        variables: &[MarineVariable],
        lat: f64,
        lon: f64,
    ) -> Result<Vec<Option<f64>>, IngestError> {
        if variables.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.query_layers(variables, lat, lon)?;
        let layers: Vec<&str> = variables.iter().map(|v| v.layer()).collect();
        let raw = parse_feature_info_layers(&body, &layers)?;

        Ok(variables
            .iter()
            .zip(raw)
            .map(|(variable, value)| value.map(|v| variable.to_reading_units(v)).filter(|v| v.is_finite()))
            .collect())
    }
}

impl MarineDataSource for CopernicusClient {
    fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn fetch_point_value(&self, variable: MarineVariable, lat: f64, lon: f64) -> Option<f64> {
        match self.try_fetch_point_value(variable, lat, lon) {
            Ok(value) => Some(value),
            Err(e) => {
                let operation = format!("{} point fetch at ({:.2}, {:.2})", variable, lat, lon);
                logging::log_ingest_failure(DataSource::Copernicus, None, &operation, &e);
                None
            }
        }
    }

    fn fetch_point_values(&self, variables: &[MarineVariable], lat: f64, lon: f64) -> Vec<Option<f64>> {
        let one_endpoint = variables.windows(2).all(|w| w[0].requires_auth() == w[1].requires_auth());
        if variables.len() < 2 || !one_endpoint {
            return variables
                .iter()
                .map(|&variable| self.fetch_point_value(variable, lat, lon))
                .collect();
        }

        match self.try_fetch_point_values(variables, lat, lon) {
            Ok(values) => values,
            Err(e) => {
                let operation = format!("{} layer point fetch at ({:.2}, {:.2})", variables.len(), lat, lon);
                logging::log_ingest_failure(DataSource::Copernicus, None, &operation, &e);
                vec![None; variables.len()]
            }
        }
    }

    fn label(&self) -> &'static str {
        SOURCE_LABEL
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Endpoints that refuse connections immediately.
    fn unreachable_config() -> CopernicusConfig {
        CopernicusConfig {
            sst_wms_url: "http://127.0.0.1:1/wms/sst".to_string(),
            bgc_wms_url: "http://127.0.0.1:1/wms/bgc".to_string(),
            auth_url: "http://127.0.0.1:1/token".to_string(),
            timeout_secs: 2,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn client_with_credentials() -> CopernicusClient {
        CopernicusClient::new(&unreachable_config(), Credentials::new("diver", "secret"))
            .expect("client should build")
    }

    /// Local HTTP endpoint on a random port. Token requests get a numbered
    /// token valid for an hour, anything else gets `wms_body`.
    struct LocalUpstream {
        base: String,
        token_requests: Arc<AtomicUsize>,
        wms_requests: Arc<AtomicUsize>,
    }

    impl LocalUpstream {
        fn start(wms_body: &'static str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind local port");
            let base = format!("http://{}", listener.local_addr().unwrap());
            let token_requests = Arc::new(AtomicUsize::new(0));
            let wms_requests = Arc::new(AtomicUsize::new(0));

            let (tokens, wms) = (token_requests.clone(), wms_requests.clone());
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { continue };
                    let request_line = read_request(&mut stream);
                    let body = if request_line.contains("/token") {
                        let n = tokens.fetch_add(1, Ordering::SeqCst) + 1;
                        format!(r#"{{"access_token":"tok-{}","token_type":"bearer","expires_in":3600}}"#, n)
                    } else {
                        wms.fetch_add(1, Ordering::SeqCst);
                        wms_body.to_string()
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
            });

            Self {
                base,
                token_requests,
                wms_requests,
            }
        }

        fn client(&self) -> CopernicusClient {
            let config = CopernicusConfig {
                sst_wms_url: format!("{}/wms/sst", self.base),
                bgc_wms_url: format!("{}/wms/bgc", self.base),
                auth_url: format!("{}/token", self.base),
                timeout_secs: 5,
            };
            let mut client = CopernicusClient::new(&config, Credentials::new("diver", "secret")).unwrap();
            // Keep proxy settings from the environment away from 127.0.0.1.
            client.http = reqwest::blocking::Client::builder().no_proxy().build().unwrap();
            client
        }

        fn token_requests(&self) -> usize {
            self.token_requests.load(Ordering::SeqCst)
        }

        fn wms_requests(&self) -> usize {
            self.wms_requests.load(Ordering::SeqCst)
        }
    }

    /// Consumes one request, body included, and returns its request line.
    fn read_request(stream: &mut TcpStream) -> String {
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        let _ = reader.read_line(&mut request_line);

        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0; content_length];
        let _ = reader.read_exact(&mut body);
        request_line
    }

    // --- URL building -------------------------------------------------------

    #[test]
    fn test_feature_info_url_contains_layer_and_bbox() {
        let url = build_feature_info_url("https://example.org/wms/", "analysed_sst", 10.0, -20.0, 0.5);
        assert!(url.starts_with("https://example.org/wms?SERVICE=WMS"), "got {}", url);
        assert!(url.contains("LAYERS=analysed_sst&QUERY_LAYERS=analysed_sst"));
        assert!(url.contains("BBOX=-20.5,9.5,-19.5,10.5"), "bbox must be lon,lat order: {}", url);
        assert!(url.contains("I=1&J=1"));
    }

    // --- Parsing -------------------------------------------------------------

    #[test]
    fn test_parse_numeric_property() {
        let body = r#"{"type":"FeatureCollection","features":[{"properties":{"analysed_sst":300.65}}]}"#;
        assert_relative_eq!(parse_feature_info(body, "analysed_sst").unwrap(), 300.65);
    }

    #[test]
    fn test_parse_string_property() {
        let body = r#"{"features":[{"properties":{"chl":" 0.37 "}}]}"#;
        assert_relative_eq!(parse_feature_info(body, "chl").unwrap(), 0.37);
    }

    #[test]
    fn test_land_cell_is_no_data() {
        for body in [
            r#"{"features":[{"properties":{"analysed_sst":null}}]}"#,
            r#"{"features":[{"properties":{"analysed_sst":"NaN"}}]}"#,
            r#"{"features":[{"properties":{}}]}"#,
            r#"{"features":[]}"#,
        ] {
            let err = parse_feature_info(body, "analysed_sst").unwrap_err();
            assert!(matches!(err, IngestError::NoDataAvailable(_)), "{} gave {:?}", body, err);
        }
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        for body in ["<ServiceExceptionReport/>", r#"{"type":"FeatureCollection"}"#] {
            let err = parse_feature_info(body, "chl").unwrap_err();
            assert!(matches!(err, IngestError::ParseError(_)), "{} gave {:?}", body, err);
        }
    }

    // --- Token handling ------------------------------------------------------

    #[test]
    fn test_no_credentials_means_no_token() {
        let client = CopernicusClient::new(&unreachable_config(), None).unwrap();
        assert_eq!(client.get_token_at(fixed_now()), None);
        assert_eq!(client.auth_state_at(fixed_now()), AuthState::Unauthenticated);
        assert!(matches!(client.require_token(), Err(IngestError::MissingCredentials)));
    }

    #[test]
    fn test_fresh_cached_token_is_reused_without_exchange() {
        let client = client_with_credentials();
        *client.token.lock().unwrap() = Some(AccessToken {
            token: "cached".to_string(),
            expires_at: fixed_now() + ChronoDuration::hours(1),
        });
        // The auth endpoint is unreachable, so a returned token proves no
        // exchange happened.
        assert_eq!(client.get_token_at(fixed_now()), Some("cached".to_string()));
        assert_eq!(client.auth_state_at(fixed_now()), AuthState::TokenValid);
    }

    #[test]
    fn test_expiring_token_is_refreshed_and_cleared_on_failure() {
        let client = client_with_credentials();
        *client.token.lock().unwrap() = Some(AccessToken {
            token: "old".to_string(),
            expires_at: fixed_now() + ChronoDuration::minutes(2),
        });
        assert_eq!(client.auth_state_at(fixed_now()), AuthState::TokenExpiring);
        assert_eq!(client.get_token_at(fixed_now()), None, "failed refresh must not return the stale token");
        assert_eq!(client.auth_state_at(fixed_now()), AuthState::Unauthenticated);
    }

    #[test]
    fn test_token_is_exchanged_once_then_refreshed_near_expiry() {
        let upstream = LocalUpstream::start(r#"{"features":[]}"#);
        let client = upstream.client();

        assert_eq!(client.auth_state_at(fixed_now()), AuthState::Unauthenticated);
        assert_eq!(client.get_token_at(fixed_now()), Some("tok-1".to_string()));
        assert_eq!(client.auth_state_at(fixed_now()), AuthState::TokenValid);

        let half_hour_later = fixed_now() + ChronoDuration::minutes(30);
        assert_eq!(client.get_token_at(half_hour_later), Some("tok-1".to_string()));
        assert_eq!(upstream.token_requests(), 1, "a fresh token must be reused");

        // 56 minutes in, the hour-long token is inside the refresh margin.
        let near_expiry = fixed_now() + ChronoDuration::minutes(56);
        assert_eq!(client.auth_state_at(near_expiry), AuthState::TokenExpiring);
        assert_eq!(client.get_token_at(near_expiry), Some("tok-2".to_string()));
        assert_eq!(upstream.token_requests(), 2);
    }

    #[test]
    fn test_concurrent_callers_share_one_exchange() {
        let upstream = LocalUpstream::start(r#"{"features":[]}"#);
        let client = upstream.client();

        let tokens: Vec<Option<String>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| client.get_token_at(fixed_now()))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(
            tokens.iter().all(|t| t.as_deref() == Some("tok-1")),
            "every caller should see the single exchanged token: {:?}",
            tokens
        );
        assert_eq!(upstream.token_requests(), 1);
    }

    #[test]
    fn test_biogeochemistry_comes_from_one_request() {
        let upstream =
            LocalUpstream::start(r#"{"features":[{"properties":{"chl":0.42,"o2":223.305,"ph":"8.05"}}]}"#);
        let client = upstream.client();

        let values = client.fetch_point_values(&MarineVariable::BIOGEOCHEMISTRY, -18.3, 147.7);

        assert_eq!(upstream.wms_requests(), 1, "chl, o2 and ph share one GetFeatureInfo");
        assert_eq!(upstream.token_requests(), 1);
        assert_relative_eq!(values[0].unwrap(), 0.42);
        assert_relative_eq!(values[1].unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(values[2].unwrap(), 8.05);
    }

    #[test]
    fn test_multi_layer_response_with_one_feature_per_layer() {
        let body = r#"{"features":[{"properties":{"chl":0.3}},{"properties":{"ph":8.1,"o2":null}}]}"#;
        assert_eq!(
            parse_feature_info_layers(body, &["chl", "o2", "ph"]).unwrap(),
            vec![Some(0.3), None, Some(8.1)]
        );
    }

    // --- Degradation ---------------------------------------------------------

    #[test]
    fn test_unreachable_endpoint_yields_no_value() {
        let client = client_with_credentials();
        assert_eq!(client.fetch_point_value(MarineVariable::Sst, 0.0, 0.0), None);
        assert_eq!(client.fetch_point_value(MarineVariable::Chlorophyll, 0.0, 0.0), None);
        assert_eq!(
            client.fetch_point_values(&MarineVariable::BIOGEOCHEMISTRY, 0.0, 0.0),
            vec![None, None, None]
        );
    }

    #[test]
    fn test_biogeochemistry_without_credentials_is_missing_credentials() {
        let client = CopernicusClient::new(&unreachable_config(), None).unwrap();
        let err = client.try_fetch_point_value(MarineVariable::Ph, 0.0, 0.0).unwrap_err();
        assert_eq!(err, IngestError::MissingCredentials);
        assert!(!client.has_credentials());
    }
}
