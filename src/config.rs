//! Service configuration.
//!
//! Settings are read from an optional TOML file; every section has defaults
//! so an empty file is valid. Upstream credentials are never stored in the
//! file: they come from `COPERNICUS_USERNAME` / `COPERNICUS_PASSWORD`,
//! optionally loaded from a `.env` file.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ENV_COPERNICUS_USERNAME: &str = "COPERNICUS_USERNAME";
pub const ENV_COPERNICUS_PASSWORD: &str = "COPERNICUS_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub environmental_ttl_secs: u64,
    pub species_ttl_secs: u64,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            environmental_ttl_secs: 3600,
            species_ttl_secs: 86_400,
            max_entries: 1000,
        }
    }
}

impl CacheConfig {
    pub fn environmental_ttl(&self) -> Duration {
        Duration::from_secs(self.environmental_ttl_secs)
    }

    pub fn species_ttl(&self) -> Duration {
        Duration::from_secs(self.species_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CopernicusConfig {
    /// Public WMS endpoint serving the L4 SST analysis.
    pub sst_wms_url: String,
    /// Authenticated WMS endpoint serving biogeochemistry layers.
    pub bgc_wms_url: String,
    /// OAuth2 password-grant endpoint.
    pub auth_url: String,
    pub timeout_secs: u64,
}

impl Default for CopernicusConfig {
    fn default() -> Self {
        Self {
            sst_wms_url: "https://nrt.cmems-du.eu/thredds/wms/METOFFICE-GLO-SST-L4-NRT-OBS-SST-V2"
                .to_string(),
            bgc_wms_url: "https://nrt.cmems-du.eu/thredds/wms/cmems_mod_glo_bgc_anfc_0.25deg_P1D-m"
                .to_string(),
            auth_url: "https://cmems-cas.cls.fr/cas/oauth2.0/accessToken".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObisConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub default_radius_km: f64,
}

impl Default for ObisConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.obis.org/v3".to_string(),
            timeout_secs: 30,
            default_radius_km: 50.0,
        }
    }
}

/// Policy for the species fallback estimate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    /// Apply a coordinate-seeded, reproducible ±20% variation to the
    /// latitude-banded species estimate. Off by default.
    pub fallback_jitter: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `debug`, `info`, `warn`, `error`.
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Copernicus Marine account credentials.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Returns `None` unless both parts are non-empty.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() || password.is_empty() {
            None
        } else {
            Some(Self { username, password })
        }
    }

    /// Reads credentials from the process environment.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(ENV_COPERNICUS_USERNAME).ok()?;
        let password = std::env::var(ENV_COPERNICUS_PASSWORD).ok()?;
        Self::new(username, password)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub copernicus: CopernicusConfig,
    pub obis: ObisConfig,
    pub estimates: EstimateConfig,
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl ServiceConfig {
    /// Parses and validates a TOML document. Credentials are left unset.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config file (if any), then `.env`, then credentials from
    /// the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        dotenv::dotenv().ok();
        config.credentials = Credentials::from_env();
        Ok(config)
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.environmental_ttl_secs == 0 || self.cache.species_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache TTLs must be greater than zero".to_string()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be greater than zero".to_string()));
        }
        for (name, secs) in [
            ("copernicus.timeout_secs", self.copernicus.timeout_secs),
            ("obis.timeout_secs", self.obis.timeout_secs),
        ] {
            if !(1..=120).contains(&secs) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 1 and 120 seconds, got {}",
                    name, secs
                )));
            }
        }
        crate::model::validate_radius(self.obis.default_radius_km).map_err(|_| {
            ConfigError::Invalid(format!(
                "obis.default_radius_km out of range: {}",
                self.obis.default_radius_km
            ))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = ServiceConfig::from_toml_str("").expect("empty config should be valid");
        assert_eq!(config.cache.environmental_ttl_secs, 3600);
        assert_eq!(config.cache.species_ttl_secs, 86_400);
        assert_eq!(config.copernicus.timeout_secs, 60);
        assert_eq!(config.obis.timeout_secs, 30);
        assert!(!config.estimates.fallback_jitter);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [cache]
            environmental_ttl_secs = 120

            [estimates]
            fallback_jitter = true
            "#,
        )
        .expect("valid config");
        assert_eq!(config.cache.environmental_ttl_secs, 120);
        assert_eq!(config.cache.species_ttl_secs, 86_400);
        assert!(config.estimates.fallback_jitter);
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let err = ServiceConfig::from_toml_str("[cache]\nspecies_ttl_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {:?}", err);
    }

    #[test]
    fn test_unbounded_timeout_is_rejected() {
        let err = ServiceConfig::from_toml_str("[obis]\ntimeout_secs = 600\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = ServiceConfig::from_toml_str("[cache\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(Credentials::new("", "secret").is_none());
        assert!(Credentials::new("user", "").is_none());
        assert!(Credentials::new("user", "secret").is_some());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("diver", "hunter2").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("diver"));
        assert!(!debug.contains("hunter2"), "password leaked into Debug output: {}", debug);
    }
}
