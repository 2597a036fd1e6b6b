/// Structured logging for the assessment service
///
/// Every message carries the data source it concerns and, where relevant,
/// the point identifier. Output goes through `tracing`; `init_logger`
/// installs a console subscriber and optionally mirrors entries to a file.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::model::IngestError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl LogLevel {
    /// Parses the level names accepted in the `[logging]` config section.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Copernicus,
    Obis,
    Climatology,
    Cache,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Copernicus => write!(f, "COPERNICUS"),
            DataSource::Obis => write!(f, "OBIS"),
            DataSource::Climatology => write!(f, "CLIMATOLOGY"),
            DataSource::Cache => write!(f, "CACHE"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. no credentials, or a land/ice cell with no value
    Expected,
    /// Unexpected failure - indicates service degradation or an API change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify an upstream failure so routine gaps don't drown out real outages.
pub fn classify_failure(err: &IngestError) -> FailureType {
    match err {
        IngestError::MissingCredentials => FailureType::Expected,
        // Grid cells over land or sea ice legitimately carry no value.
        IngestError::NoDataAvailable(_) => FailureType::Expected,
        IngestError::HttpError(code) if *code >= 500 => FailureType::Unexpected,
        IngestError::HttpError(401) | IngestError::HttpError(403) => FailureType::Unexpected,
        IngestError::HttpError(_) => FailureType::Unknown,
        IngestError::ParseError(_) => FailureType::Unexpected,
        IngestError::AuthFailed(_) => FailureType::Unexpected,
        IngestError::Transport(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Logger Initialization
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `min_level` when set. With `log_file`, entries are
/// written to that file instead of stderr. Calling this twice is harmless;
/// the second call is ignored.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match (log_file, console_timestamps) {
        (Some(path), _) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        (None, true) => builder.with_writer(std::io::stderr).try_init(),
        (None, false) => builder.without_time().with_writer(std::io::stderr).try_init(),
    };

    if result.is_err() {
        debug(DataSource::System, None, "logger already initialized");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::info!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::warn!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::error!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::debug!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an upstream failure with automatic classification.
pub fn log_ingest_failure(source: DataSource, site_id: Option<&str>, operation: &str, err: &IngestError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(source, site_id, &message),
        FailureType::Unexpected => error(source, site_id, &message),
        FailureType::Unknown => warn(source, site_id, &message),
    }
}

/// Log that an estimate replaced live data for some fields.
pub fn log_fallback(site_id: &str, fields: &[&str]) {
    if fields.is_empty() {
        return;
    }
    let message = format!("using climatology estimates for: {}", fields.join(", "));
    debug(DataSource::Climatology, Some(site_id), &message);
}
