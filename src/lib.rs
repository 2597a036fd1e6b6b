//! Ecosystem health assessment for marine protected areas.
//!
//! Combines live Copernicus Marine measurements and OBIS biodiversity
//! statistics with climatological estimates into a bounded health score,
//! and classifies marine heatwaves. Every entry point on
//! [`service::AssessmentService`] degrades to estimates instead of failing
//! when an upstream service is unavailable.

pub mod alert;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod service;
pub mod sites;
pub mod verify;

pub use config::ServiceConfig;
pub use model::{AssessmentError, Point};
pub use service::AssessmentService;
