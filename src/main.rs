//! CLI for the MPA health service

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use mpa_health_service::logging::{self, DataSource, LogLevel};
use mpa_health_service::model::Point;
use mpa_health_service::{sites, verify, AssessmentService, ServiceConfig};

#[derive(Parser)]
#[command(name = "mpa-health")]
#[command(about = "Ecosystem health assessment for marine protected areas", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where to assess: a reference site, or explicit coordinates.
#[derive(Args)]
struct Target {
    /// Reference site id (see `sites`)
    #[arg(short, long, conflicts_with_all = ["lat", "lon"])]
    site: Option<String>,

    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,

    /// Identifier for an explicit point
    #[arg(long, default_value = "custom")]
    id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite health score
    Health {
        #[command(flatten)]
        target: Target,

        /// Species search radius in km (1-500); defaults to the site's extent
        #[arg(short, long)]
        radius: Option<f64>,
    },

    /// Environmental reading (live where available, otherwise estimated)
    Environment {
        #[command(flatten)]
        target: Target,
    },

    /// Species statistics around the point
    Species {
        #[command(flatten)]
        target: Target,

        /// Search radius in km (1-500)
        #[arg(short, long)]
        radius: Option<f64>,
    },

    /// Species checklist around the point
    SpeciesList {
        #[command(flatten)]
        target: Target,

        /// Search radius in km (1-500)
        #[arg(short, long)]
        radius: Option<f64>,

        /// Maximum entries (1-100)
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Marine heatwave classification
    Heatwave {
        #[command(flatten)]
        target: Target,
    },

    /// Daily climatological SST series ending today
    Timeseries {
        #[command(flatten)]
        target: Target,

        /// Number of days (7-365)
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },

    /// List reference sites
    Sites,

    /// Check upstream services at every reference site
    Verify,
}

impl Target {
    /// Resolves the target, falling back to the site's radius when the
    /// caller gave none.
    fn resolve(&self) -> anyhow::Result<(Point, Option<f64>)> {
        if let Some(id) = &self.site {
            let site = sites::find_site(id).with_context(|| {
                format!("unknown site '{}', expected one of: {}", id, sites::all_site_ids().join(", "))
            })?;
            return Ok((site.point()?, Some(site.radius_km)));
        }

        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok((Point::new(self.id.as_str(), lat, lon)?, None)),
            _ => bail!("either --site or both --lat and --lon are required"),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let level = LogLevel::parse(&config.logging.level).unwrap_or(LogLevel::Info);
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.console_timestamps)
        .context("initialising logger")?;

    if let Commands::Sites = cli.command {
        let listing: Vec<_> = sites::SITE_REGISTRY
            .iter()
            .map(|s| serde_json::json!({
                "id": s.id,
                "name": s.name,
                "latitude": s.latitude,
                "longitude": s.longitude,
                "radius_km": s.radius_km,
            }))
            .collect();
        return print_json(&listing);
    }

    if let Commands::Verify = cli.command {
        let report = verify::verify_sources(&config)?;
        verify::print_summary(&report);
        return print_json(&report);
    }

    let service = AssessmentService::from_config(&config)?;
    logging::debug(DataSource::System, None, "assessment service ready");

    match cli.command {
        Commands::Health { target, radius } => {
            let (point, site_radius) = target.resolve()?;
            match radius.or(site_radius) {
                Some(radius_km) => print_json(&service.calculate_health_within(&point, radius_km)?),
                None => print_json(&service.calculate_health(&point)),
            }
        }
        Commands::Environment { target } => {
            let (point, _) = target.resolve()?;
            print_json(&service.get_environmental_reading(&point))
        }
        Commands::Species { target, radius } => {
            let (point, site_radius) = target.resolve()?;
            print_json(&service.get_species_summary(&point, radius.or(site_radius))?)
        }
        Commands::SpeciesList { target, radius, limit } => {
            let (point, site_radius) = target.resolve()?;
            print_json(&service.species_list(&point, radius.or(site_radius), limit)?)
        }
        Commands::Heatwave { target } => {
            let (point, _) = target.resolve()?;
            print_json(&service.classify_heatwave(&point))
        }
        Commands::Timeseries { target, days } => {
            let (point, _) = target.resolve()?;
            print_json(&service.sst_timeseries(&point, days))
        }
        Commands::Sites | Commands::Verify => Ok(()),
    }
}
