/// Reference marine protected areas.
///
/// A small fixed set of well-known MPAs spread across the latitude bands
/// the estimators distinguish (tropical, subtropical, temperate, polar).
/// The CLI accepts these ids with `--site`, and the verification checks
/// query upstream services at their centroids.

use crate::model::{AssessmentError, Point};

// ---------------------------------------------------------------------------
// Site metadata
// ---------------------------------------------------------------------------

/// Metadata for a single reference site.
#[derive(Debug)]
pub struct Site {
    /// Stable kebab-case identifier, also used as the cache point id.
    pub id: &'static str,
    /// Official designation.
    pub name: &'static str,
    /// WGS84 latitude of a representative interior point.
    pub latitude: f64,
    /// WGS84 longitude of a representative interior point.
    pub longitude: f64,
    /// Typical species search radius for the site's extent, in km.
    pub radius_km: f64,
}

impl Site {
    pub fn point(&self) -> Result<Point, AssessmentError> {
        Point::new(self.id, self.latitude, self.longitude)
    }
}

/// Reference sites, ordered from the equator poleward.
///
/// Sources:
///   - Designations and extents: Protected Planet (protectedplanet.net)
pub static SITE_REGISTRY: &[Site] = &[
    Site {
        id: "galapagos",
        name: "Galápagos Marine Reserve",
        latitude: -0.8293,
        longitude: -90.9821,
        radius_km: 200.0,
    },
    Site {
        id: "raja-ampat",
        name: "Raja Ampat Marine Protected Area Network",
        latitude: -0.5000,
        longitude: 130.5000,
        radius_km: 100.0,
    },
    Site {
        id: "great-barrier-reef",
        name: "Great Barrier Reef Marine Park",
        latitude: -18.2861,
        longitude: 147.7000,
        radius_km: 150.0,
    },
    Site {
        id: "papahanaumokuakea",
        name: "Papahānaumokuākea Marine National Monument",
        latitude: 25.7000,
        longitude: -171.7333,
        radius_km: 250.0,
    },
    Site {
        id: "medes-islands",
        name: "Montgrí, Medes Islands and Baix Ter Natural Park",
        latitude: 42.0475,
        longitude: 3.2253,
        radius_km: 10.0,
    },
    Site {
        id: "ross-sea",
        name: "Ross Sea Region Marine Protected Area",
        latitude: -76.0000,
        longitude: 176.0000,
        radius_km: 500.0,
    },
];

/// Returns the ids of all reference sites.
pub fn all_site_ids() -> Vec<&'static str> {
    SITE_REGISTRY.iter().map(|s| s.id).collect()
}

/// Looks up a site by id (case-insensitive). Returns `None` if not found.
pub fn find_site(id: &str) -> Option<&'static Site> {
    SITE_REGISTRY.iter().find(|s| s.id.eq_ignore_ascii_case(id.trim()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::diversity::LatitudeBand;
    use crate::model::validate_radius;

    #[test]
    fn test_all_sites_produce_valid_points() {
        for site in SITE_REGISTRY {
            let point = site.point();
            assert!(point.is_ok(), "site {} has invalid coordinates: {:?}", site.id, point);
            assert!(validate_radius(site.radius_km).is_ok(), "site {} radius out of range", site.id);
        }
    }

    #[test]
    fn test_site_ids_are_unique_kebab_case() {
        let ids = all_site_ids();
        for (i, id) in ids.iter().enumerate() {
            assert!(
                id.chars().all(|c| c.is_ascii_lowercase() || c == '-'),
                "site id {} must be lowercase kebab-case",
                id
            );
            assert!(!ids[i + 1..].contains(id), "duplicate site id {}", id);
        }
    }

    #[test]
    fn test_registry_covers_every_latitude_band() {
        for band in [
            LatitudeBand::Tropical,
            LatitudeBand::Subtropical,
            LatitudeBand::Temperate,
            LatitudeBand::Polar,
        ] {
            assert!(
                SITE_REGISTRY.iter().any(|s| LatitudeBand::of(s.latitude) == band),
                "no reference site in band {:?}",
                band
            );
        }
    }

    #[test]
    fn test_find_site() {
        let gbr = find_site("Great-Barrier-Reef").expect("lookup should ignore case");
        assert_eq!(gbr.name, "Great Barrier Reef Marine Park");
        assert!(find_site("atlantis").is_none());
    }
}
