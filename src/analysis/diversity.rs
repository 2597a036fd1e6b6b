//! Biodiversity statistics derived from species checklists.
//!
//! Also provides the latitude-banded estimate used when the occurrence
//! service cannot be reached.

use crate::analysis::climatology::round_to;
use crate::model::SpeciesSummary;

/// IUCN Red List categories counted as threatened (incl. near threatened).
pub const THREATENED_CATEGORIES: &[&str] = &["CR", "EN", "VU", "NT"];

/// Checklist entries considered for the diversity index.
pub const DIVERSITY_SAMPLE_LIMIT: usize = 100;

/// True if `category` is one of the IUCN threat codes.
pub fn is_threatened(category: Option<&str>) -> bool {
    category
        .map(|c| THREATENED_CATEGORIES.contains(&c.trim().to_ascii_uppercase().as_str()))
        .unwrap_or(false)
}

/// Shannon entropy H = −Σ pᵢ·ln(pᵢ) over per-species record counts, in nats,
/// rounded to two decimals.
///
/// Returns `None` for an empty list or when every count is zero. Zero
/// counts contribute nothing.
pub fn shannon_index(counts: &[u64]) -> Option<f64> {
    // Summed as floats: upstream record counts are unbounded.
    let total: f64 = counts.iter().map(|&c| c as f64).sum();
    if counts.is_empty() || total == 0.0 {
        return None;
    }

    let h = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum::<f64>();

    // -0.0 from a single species
    Some(round_to(h, 2).abs())
}

// ---------------------------------------------------------------------------
// Fallback estimate
// ---------------------------------------------------------------------------

/// Latitude band used by the species estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatitudeBand {
    Tropical,
    Subtropical,
    Temperate,
    Polar,
}

impl LatitudeBand {
    pub fn of(lat: f64) -> Self {
        let abs_lat = lat.abs();
        if abs_lat < 23.5 {
            LatitudeBand::Tropical
        } else if abs_lat < 35.0 {
            LatitudeBand::Subtropical
        } else if abs_lat < 60.0 {
            LatitudeBand::Temperate
        } else {
            LatitudeBand::Polar
        }
    }

    /// Base (species, observations) for the band.
    fn base_counts(&self) -> (f64, f64) {
        match self {
            LatitudeBand::Tropical => (800.0, 5000.0),
            LatitudeBand::Subtropical => (500.0, 3000.0),
            LatitudeBand::Temperate => (300.0, 2000.0),
            LatitudeBand::Polar => (150.0, 1000.0),
        }
    }
}

/// Reproducible variation in `[-0.20, 0.19]` derived from coordinates
/// rounded to two decimals, via 64-bit FNV-1a.
pub fn coordinate_variation(lat: f64, lon: f64) -> f64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let lat_centi = (lat * 100.0).round() as i64;
    let lon_centi = (lon * 100.0).round() as i64;

    let mut hash = FNV_OFFSET;
    for byte in lat_centi.to_le_bytes().iter().chain(lon_centi.to_le_bytes().iter()) {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    ((hash % 40) as f64 - 20.0) / 100.0
}

/// Species statistics estimated from latitude alone.
///
/// Endemic, threatened and recent counts are fixed fractions (5%, 8%, 15%)
/// of the base counts. With `jitter` the base counts and index shift by
/// `coordinate_variation`; without it the result depends only on the band.
pub fn estimate_species_summary(lat: f64, lon: f64, jitter: bool) -> SpeciesSummary {
    let (base_species, base_obs) = LatitudeBand::of(lat).base_counts();
    let variation = if jitter { coordinate_variation(lat, lon) } else { 0.0 };

    let total_species = (base_species * (1.0 + variation)).floor() as u64;
    let total_observations = (base_obs * (1.0 + variation)).floor() as u64;

    SpeciesSummary {
        total_species,
        total_observations,
        endemic_species: total_species * 5 / 100,
        threatened_species: total_species * 8 / 100,
        recent_observations: total_observations * 15 / 100,
        biodiversity_index: Some(round_to(3.5 + variation, 2)),
        live: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_species_has_zero_entropy() {
        assert_eq!(shannon_index(&[42]), Some(0.0));
        assert_eq!(shannon_index(&[1]), Some(0.0));
    }

    #[test]
    fn test_empty_checklist_has_no_index() {
        assert_eq!(shannon_index(&[]), None, "empty checklist must yield None, not 0");
    }

    #[test]
    fn test_all_zero_counts_have_no_index() {
        assert_eq!(shannon_index(&[0, 0, 0]), None);
    }

    #[test]
    fn test_even_distribution_is_ln_n() {
        let h = shannon_index(&[10, 10, 10, 10]).unwrap();
        assert_relative_eq!(h, round_to(4f64.ln(), 2));
    }

    #[test]
    fn test_uneven_distribution_is_lower_than_even() {
        let even = shannon_index(&[25, 25, 25, 25]).unwrap();
        let skewed = shannon_index(&[97, 1, 1, 1]).unwrap();
        assert!(skewed < even, "skewed {} should be below even {}", skewed, even);
    }

    #[test]
    fn test_zero_counts_are_ignored() {
        assert_eq!(shannon_index(&[5, 0, 5]), shannon_index(&[5, 5]));
    }

    #[test]
    fn test_huge_record_counts_do_not_overflow() {
        assert_eq!(shannon_index(&[u64::MAX, 5]), Some(0.0));
        let h = shannon_index(&[u64::MAX, u64::MAX]).expect("two species");
        assert_relative_eq!(h, 0.69, epsilon = 1e-9);
    }

    #[test]
    fn test_threat_categories() {
        for code in ["CR", "EN", "VU", "NT", "vu"] {
            assert!(is_threatened(Some(code)), "{} should count as threatened", code);
        }
        for code in ["LC", "DD", "EX", ""] {
            assert!(!is_threatened(Some(code)), "{} should not count", code);
        }
        assert!(!is_threatened(None));
    }

    #[test]
    fn test_band_ordering_of_estimates() {
        let tropical = estimate_species_summary(5.0, 0.0, false);
        let subtropical = estimate_species_summary(30.0, 0.0, false);
        let temperate = estimate_species_summary(-45.0, 0.0, false);
        let polar = estimate_species_summary(75.0, 0.0, false);
        assert!(tropical.total_species > subtropical.total_species);
        assert!(subtropical.total_species > temperate.total_species);
        assert!(temperate.total_species > polar.total_species);
        assert!(!tropical.live);
    }

    #[test]
    fn test_estimate_without_jitter_uses_fixed_ratios() {
        let est = estimate_species_summary(10.0, 120.0, false);
        assert_eq!(est.total_species, 800);
        assert_eq!(est.total_observations, 5000);
        assert_eq!(est.endemic_species, 40);
        assert_eq!(est.threatened_species, 64);
        assert_eq!(est.recent_observations, 750);
        assert_eq!(est.biodiversity_index, Some(3.5));
    }

    #[test]
    fn test_jitter_is_reproducible_and_bounded() {
        for (lat, lon) in [(0.0, 0.0), (-33.87, 151.21), (64.1, -21.9), (12.345, -98.765)] {
            let v = coordinate_variation(lat, lon);
            assert!((-0.20..=0.19).contains(&v), "variation {} out of range", v);
            assert_eq!(v, coordinate_variation(lat, lon));
            assert_eq!(
                estimate_species_summary(lat, lon, true),
                estimate_species_summary(lat, lon, true)
            );
        }
    }
}
