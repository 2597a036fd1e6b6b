/// Pure computations behind the assessments.
///
/// Nothing in this module performs I/O or reads the clock; callers pass
/// day-of-year and dates explicitly.
///
/// Submodules:
/// - `climatology` — latitude/season estimates of SST, chlorophyll, oxygen, pH, salinity.
/// - `diversity` — Shannon index, IUCN threat counting, species fallback estimate.
/// - `scoring` — component scores, weighted overall score, confidence.

pub mod climatology;
pub mod diversity;
pub mod scoring;
