/// Thermal-stress alerting.
///
/// - `heatwave` — marine heatwave category, impact and guidance for a point.

pub mod heatwave;
