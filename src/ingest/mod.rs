/// External data sources.
///
/// - `open_meteo`: hourly weather from the Open-Meteo archive and forecast APIs
/// - `fixtures` (test only): representative API response payloads

pub mod open_meteo;

#[cfg(test)]
pub(crate) mod fixtures;
