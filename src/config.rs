/// Service configuration loader - parses wreckognizer.toml
///
/// Separates file locations, weather API settings, feature-assembly shape and
/// input-validation bounds from code, so artifacts can be swapped or limits
/// tuned without recompiling. Every section is optional; anything left out
/// falls back to the values the shipped model was built with.

use chrono::NaiveDate;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::tracker::RateLimits;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_ENV_VAR: &str = "WRECKOGNIZER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "wreckognizer.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataPaths,
    pub weather: WeatherSettings,
    pub features: FeatureSettings,
    pub validation: ValidationSettings,
    pub rate_limits: RateLimits,
}

/// Reference tables and pre-fitted artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub stations_csv: PathBuf,
    pub volumes_csv: PathBuf,
    pub preprocessor: PathBuf,
    pub model: PathBuf,
    /// Where the file-backed rate tracker keeps its counters. When unset the
    /// tracker lives in memory only.
    pub tracker_file: Option<PathBuf>,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            stations_csv: PathBuf::from("data/inference/locations.csv"),
            volumes_csv: PathBuf::from("data/inference/average_volume.csv"),
            preprocessor: PathBuf::from("data/inference/preprocessor.json"),
            model: PathBuf::from("data/models/severity_model.json"),
            tracker_file: Some(PathBuf::from("data/api/request_tracker.json")),
        }
    }
}

/// Open-Meteo request settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub archive_url: String,
    pub forecast_url: String,
    /// Fixed reference point the weather is fetched for (city centre).
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub temperature_unit: String,
    pub windspeed_unit: String,
    pub precipitation_unit: String,
    /// Targets older than this many days go to the archive endpoint; the
    /// archive lags behind real time by several days.
    pub archive_lag_days: i64,
    /// Days before the target date included in the request window.
    pub lookback_days: i64,
    /// Forward hour offsets merged onto each row.
    pub periods: usize,
    pub timeout_secs: u64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            latitude: 47.36667,
            longitude: 8.55,
            timezone: "Europe/Berlin".to_string(),
            temperature_unit: "celsius".to_string(),
            windspeed_unit: "kmh".to_string(),
            precipitation_unit: "mm".to_string(),
            archive_lag_days: 6,
            lookback_days: 1,
            periods: 4,
            timeout_secs: 30,
        }
    }
}

/// Shape of the volume features and the station draw.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Station slots per volume period.
    pub stations: usize,
    pub volume_periods: usize,
    /// Candidate pool size per requested prediction in the station draw.
    pub candidate_factor: usize,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            stations: 3,
            volume_periods: 2,
            candidate_factor: 5,
        }
    }
}

/// WGS84 rectangle predictions are accepted for.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min_lat: 47.3568,
            max_lat: 47.3988,
            min_lon: 8.4655,
            max_lon: 8.6155,
        }
    }
}

/// Caller-input limits checked before the pipeline runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub bounds: BoundingBox,
    pub earliest_date: NaiveDate,
    pub max_days_ahead: i64,
    pub max_predictions: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::default(),
            earliest_date: NaiveDate::from_ymd_opt(2012, 1, 1).unwrap_or_default(),
            max_days_ahead: 30,
            max_predictions: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses configuration from a TOML string.
pub fn parse_config(contents: &str, origin: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })
}

/// Loads configuration from an explicit file. The file must exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(&contents, &path.display().to_string())
}

/// Loads configuration from `$WRECKOGNIZER_CONFIG` or `wreckognizer.toml`.
///
/// An explicitly configured file must exist. When the default file is absent
/// the built-in defaults are used.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        return load_config_from(Path::new(&path));
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if !default_path.exists() {
        log::info!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
        return Ok(AppConfig::default());
    }

    load_config_from(default_path)
}
