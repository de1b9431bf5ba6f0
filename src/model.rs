/// Shared data types for the prediction pipeline.
///
/// `AccidentQuery` is what a caller asks about, `FeatureRow` is what the
/// pipeline assembles from it, and `PredictionReport` is what comes back.
/// `PipelineError` is the single error type every pipeline stage returns.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::labels::{self, AccidentType};
use crate::projection::ProjectionError;
use crate::tracker::RateWindow;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Hourly weather variables requested from Open-Meteo, in feature order.
pub const WEATHER_VARIABLES: [&str; 6] = [
    "temperature_2m",
    "precipitation",
    "snowfall",
    "snow_depth",
    "surface_pressure",
    "cloud_cover",
];

pub const COL_ACCIDENT_TYPE: &str = "AccidentType";
pub const COL_PEDESTRIAN: &str = "AccidentInvolvingPedestrian";
pub const COL_BICYCLE: &str = "AccidentInvolvingBicycle";
pub const COL_MOTORCYCLE: &str = "AccidentInvolvingMotorcycle";
pub const COL_ROAD_TYPE: &str = "RoadType";
pub const COL_MONTH: &str = "month";
pub const COL_WEEKDAY: &str = "weekday";
pub const COL_HOUR: &str = "hour";

/// Categorical columns in the order the preprocessor was fitted with.
pub const CATEGORICAL_COLUMNS: [&str; 8] = [
    COL_ACCIDENT_TYPE,
    COL_PEDESTRIAN,
    COL_BICYCLE,
    COL_MOTORCYCLE,
    COL_ROAD_TYPE,
    COL_MONTH,
    COL_WEEKDAY,
    COL_HOUR,
];

pub fn traffic_column(station: usize, period: usize) -> String {
    format!("traffic_volume_{}_period_{}", station, period)
}

pub fn pedestrian_column(station: usize, period: usize) -> String {
    format!("pedestrian_volume_{}_period_{}", station, period)
}

pub fn weather_column(variable: &str, period: usize) -> String {
    format!("{}_period_{}", variable, period)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Weather service answered with something unusable (non-2xx, bad JSON).
    #[error("Weather service error: {0}")]
    Upstream(String),

    /// Transport-level HTTP failure, including timeouts.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The rate tracker refused the weather request.
    #[error("Open-Meteo API {window} limit reached")]
    RateLimited { window: RateWindow },

    /// Feature columns do not line up with the frozen schema.
    #[error("Schema mismatch: {0}")]
    Schema(String),

    /// Caller-supplied query failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reference data is malformed.
    #[error("Data error: {0}")]
    Data(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A hypothetical accident to predict severity for.
///
/// Timestamps are always on the hour: weather observations are hourly and
/// are joined on exact timestamp equality.
#[derive(Debug, Clone, PartialEq)]
pub struct AccidentQuery {
    pub location: GeoPoint,
    pub timestamp: NaiveDateTime,
    pub accident_type: AccidentType,
    pub involves_pedestrian: bool,
    pub involves_bicycle: bool,
    pub involves_motorcycle: bool,
}

impl AccidentQuery {
    /// Builds a query for `date` at `hour:00`. Fails if `hour` is not 0-23.
    pub fn new(
        location: GeoPoint,
        date: NaiveDate,
        hour: u32,
        accident_type: AccidentType,
    ) -> Result<Self, PipelineError> {
        let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| {
            PipelineError::InvalidInput(format!("hour must be between 0 and 23, got {}", hour))
        })?;

        Ok(Self {
            location,
            timestamp: date.and_time(time),
            accident_type,
            involves_pedestrian: false,
            involves_bicycle: false,
            involves_motorcycle: false,
        })
    }

    pub fn with_involvements(mut self, pedestrian: bool, bicycle: bool, motorcycle: bool) -> Self {
        self.involves_pedestrian = pedestrian;
        self.involves_bicycle = bicycle;
        self.involves_motorcycle = motorcycle;
        self
    }

    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }

    /// ISO weekday, Monday = 1 .. Sunday = 7.
    pub fn weekday(&self) -> u32 {
        self.timestamp.weekday().number_from_monday()
    }

    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

/// One hourly observation (or forecast value) from Open-Meteo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherObservation {
    pub timestamp: NaiveDateTime,
    pub temperature_2m: Option<f64>,
    pub precipitation: Option<f64>,
    pub snowfall: Option<f64>,
    pub snow_depth: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub cloud_cover: Option<f64>,
}

impl WeatherObservation {
    /// Values in `WEATHER_VARIABLES` order.
    pub fn values(&self) -> [Option<f64>; 6] {
        [
            self.temperature_2m,
            self.precipitation,
            self.snowfall,
            self.snow_depth,
            self.surface_pressure,
            self.cloud_cover,
        ]
    }
}

// ---------------------------------------------------------------------------
// Feature rows
// ---------------------------------------------------------------------------

/// One instance's worth of features, keyed by column name.
///
/// Column order is not tracked here; the transformer imposes the order frozen
/// in its artifact. The calendar fields are kept typed alongside their
/// categorical columns because the volume join needs them as numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    pub month: u32,
    pub weekday: u32,
    pub hour: u32,
    categorical: BTreeMap<String, String>,
    numeric: BTreeMap<String, Option<f64>>,
}

impl FeatureRow {
    /// Seeds a row with the query's categorical attributes and the resolved
    /// road type.
    pub fn from_query(query: &AccidentQuery, road_type: &str) -> Self {
        let mut row = Self {
            timestamp: query.timestamp,
            month: query.month(),
            weekday: query.weekday(),
            hour: query.hour(),
            categorical: BTreeMap::new(),
            numeric: BTreeMap::new(),
        };

        row.set_categorical(COL_ACCIDENT_TYPE, query.accident_type.description());
        row.set_categorical(COL_PEDESTRIAN, flag(query.involves_pedestrian));
        row.set_categorical(COL_BICYCLE, flag(query.involves_bicycle));
        row.set_categorical(COL_MOTORCYCLE, flag(query.involves_motorcycle));
        row.set_categorical(COL_ROAD_TYPE, road_type);
        row.set_categorical(COL_MONTH, row.month.to_string());
        row.set_categorical(COL_WEEKDAY, row.weekday.to_string());
        row.set_categorical(COL_HOUR, row.hour.to_string());
        row
    }

    pub fn set_categorical(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.categorical.insert(name.into(), value.into());
    }

    pub fn set_numeric(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.numeric.insert(name.into(), value);
    }

    pub fn categorical(&self, name: &str) -> Option<&str> {
        self.categorical.get(name).map(String::as_str)
    }

    /// `None` when the column is absent; `Some(None)` when present but missing.
    pub fn numeric(&self, name: &str) -> Option<Option<f64>> {
        self.numeric.get(name).copied()
    }

    /// Removes a column of either kind. Returns whether it existed.
    pub fn remove_column(&mut self, name: &str) -> bool {
        self.categorical.remove(name).is_some() | self.numeric.remove(name).is_some()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.categorical.contains_key(name) || self.numeric.contains_key(name)
    }

    /// All column names, numeric first, each group sorted.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .keys()
            .chain(self.categorical.keys())
            .map(String::as_str)
    }

    pub fn column_count(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Severe => "severe",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Minor => "Minor",
            Severity::Severe => "Severe",
        }
    }
}

/// Prediction for one instance, with the station location it was attributed to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub severity: Severity,
    pub location: GeoPoint,
    pub road_type: String,
    pub road_type_description: String,
}

impl PredictionResult {
    pub fn new(severity: Severity, location: GeoPoint, road_type: &str) -> Self {
        Self {
            severity,
            location,
            road_type: road_type.to_string(),
            road_type_description: labels::road_type_description(road_type).to_string(),
        }
    }
}

/// Everything a caller needs to render one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub timestamp: NaiveDateTime,
    pub predictions: Vec<PredictionResult>,
    /// Period-0 weather values that went into the features, by variable.
    pub weather: BTreeMap<String, Option<f64>>,
}

impl PredictionReport {
    pub fn severe_count(&self) -> usize {
        self.predictions
            .iter()
            .filter(|p| p.severity == Severity::Severe)
            .count()
    }

    pub fn minor_count(&self) -> usize {
        self.predictions.len() - self.severe_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> AccidentQuery {
        AccidentQuery::new(
            GeoPoint::new(8.54, 47.37),
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap(),
            17,
            AccidentType::RearEndCollision,
        )
        .unwrap()
    }

    #[test]
    fn test_query_calendar_attributes() {
        let q = query();
        assert_eq!(q.month(), 6);
        assert_eq!(q.weekday(), 4, "2023-06-15 is a Thursday");
        assert_eq!(q.hour(), 17);
    }

    #[test]
    fn test_query_rejects_hour_out_of_range() {
        let result = AccidentQuery::new(
            GeoPoint::new(8.54, 47.37),
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap(),
            24,
            AccidentType::Other,
        );
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_feature_row_from_query_sets_categoricals() {
        let q = query().with_involvements(true, false, true);
        let row = FeatureRow::from_query(&q, "rt433");

        assert_eq!(row.categorical(COL_ACCIDENT_TYPE), Some("Accident with rear-end collision"));
        assert_eq!(row.categorical(COL_PEDESTRIAN), Some("1"));
        assert_eq!(row.categorical(COL_BICYCLE), Some("0"));
        assert_eq!(row.categorical(COL_MOTORCYCLE), Some("1"));
        assert_eq!(row.categorical(COL_ROAD_TYPE), Some("rt433"));
        assert_eq!(row.categorical(COL_WEEKDAY), Some("4"));
        assert_eq!(row.column_count(), CATEGORICAL_COLUMNS.len());
    }

    #[test]
    fn test_numeric_distinguishes_absent_from_missing() {
        let mut row = FeatureRow::from_query(&query(), "rt432");
        row.set_numeric("x", None);
        assert_eq!(row.numeric("x"), Some(None));
        assert_eq!(row.numeric("y"), None);
        assert!(row.remove_column("x"));
        assert!(!row.has_column("x"));
    }

    #[test]
    fn test_report_counts() {
        let p = |s| PredictionResult::new(s, GeoPoint::new(8.5, 47.37), "rt432");
        let report = PredictionReport {
            timestamp: query().timestamp,
            predictions: vec![p(Severity::Severe), p(Severity::Minor), p(Severity::Minor)],
            weather: BTreeMap::new(),
        };
        assert_eq!(report.severe_count(), 1);
        assert_eq!(report.minor_count(), 2);
        assert_eq!(report.predictions[0].road_type_description, "Principal road");
    }
}
