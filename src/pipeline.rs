/// Prediction pipeline.
///
/// A request runs synchronously through:
/// 1. Input validation (area, date range, prediction count)
/// 2. Nearest-station draw, one station per requested prediction
/// 3. Feature rows seeded from the query and each station's road type
/// 4. Historical average volumes for the accident hour and the next
/// 5. Weather fetch and merge for the accident hour and the next three
/// 6. Frozen transformation into the model's feature space
/// 7. Severity labels, paired with the station each row was attributed to
///
/// Any failing step aborts the request. Nothing is retried and no partial
/// results are returned.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use rand::Rng;
use std::sync::Arc;

use crate::classifier::{LinearSeverityModel, SeverityModel};
use crate::config::{AppConfig, ValidationSettings};
use crate::features::volume::{assign_average_volume, VolumeTable};
use crate::features::weather::{assign_weather, period_zero_summary};
use crate::features::{rows_for_stations, FeatureLayout};
use crate::ingest::open_meteo::{OpenMeteoClient, WeatherSource};
use crate::model::{AccidentQuery, GeoPoint, PipelineError, PredictionReport, PredictionResult};
use crate::stations::StationTable;
use crate::tracker::{FileRateTracker, InMemoryRateTracker, RateTracker};
use crate::transform::Preprocessor;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub layout: FeatureLayout,
    /// Candidate pool size per requested prediction in the station draw.
    pub candidate_factor: usize,
    pub validation: ValidationSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            layout: FeatureLayout::default(),
            candidate_factor: 5,
            validation: ValidationSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            layout: FeatureLayout {
                stations: config.features.stations,
                volume_periods: config.features.volume_periods,
                weather_periods: config.weather.periods,
            },
            candidate_factor: config.features.candidate_factor,
            validation: config.validation.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// Loaded reference data, artifacts and the weather source. Everything is
/// read-only after construction, so one predictor can serve many requests.
pub struct Predictor {
    stations: Arc<StationTable>,
    volumes: Arc<VolumeTable>,
    preprocessor: Arc<Preprocessor>,
    model: Arc<dyn SeverityModel>,
    weather: Arc<dyn WeatherSource>,
    settings: PipelineSettings,
}

impl Predictor {
    pub fn new(
        stations: Arc<StationTable>,
        volumes: Arc<VolumeTable>,
        preprocessor: Arc<Preprocessor>,
        model: Arc<dyn SeverityModel>,
        weather: Arc<dyn WeatherSource>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            stations,
            volumes,
            preprocessor,
            model,
            weather,
            settings,
        }
    }

    /// Loads every table and artifact named in `config` and wires up the
    /// Open-Meteo client with its rate tracker.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let stations = StationTable::load(&config.data.stations_csv)?;
        let volumes = VolumeTable::load(&config.data.volumes_csv)?;
        let preprocessor = Preprocessor::load(&config.data.preprocessor)?;
        let model = LinearSeverityModel::load(&config.data.model)?;

        let tracker: Arc<dyn RateTracker> = match &config.data.tracker_file {
            Some(path) => {
                log::info!("Tracking Open-Meteo requests in {}", path.display());
                Arc::new(FileRateTracker::new(path, config.rate_limits))
            }
            None => Arc::new(InMemoryRateTracker::new(config.rate_limits)),
        };
        let weather = OpenMeteoClient::new(config.weather.clone(), tracker)?;

        Ok(Self::new(
            Arc::new(stations),
            Arc::new(volumes),
            Arc::new(preprocessor),
            Arc::new(model),
            Arc::new(weather),
            PipelineSettings::from_config(config),
        ))
    }

    /// Checks caller input against the supported area, date range and count.
    pub fn validate(&self, query: &AccidentQuery, count: usize, today: NaiveDate) -> Result<(), PipelineError> {
        let limits = &self.settings.validation;
        let GeoPoint { lon, lat } = query.location;

        if !lon.is_finite() || !lat.is_finite() || !limits.bounds.contains(lon, lat) {
            return Err(PipelineError::InvalidInput(format!(
                "location ({}, {}) is outside the supported area (lat {}..{}, lon {}..{})",
                lat,
                lon,
                limits.bounds.min_lat,
                limits.bounds.max_lat,
                limits.bounds.min_lon,
                limits.bounds.max_lon
            )));
        }

        let date = query.timestamp.date();
        if date < limits.earliest_date {
            return Err(PipelineError::InvalidInput(format!(
                "date {} is before {}",
                date, limits.earliest_date
            )));
        }
        let latest = today + Duration::days(limits.max_days_ahead);
        if date > latest {
            return Err(PipelineError::InvalidInput(format!(
                "date {} is more than {} days ahead (latest {})",
                date, limits.max_days_ahead, latest
            )));
        }

        if count == 0 || count > limits.max_predictions {
            return Err(PipelineError::InvalidInput(format!(
                "count must be between 1 and {}, got {}",
                limits.max_predictions, count
            )));
        }

        Ok(())
    }

    /// Runs the pipeline with the thread RNG and the local clock.
    pub fn predict(&self, query: &AccidentQuery, count: usize) -> Result<PredictionReport, PipelineError> {
        let now = Local::now().naive_local();
        self.predict_with(query, count, &mut rand::thread_rng(), now)
    }

    /// Runs the pipeline with an explicit RNG for the station draw and an
    /// explicit clock for validation, endpoint selection and rate accounting.
    pub fn predict_with<R: Rng + ?Sized>(
        &self,
        query: &AccidentQuery,
        count: usize,
        rng: &mut R,
        now: NaiveDateTime,
    ) -> Result<PredictionReport, PipelineError> {
        self.validate(query, count, now.date())?;

        let layout = self.settings.layout;
        let stations = self
            .stations
            .resolve(query.location, count, self.settings.candidate_factor, rng);
        if stations.is_empty() {
            return Err(PipelineError::Data("no reference stations loaded".to_string()));
        }
        if stations.len() < count {
            log::debug!("Station pool holds {} of {} requested", stations.len(), count);
        }

        let mut rows = rows_for_stations(query, &stations);
        log::debug!("Built {} feature rows", rows.len());

        assign_average_volume(&mut rows, &self.volumes, layout.stations, layout.volume_periods);

        let observations = self.weather.fetch(query.timestamp, now)?;
        assign_weather(&mut rows, &observations, layout.weather_periods);
        let weather = period_zero_summary(&rows[0]);
        log::debug!("Merged {} weather observations", observations.len());

        let batch = self.preprocessor.transform(&rows)?;
        let labels = self.model.predict(&batch)?;
        if labels.len() != rows.len() {
            return Err(PipelineError::Schema(format!(
                "model returned {} labels for {} rows",
                labels.len(),
                rows.len()
            )));
        }

        let predictions = labels
            .into_iter()
            .zip(&stations)
            .map(|(severity, station)| PredictionResult::new(severity, station.location, &station.road_type))
            .collect();

        Ok(PredictionReport {
            timestamp: query.timestamp,
            predictions,
            weather,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
