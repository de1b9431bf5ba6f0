/// Open-Meteo hourly weather client.
///
/// Fetches the six hourly variables the model uses for a fixed reference
/// point (Zurich city centre) over the accident day and the day before.
///
/// Endpoints:
///   archive  https://archive-api.open-meteo.com/v1/archive
///   forecast https://api.open-meteo.com/v1/forecast
///
/// The archive only reaches up to a few days before today, so targets older
/// than `archive_lag_days` use it and everything more recent (including the
/// future) goes to the forecast endpoint. See `fixtures.rs` for the response
/// shape.
///
/// Every outbound call is admitted by a `RateTracker` first. A denied call
/// never reaches the network.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::config::WeatherSettings;
use crate::model::{PipelineError, WeatherObservation, WEATHER_VARIABLES};
use crate::tracker::RateTracker;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

// ============================================================================
// Request
// ============================================================================

/// Which Open-Meteo service a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherEndpoint {
    Archive,
    Forecast,
}

impl fmt::Display for WeatherEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherEndpoint::Archive => f.write_str("archive"),
            WeatherEndpoint::Forecast => f.write_str("forecast"),
        }
    }
}

/// Archive when `target` is strictly earlier than `now - lag_days`.
pub fn select_endpoint(target: NaiveDateTime, now: NaiveDateTime, lag_days: i64) -> WeatherEndpoint {
    if target < now - Duration::days(lag_days) {
        WeatherEndpoint::Archive
    } else {
        WeatherEndpoint::Forecast
    }
}

/// Date window and endpoint for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRequest {
    pub endpoint: WeatherEndpoint,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl WeatherRequest {
    pub fn for_target(target: NaiveDateTime, now: NaiveDateTime, settings: &WeatherSettings) -> Self {
        let end_date = target.date();
        Self {
            endpoint: select_endpoint(target, now, settings.archive_lag_days),
            start_date: end_date - Duration::days(settings.lookback_days),
            end_date,
        }
    }

    /// Full request URL including the query string.
    pub fn url(&self, settings: &WeatherSettings) -> String {
        let base = match self.endpoint {
            WeatherEndpoint::Archive => &settings.archive_url,
            WeatherEndpoint::Forecast => &settings.forecast_url,
        };

        format!(
            "{}?latitude={}&longitude={}&start_date={}&end_date={}&hourly={}&timezone={}&temperature_unit={}&windspeed_unit={}&precipitation_unit={}",
            base,
            settings.latitude,
            settings.longitude,
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d"),
            WEATHER_VARIABLES.join(","),
            urlencoding::encode(&settings.timezone),
            urlencoding::encode(&settings.temperature_unit),
            urlencoding::encode(&settings.windspeed_unit),
            urlencoding::encode(&settings.precipitation_unit),
        )
    }
}

// ============================================================================
// Source trait
// ============================================================================

/// Anything that can produce hourly observations around a target time.
pub trait WeatherSource: Send + Sync {
    /// Observations covering at least `target` and the hours before it, back
    /// to the start of the previous day. `now` is the caller's clock, used for
    /// endpoint selection and rate accounting.
    fn fetch(&self, target: NaiveDateTime, now: NaiveDateTime) -> Result<Vec<WeatherObservation>, PipelineError>;
}

// ============================================================================
// HTTP client
// ============================================================================

pub struct OpenMeteoClient {
    http: reqwest::blocking::Client,
    settings: WeatherSettings,
    tracker: Arc<dyn RateTracker>,
}

impl OpenMeteoClient {
    pub fn new(settings: WeatherSettings, tracker: Arc<dyn RateTracker>) -> Result<Self, PipelineError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self { http, settings, tracker })
    }
}

impl WeatherSource for OpenMeteoClient {
    fn fetch(&self, target: NaiveDateTime, now: NaiveDateTime) -> Result<Vec<WeatherObservation>, PipelineError> {
        let request = WeatherRequest::for_target(target, now, &self.settings);

        if let Err(denied) = self.tracker.try_record(1, now) {
            log::warn!("Weather request for {} refused: {}", target, denied);
            return Err(denied.into());
        }

        let url = request.url(&self.settings);
        log::info!(
            "Fetching {} weather {}..{}",
            request.endpoint,
            request.start_date,
            request.end_date
        );
        log::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            let reason = serde_json::from_str::<HourlyResponse>(&body)
                .ok()
                .and_then(|r| r.reason)
                .unwrap_or(body);
            return Err(PipelineError::Upstream(format!(
                "Open-Meteo {} returned {}: {}",
                request.endpoint, status, reason
            )));
        }

        let observations = parse_hourly_response(&body)?;
        log::debug!("Received {} hourly observations", observations.len());
        Ok(observations)
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    hourly: Option<HourlyBlock>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Option<Vec<String>>,
    temperature_2m: Option<Vec<Option<f64>>>,
    precipitation: Option<Vec<Option<f64>>>,
    snowfall: Option<Vec<Option<f64>>>,
    snow_depth: Option<Vec<Option<f64>>>,
    surface_pressure: Option<Vec<Option<f64>>>,
    cloud_cover: Option<Vec<Option<f64>>>,
}

fn required<T>(field: Option<Vec<T>>, name: &str, len: usize) -> Result<Vec<T>, PipelineError> {
    let values = field.ok_or_else(|| PipelineError::Upstream(format!("hourly.{} missing from response", name)))?;
    if values.len() != len {
        return Err(PipelineError::Upstream(format!(
            "hourly.{} has {} values, expected {}",
            name,
            values.len(),
            len
        )));
    }
    Ok(values)
}

/// Parses an Open-Meteo body into observations in response order.
///
/// A missing `hourly` block, a missing variable array, arrays of different
/// lengths, or an unparsable timestamp are all upstream errors.
pub fn parse_hourly_response(json: &str) -> Result<Vec<WeatherObservation>, PipelineError> {
    let response: HourlyResponse = serde_json::from_str(json)
        .map_err(|e| PipelineError::Upstream(format!("malformed weather response: {}", e)))?;

    let hourly = response.hourly.ok_or_else(|| {
        PipelineError::Upstream(match response.reason {
            Some(reason) => reason,
            None => "response has no hourly block".to_string(),
        })
    })?;

    let time = hourly
        .time
        .ok_or_else(|| PipelineError::Upstream("hourly.time missing from response".to_string()))?;
    let n = time.len();

    let temperature = required(hourly.temperature_2m, "temperature_2m", n)?;
    let precipitation = required(hourly.precipitation, "precipitation", n)?;
    let snowfall = required(hourly.snowfall, "snowfall", n)?;
    let snow_depth = required(hourly.snow_depth, "snow_depth", n)?;
    let pressure = required(hourly.surface_pressure, "surface_pressure", n)?;
    let cloud_cover = required(hourly.cloud_cover, "cloud_cover", n)?;

    let mut observations = Vec::with_capacity(n);
    for (i, raw) in time.iter().enumerate() {
        let timestamp = NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
            .map_err(|e| PipelineError::Upstream(format!("bad timestamp {:?}: {}", raw, e)))?;

        observations.push(WeatherObservation {
            timestamp,
            temperature_2m: temperature[i],
            precipitation: precipitation[i],
            snowfall: snowfall[i],
            snow_depth: snow_depth[i],
            surface_pressure: pressure[i],
            cloud_cover: cloud_cover[i],
        });
    }

    Ok(observations)
}

// ============================================================================
// Tests
// ============================================================================
