/// Test fixtures: representative JSON payloads from the Open-Meteo API.
///
/// Truncated to a handful of hours around 2023-06-15 17:00 (local time).
/// Both the archive and the forecast endpoints answer with the same shape:
///
///   hourly_units { time, temperature_2m, ... }
///   hourly
///     .time[]             "YYYY-MM-DDTHH:MM" in the requested timezone
///     .temperature_2m[]   one array per requested variable, parallel to
///     .precipitation[]    `time`; individual values may be null
///     ...
///
/// Errors come back as `{"error": true, "reason": "..."}` with a 400 status.

/// Six hours, 16:00-21:00, with a null snow depth at 18:00.
#[cfg(test)]
pub(crate) fn fixture_hourly_json() -> &'static str {
    r#"{
      "latitude": 47.36667,
      "longitude": 8.55,
      "generationtime_ms": 0.41,
      "utc_offset_seconds": 7200,
      "timezone": "Europe/Berlin",
      "timezone_abbreviation": "CEST",
      "elevation": 411.0,
      "hourly_units": {
        "time": "iso8601",
        "temperature_2m": "°C",
        "precipitation": "mm",
        "snowfall": "cm",
        "snow_depth": "m",
        "surface_pressure": "hPa",
        "cloud_cover": "%"
      },
      "hourly": {
        "time": [
          "2023-06-15T16:00", "2023-06-15T17:00", "2023-06-15T18:00",
          "2023-06-15T19:00", "2023-06-15T20:00", "2023-06-15T21:00"
        ],
        "temperature_2m":   [24.1, 23.8, 22.9, 21.5, 19.8, 18.2],
        "precipitation":    [0.0, 0.0, 0.3, 1.2, 0.0, 0.0],
        "snowfall":         [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        "snow_depth":       [0.0, 0.0, null, 0.0, 0.0, 0.0],
        "surface_pressure": [967.2, 967.0, 966.8, 967.1, 967.5, 967.9],
        "cloud_cover":      [20, 35, 80, 100, 60, 15]
      }
    }"#
}

/// Same window with 17:00 listed twice; the first entry is authoritative.
#[cfg(test)]
pub(crate) fn fixture_duplicate_hour_json() -> &'static str {
    r#"{
      "hourly": {
        "time": ["2023-06-15T16:00", "2023-06-15T17:00", "2023-06-15T17:00"],
        "temperature_2m":   [24.1, 23.8, -40.0],
        "precipitation":    [0.0, 0.0, 0.0],
        "snowfall":         [0.0, 0.0, 0.0],
        "snow_depth":       [0.0, 0.0, 0.0],
        "surface_pressure": [967.2, 967.0, 967.0],
        "cloud_cover":      [20, 35, 35]
      }
    }"#
}

/// `cloud_cover` was not returned.
#[cfg(test)]
pub(crate) fn fixture_missing_variable_json() -> &'static str {
    r#"{
      "hourly": {
        "time": ["2023-06-15T17:00"],
        "temperature_2m":   [23.8],
        "precipitation":    [0.0],
        "snowfall":         [0.0],
        "snow_depth":       [0.0],
        "surface_pressure": [967.0]
      }
    }"#
}

/// `precipitation` is one entry short.
#[cfg(test)]
pub(crate) fn fixture_ragged_arrays_json() -> &'static str {
    r#"{
      "hourly": {
        "time": ["2023-06-15T17:00", "2023-06-15T18:00"],
        "temperature_2m":   [23.8, 22.9],
        "precipitation":    [0.0],
        "snowfall":         [0.0, 0.0],
        "snow_depth":       [0.0, 0.0],
        "surface_pressure": [967.0, 966.8],
        "cloud_cover":      [35, 80]
      }
    }"#
}

#[cfg(test)]
pub(crate) fn fixture_bad_time_json() -> &'static str {
    r#"{
      "hourly": {
        "time": ["15.06.2023 17:00"],
        "temperature_2m":   [23.8],
        "precipitation":    [0.0],
        "snowfall":         [0.0],
        "snow_depth":       [0.0],
        "surface_pressure": [967.0],
        "cloud_cover":      [35]
      }
    }"#
}

/// Error body returned for e.g. an archive request outside the data range.
#[cfg(test)]
pub(crate) fn fixture_error_json() -> &'static str {
    r#"{"error": true, "reason": "Parameter 'start_date' is out of allowed range from 1940-01-01 to 2023-06-09"}"#
}
