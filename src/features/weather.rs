/// Hourly weather joined onto feature rows at forward hour offsets.
///
/// For period `p` every observation is shifted `p` hours forward, so the
/// value observed at `t - p` lands on a row stamped `t`. Columns are written
/// as `{variable}_period_{p}`.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDateTime};

use crate::model::{weather_column, FeatureRow, WeatherObservation, WEATHER_VARIABLES};

/// Observations indexed by timestamp. When a timestamp repeats the first
/// observation is kept.
fn index_by_timestamp(observations: &[WeatherObservation]) -> HashMap<NaiveDateTime, &WeatherObservation> {
    let mut index = HashMap::with_capacity(observations.len());
    for obs in observations {
        index.entry(obs.timestamp).or_insert(obs);
    }
    index
}

/// Writes all `WEATHER_VARIABLES` for periods `0..periods` onto every row.
///
/// A row whose `timestamp - p` has no observation gets missing values for
/// that period.
pub fn assign_weather(rows: &mut [FeatureRow], observations: &[WeatherObservation], periods: usize) {
    let index = index_by_timestamp(observations);

    for row in rows.iter_mut() {
        for p in 0..periods {
            let target = row.timestamp - Duration::hours(p as i64);
            let values = match index.get(&target) {
                Some(obs) => obs.values(),
                None => {
                    log::debug!("No weather observation at {} (period {})", target, p);
                    [None; 6]
                }
            };

            for (variable, value) in WEATHER_VARIABLES.iter().zip(values) {
                row.set_numeric(weather_column(variable, p), value);
            }
        }
    }
}

/// Period-0 values of a row, keyed by variable name. Used for the weather
/// summary shown next to predictions.
pub fn period_zero_summary(row: &FeatureRow) -> BTreeMap<String, Option<f64>> {
    WEATHER_VARIABLES
        .iter()
        .map(|v| (v.to_string(), row.numeric(&weather_column(v, 0)).flatten()))
        .collect()
}
