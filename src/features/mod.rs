/// Feature-row assembly for the severity model.
///
/// Submodules:
/// - `volume`: average traffic/pedestrian counts joined per hour offset.
/// - `weather`: hourly weather joined per hour offset.
///
/// `FeatureLayout` names the numeric columns the model was trained with, in
/// training order. The transformer artifact is the authority on the schema;
/// the layout is what the assembly steps produce and what new artifacts are
/// built against.

pub mod volume;
pub mod weather;

use crate::model::{
    pedestrian_column, traffic_column, weather_column, AccidentQuery, FeatureRow,
    CATEGORICAL_COLUMNS, WEATHER_VARIABLES,
};
use crate::stations::Station;

/// Dimensions of the numeric feature block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLayout {
    pub stations: usize,
    pub volume_periods: usize,
    pub weather_periods: usize,
}

impl Default for FeatureLayout {
    fn default() -> Self {
        Self {
            stations: 3,
            volume_periods: 2,
            weather_periods: 4,
        }
    }
}

impl FeatureLayout {
    /// Traffic columns (period-major), then pedestrian columns, then weather
    /// columns grouped by period.
    pub fn numeric_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();

        for p in 0..self.volume_periods {
            for s in 0..self.stations {
                columns.push(traffic_column(s, p));
            }
        }
        for p in 0..self.volume_periods {
            for s in 0..self.stations {
                columns.push(pedestrian_column(s, p));
            }
        }
        for p in 0..self.weather_periods {
            for variable in WEATHER_VARIABLES {
                columns.push(weather_column(variable, p));
            }
        }

        columns
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}

/// One row per attributed station, seeded with the query's attributes and
/// that station's road type.
pub fn rows_for_stations(query: &AccidentQuery, stations: &[&Station]) -> Vec<FeatureRow> {
    stations
        .iter()
        .map(|s| FeatureRow::from_query(query, &s.road_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::AccidentType;
    use crate::model::GeoPoint;
    use chrono::NaiveDate;

    #[test]
    fn test_default_layout_matches_trained_schema() {
        let columns = FeatureLayout::default().numeric_columns();
        assert_eq!(columns.len(), 3 * 2 * 2 + 6 * 4);
        assert_eq!(columns[0], "traffic_volume_0_period_0");
        assert_eq!(columns[3], "traffic_volume_0_period_1");
        assert_eq!(columns[6], "pedestrian_volume_0_period_0");
        assert_eq!(columns[12], "temperature_2m_period_0");
        assert_eq!(columns[35], "cloud_cover_period_3");
    }

    #[test]
    fn test_rows_for_stations_take_each_road_type() {
        let query = AccidentQuery::new(
            GeoPoint::new(8.54, 47.37),
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap(),
            17,
            AccidentType::RearEndCollision,
        )
        .unwrap();
        let a = Station {
            planar_x: 0.0,
            planar_y: 0.0,
            location: GeoPoint::new(8.54, 47.37),
            road_type: "rt432".to_string(),
        };
        let b = Station { road_type: "rt433".to_string(), ..a.clone() };

        let rows = rows_for_stations(&query, &[&a, &b]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].categorical("RoadType"), Some("rt432"));
        assert_eq!(rows[1].categorical("RoadType"), Some("rt433"));
    }
}
