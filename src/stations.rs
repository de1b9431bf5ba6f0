/// Reference station table and nearest-station attribution.
///
/// The table is loaded once from `locations.csv` (columns `x`, `y`, `lon`,
/// `lat`, `RoadType`) and only read afterwards. `x`/`y` are LV95 planar
/// coordinates; when `lon`/`lat` are left empty they are derived from them.
///
/// Attribution does not pick the single nearest station. It takes the
/// `factor * n` nearest rows as a candidate pool and draws `n` of them at
/// random without replacement, so repeated predictions at one point are
/// attributed to a spread of plausible nearby road segments.

use rand::Rng;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::model::{GeoPoint, PipelineError};
use crate::projection;

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// One labelled reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// LV95 easting.
    pub planar_x: f64,
    /// LV95 northing.
    pub planar_y: f64,
    /// WGS84 location.
    pub location: GeoPoint,
    /// Road type code, e.g. `rt433`.
    pub road_type: String,
}

#[derive(Debug, Deserialize)]
struct StationRecord {
    x: f64,
    y: f64,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(rename = "RoadType")]
    road_type: String,
}

impl StationRecord {
    fn into_station(self) -> Result<Station, PipelineError> {
        let location = match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => GeoPoint::new(lon, lat),
            _ => {
                let (lon, lat) = projection::lv95_to_wgs84(self.x, self.y)?;
                GeoPoint::new(lon, lat)
            }
        };

        if self.road_type.trim().is_empty() {
            return Err(PipelineError::Data(format!(
                "station at ({}, {}) has no road type",
                self.x, self.y
            )));
        }

        Ok(Station {
            planar_x: self.x,
            planar_y: self.y,
            location,
            road_type: self.road_type.trim().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StationTable {
    stations: Vec<Station>,
}

impl StationTable {
    pub fn from_stations(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// Parses the CSV layout described in the module docs.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut stations = Vec::new();

        for record in csv_reader.deserialize::<StationRecord>() {
            stations.push(record?.into_station()?);
        }

        Ok(Self { stations })
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let table = Self::from_reader(File::open(path)?)?;
        log::info!("Loaded {} reference stations from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// The `k` stations closest to `point` by squared (lon, lat) distance,
    /// nearest first. Ties keep table order.
    ///
    /// Plain Euclidean distance on degrees is fine here: the table covers a
    /// few kilometres of one city.
    pub fn nearest(&self, point: GeoPoint, k: usize) -> Vec<&Station> {
        let mut ranked: Vec<(f64, &Station)> = self
            .stations
            .iter()
            .map(|s| (squared_distance(point, s.location), s))
            .collect();

        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.into_iter().take(k).map(|(_, s)| s).collect()
    }

    /// Draws `n` distinct stations uniformly from the `factor * n` nearest.
    ///
    /// When the pool is smaller than `n` the draw is clamped to the pool
    /// size, so callers may get fewer stations than requested (none for an
    /// empty table).
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        point: GeoPoint,
        n: usize,
        factor: usize,
        rng: &mut R,
    ) -> Vec<&Station> {
        let pool = self.nearest(point, n.saturating_mul(factor.max(1)));
        let n = n.min(pool.len());

        rand::seq::index::sample(rng, pool.len(), n)
            .into_iter()
            .map(|i| pool[i])
            .collect()
    }
}

pub fn squared_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    (a.lon - b.lon).powi(2) + (a.lat - b.lat).powi(2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
