/// Historical average traffic and pedestrian volumes.
///
/// `average_volume.csv` holds one row per (month, weekday, hour) with the
/// average vehicle count (`traffic`) and pedestrian count (`pedestrian`)
/// across the city's counting stations. The model expects these averages for
/// the accident hour and the following hour(s), written once per station
/// slot.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::model::{pedestrian_column, traffic_column, FeatureRow, PipelineError};

/// Averages for one (month, weekday, hour) key. Either count may be absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeAverage {
    pub traffic: Option<f64>,
    pub pedestrian: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VolumeRecord {
    month: u32,
    weekday: u32,
    hour: u32,
    traffic: Option<f64>,
    pedestrian: Option<f64>,
}

/// Pre-aggregated averages keyed by (month, weekday, hour).
#[derive(Debug, Clone, Default)]
pub struct VolumeTable {
    averages: HashMap<(u32, u32, u32), VolumeAverage>,
}

impl VolumeTable {
    /// Parses `month,weekday,hour,traffic,pedestrian` rows. A key that
    /// appears twice is rejected.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut averages = HashMap::new();

        for record in csv_reader.deserialize::<VolumeRecord>() {
            let record = record?;
            let key = (record.month, record.weekday, record.hour);
            let average = VolumeAverage {
                traffic: record.traffic,
                pedestrian: record.pedestrian,
            };

            if averages.insert(key, average).is_some() {
                return Err(PipelineError::Data(format!(
                    "duplicate volume average for month {}, weekday {}, hour {}",
                    key.0, key.1, key.2
                )));
            }
        }

        Ok(Self { averages })
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let table = Self::from_reader(File::open(path)?)?;
        log::info!("Loaded {} volume averages from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn insert(&mut self, month: u32, weekday: u32, hour: u32, average: VolumeAverage) {
        self.averages.insert((month, weekday, hour), average);
    }

    pub fn len(&self) -> usize {
        self.averages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.averages.keys().copied()
    }

    pub fn lookup(&self, month: u32, weekday: u32, hour: u32) -> Option<VolumeAverage> {
        self.averages.get(&(month, weekday, hour)).copied()
    }

    /// Lookup for `hour + offset` wrapped to the same day. Month and weekday
    /// are not rolled forward past midnight.
    pub fn lookup_shifted(&self, month: u32, weekday: u32, hour: u32, offset: usize) -> Option<VolumeAverage> {
        let shifted = ((hour as usize + offset) % 24) as u32;
        self.lookup(month, weekday, shifted)
    }
}

/// Writes `traffic_volume_{s}_period_{p}` and `pedestrian_volume_{s}_period_{p}`
/// for every station slot `s < stations` and period `p < periods`.
///
/// Every station slot of a period gets the same city-wide average. Rows with
/// no matching key get missing values, which are left for the transformer's
/// imputation to handle.
pub fn assign_average_volume(rows: &mut [FeatureRow], table: &VolumeTable, stations: usize, periods: usize) {
    for row in rows.iter_mut() {
        for p in 0..periods {
            let matched = table.lookup_shifted(row.month, row.weekday, row.hour, p);
            if matched.is_none() {
                log::debug!(
                    "No volume average for month {}, weekday {}, hour {} (+{})",
                    row.month,
                    row.weekday,
                    row.hour,
                    p
                );
            }

            let traffic = matched.and_then(|m| m.traffic);
            let pedestrian = matched.and_then(|m| m.pedestrian);

            for s in 0..stations {
                row.set_numeric(traffic_column(s, p), traffic);
                row.set_numeric(pedestrian_column(s, p), pedestrian);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
