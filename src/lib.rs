/// wreckognizer: accident severity prediction for the city of Zurich.
///
/// # Module structure
///
/// ```text
/// wreckognizer
/// ├── model       shared data types (AccidentQuery, FeatureRow, PipelineError, ...)
/// ├── labels      accident/road type codes and their descriptions
/// ├── config      service configuration loader (wreckognizer.toml)
/// ├── projection  Swiss LV95 <-> WGS84 coordinate conversion
/// ├── stations    reference station table and nearest-station draw
/// ├── features
/// │   ├── volume  historical average traffic/pedestrian volumes
/// │   └── weather hourly weather merged per forward period
/// ├── ingest
/// │   ├── open_meteo  Open-Meteo archive/forecast client
/// │   └── fixtures (test only) representative API response payloads
/// ├── tracker     Open-Meteo request-rate tracking (memory or JSON file)
/// ├── transform   frozen scaling + one-hot encoding
/// ├── classifier  severity model behind the SeverityModel trait
/// ├── pipeline    end-to-end prediction (Predictor)
/// └── endpoint    HTTP API for predictions
/// ```

/// Public modules
pub mod classifier;
pub mod config;
pub mod endpoint;
pub mod features;
pub mod ingest;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod projection;
pub mod stations;
pub mod tracker;
pub mod transform;
