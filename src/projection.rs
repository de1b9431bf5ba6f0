/// Swiss LV95 (EPSG:2056) <-> WGS84 (EPSG:4326) coordinate conversion.
///
/// The city's station and accident records carry planar LV95 easting/northing
/// pairs. Everything downstream (nearest-station search, display) works in
/// WGS84 longitude/latitude.
///
/// Both systems are described as proj strings and compiled once per thread.
/// LV95 is the Swiss oblique Mercator (`somerc`) on the Bessel 1841 ellipsoid
/// with the CH1903+ geocentric shift to WGS84. proj4rs works in radians for
/// geographic coordinates; this module takes and returns degrees.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use thiserror::Error;

/// EPSG:2056, CH1903+ / LV95.
const LV95: &str = "+proj=somerc +lat_0=46.9524055555556 +lon_0=7.43958333333333 +k_0=1 \
                    +x_0=2600000 +y_0=1200000 +ellps=bessel \
                    +towgs84=674.374,15.056,405.346,0,0,0,0 +units=m +no_defs";

/// EPSG:4326, geographic WGS84.
const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("Non-finite coordinate pair ({0}, {1})")]
    NonFinite(f64, f64),

    #[error("Projection setup failed: {0}")]
    Setup(String),

    #[error("Transform of ({0}, {1}) failed: {2}")]
    Transform(f64, f64, String),
}

struct SwissProjections {
    lv95: Proj,
    wgs84: Proj,
}

impl SwissProjections {
    fn new() -> Result<Self, String> {
        Ok(Self {
            lv95: Proj::from_proj_string(LV95).map_err(|e| format!("LV95: {}", e))?,
            wgs84: Proj::from_proj_string(WGS84).map_err(|e| format!("WGS84: {}", e))?,
        })
    }
}

thread_local! {
    static SWISS: Result<SwissProjections, String> = SwissProjections::new();
}

fn with_projections<T>(
    f: impl FnOnce(&SwissProjections) -> Result<T, ProjectionError>,
) -> Result<T, ProjectionError> {
    SWISS.with(|projections| match projections {
        Ok(p) => f(p),
        Err(e) => Err(ProjectionError::Setup(e.clone())),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Converts an LV95 (easting, northing) pair to WGS84 (lon, lat) in degrees.
pub fn lv95_to_wgs84(easting: f64, northing: f64) -> Result<(f64, f64), ProjectionError> {
    if !easting.is_finite() || !northing.is_finite() {
        return Err(ProjectionError::NonFinite(easting, northing));
    }

    with_projections(|p| {
        let mut point = (easting, northing, 0.0);
        transform(&p.lv95, &p.wgs84, &mut point)
            .map_err(|e| ProjectionError::Transform(easting, northing, e.to_string()))?;

        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ProjectionError::NonFinite(lon, lat));
        }
        Ok((lon, lat))
    })
}

/// Converts a WGS84 (lon, lat) pair in degrees to LV95 (easting, northing).
pub fn wgs84_to_lv95(lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(ProjectionError::NonFinite(lon, lat));
    }

    with_projections(|p| {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&p.wgs84, &p.lv95, &mut point)
            .map_err(|e| ProjectionError::Transform(lon, lat, e.to_string()))?;
        Ok((point.0, point.1))
    })
}

/// Converts a batch of LV95 pairs, failing on the first malformed one.
pub fn lv95_to_wgs84_batch(points: &[(f64, f64)]) -> Result<Vec<(f64, f64)>, ProjectionError> {
    points.iter().map(|&(e, n)| lv95_to_wgs84(e, n)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_projection_origin_maps_to_bern() {
        let (lon, lat) = lv95_to_wgs84(2_600_000.0, 1_200_000.0).unwrap();
        assert!((lon - 7.43863).abs() < 1e-4, "lon was {}", lon);
        assert!((lat - 46.95108).abs() < 1e-4, "lat was {}", lat);
    }

    #[test]
    fn test_swisstopo_reference_point() {
        // swisstopo worked example: E 2 700 000 / N 1 100 000
        // -> 8° 43' 49.79" E, 46° 02' 38.87" N
        let (lon, lat) = lv95_to_wgs84(2_700_000.0, 1_100_000.0).unwrap();
        assert!((lon - 8.730497).abs() < 1e-4, "lon was {}", lon);
        assert!((lat - 46.044131).abs() < 1e-4, "lat was {}", lat);
    }

    #[test]
    fn test_zurich_lands_in_zurich() {
        // Zurich main station, roughly
        let (lon, lat) = lv95_to_wgs84(2_683_200.0, 1_248_100.0).unwrap();
        assert!(lon > 8.50 && lon < 8.56, "lon was {}", lon);
        assert!(lat > 47.36 && lat < 47.40, "lat was {}", lat);
    }

    #[test]
    fn test_wgs84_to_lv95_reference_point() {
        let (e, n) = wgs84_to_lv95(8.730497, 46.044131).unwrap();
        assert!((e - 2_700_000.0).abs() < 5.0, "easting was {}", e);
        assert!((n - 1_100_000.0).abs() < 5.0, "northing was {}", n);
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        assert!(matches!(
            lv95_to_wgs84(f64::NAN, 1_200_000.0),
            Err(ProjectionError::NonFinite(_, n)) if n == 1_200_000.0
        ));
        assert!(wgs84_to_lv95(8.5, f64::INFINITY).is_err());
    }

    #[test]
    fn test_batch_fails_on_first_bad_pair() {
        let ok = lv95_to_wgs84_batch(&[(2_600_000.0, 1_200_000.0), (2_683_200.0, 1_248_100.0)]);
        assert_eq!(ok.unwrap().len(), 2);

        let bad = lv95_to_wgs84_batch(&[(2_600_000.0, 1_200_000.0), (f64::NAN, 0.0)]);
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn prop_lv95_round_trip(
            easting in 2_480_000.0f64..2_840_000.0,
            northing in 1_070_000.0f64..1_300_000.0,
        ) {
            let (lon, lat) = lv95_to_wgs84(easting, northing).unwrap();
            let (e, n) = wgs84_to_lv95(lon, lat).unwrap();
            prop_assert!((e - easting).abs() < 0.1, "easting {} -> {}", easting, e);
            prop_assert!((n - northing).abs() < 0.1, "northing {} -> {}", northing, n);
        }
    }
}
