//! Frame and coordinate conversions.
//!
//! SGP4 produces positions in the TEME frame (km). The engine rotates them
//! into an Earth-fixed frame by Greenwich mean sidereal time and hands the
//! result to satkit for WGS-84 geodetic conversion. The renderer's native
//! representation is Earth-fixed Cartesian metres.

use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use satkit::ITRFCoord;

const JD_UNIX_EPOCH: f64 = 2440587.5;
const JD_J2000: f64 = 2451545.0;
const SECONDS_PER_DAY: f64 = 86400.0;

/// Latitude/longitude in degrees, altitude above the ellipsoid in km.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    /// Always in `[-180, 180)`.
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl GeodeticPosition {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg: normalize_longitude(longitude_deg),
            altitude_km,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude_deg.is_finite()
            && self.longitude_deg.is_finite()
            && self.altitude_km.is_finite()
    }

    /// Earth-fixed Cartesian position of this point.
    pub fn to_cartesian(&self) -> CartesianPosition {
        let coord = ITRFCoord::from_geodetic_deg(
            self.latitude_deg,
            self.longitude_deg,
            self.altitude_km * 1000.0,
        );
        CartesianPosition {
            x: coord.itrf[0],
            y: coord.itrf[1],
            z: coord.itrf[2],
        }
    }
}

/// Earth-fixed Cartesian coordinates in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Normalizes a longitude into `[-180, 180)`.
pub fn normalize_longitude(lon_deg: f64) -> f64 {
    let wrapped = (lon_deg + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Wraps an angular difference into `(-180, 180]`.
///
/// `((x + 180) mod 360 + 360) mod 360 - 180`, with `-180` mapped to `180`.
pub fn wrap180(delta_deg: f64) -> f64 {
    let wrapped = ((delta_deg + 180.0) % 360.0 + 360.0) % 360.0 - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Greenwich mean sidereal time in radians.
pub fn gmst_radians(timestamp: DateTime<Utc>) -> f64 {
    let unix = timestamp.timestamp() as f64;
    let sub = timestamp.timestamp_subsec_nanos() as f64 * 1e-9;
    let jd = JD_UNIX_EPOCH + (unix + sub) / SECONDS_PER_DAY;
    let d = jd - JD_J2000;
    let t = d / 36525.0;

    let gmst_deg = 280.46061837 + 360.98564736629 * d + 0.000387933 * t * t
        - t * t * t / 38710000.0;
    gmst_deg.rem_euclid(360.0).to_radians()
}

/// Converts a TEME position (km) at `timestamp` to geodetic coordinates.
///
/// # Errors
/// Returns `EngineError::PropagationError` for non-finite or degenerate input.
pub fn teme_to_geodetic(
    position_km: [f64; 3],
    timestamp: DateTime<Utc>,
) -> EngineResult<GeodeticPosition> {
    if position_km.iter().any(|c| !c.is_finite()) {
        return Err(EngineError::PropagationError(
            "non-finite TEME position".to_string(),
        ));
    }

    let theta = gmst_radians(timestamp);
    let (sin_t, cos_t) = theta.sin_cos();
    let [x, y, z] = position_km;

    // Rotate about the pole by -GMST into the Earth-fixed frame, in metres
    let ecef_m = [
        (cos_t * x + sin_t * y) * 1000.0,
        (-sin_t * x + cos_t * y) * 1000.0,
        z * 1000.0,
    ];
    if ecef_m.iter().map(|c| c * c).sum::<f64>() < 1.0 {
        return Err(EngineError::PropagationError(
            "position at Earth centre".to_string(),
        ));
    }

    let coord = ITRFCoord::from_slice(&ecef_m).map_err(|e| {
        EngineError::PropagationError(format!("Failed to create ITRFCoord: {e}"))
    })?;
    let (lat, lon, hae_m) = coord.to_geodetic_deg();

    let geodetic = GeodeticPosition::new(lat, lon, hae_m / 1000.0);
    if !geodetic.is_finite() {
        return Err(EngineError::PropagationError(
            "non-finite geodetic position".to_string(),
        ));
    }
    Ok(geodetic)
}
