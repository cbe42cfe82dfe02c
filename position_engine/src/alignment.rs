//! Alignment estimation.
//!
//! Propagated and externally reported positions can disagree by a
//! near-constant bias. A single mean latitude/longitude offset is estimated
//! across every visible object that has both, and subtracted from propagated
//! output before it reaches the renderer.

use crate::geodesy::{normalize_longitude, wrap180, GeodeticPosition};

/// A propagated and a reported position of the same object at the same time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentSample {
    pub propagated: GeodeticPosition,
    pub reported: GeodeticPosition,
}

impl AlignmentSample {
    /// `(lat_delta, lon_delta)` in degrees, or `None` if either is not finite.
    pub fn delta(&self) -> Option<(f64, f64)> {
        let lat = self.propagated.latitude_deg - self.reported.latitude_deg;
        let lon = wrap180(self.propagated.longitude_deg - self.reported.longitude_deg);
        (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
    }
}

/// Session-wide correction applied to propagated positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlignmentOffset {
    pub lat_bias_deg: f64,
    pub lon_bias_deg: f64,
    pub sample_count: usize,
}

impl AlignmentOffset {
    pub const ZERO: AlignmentOffset = AlignmentOffset {
        lat_bias_deg: 0.0,
        lon_bias_deg: 0.0,
        sample_count: 0,
    };

    /// Mean delta over all samples with finite deltas.
    pub fn estimate<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = AlignmentSample>,
    {
        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        let mut count = 0usize;
        for (lat, lon) in samples.into_iter().filter_map(|s| s.delta()) {
            lat_sum += lat;
            lon_sum += lon;
            count += 1;
        }

        if count == 0 {
            return Self::ZERO;
        }
        Self {
            lat_bias_deg: lat_sum / count as f64,
            lon_bias_deg: lon_sum / count as f64,
            sample_count: count,
        }
    }

    /// Largest absolute bias of the two axes.
    pub fn magnitude(&self) -> f64 {
        self.lat_bias_deg.abs().max(self.lon_bias_deg.abs())
    }

    /// True when either axis exceeds `threshold_deg`.
    pub fn exceeds(&self, threshold_deg: f64) -> bool {
        self.sample_count > 0
            && (self.lat_bias_deg.abs() > threshold_deg || self.lon_bias_deg.abs() > threshold_deg)
    }

    /// Removes the bias from a propagated position.
    pub fn apply(&self, position: GeodeticPosition) -> GeodeticPosition {
        if self.sample_count == 0 {
            return position;
        }
        GeodeticPosition {
            latitude_deg: (position.latitude_deg - self.lat_bias_deg).clamp(-90.0, 90.0),
            longitude_deg: normalize_longitude(position.longitude_deg - self.lon_bias_deg),
            altitude_km: position.altitude_km,
        }
    }
}
