//! Camera correction driven by the alignment diagnostic.
//!
//! When the alignment offset grows past a threshold, the viewpoint is nudged
//! by the opposite of the bias so the corrected markers stay where the user
//! was looking.

use crate::alignment::AlignmentOffset;
use crate::geodesy::normalize_longitude;

/// Same limit the orbit camera applies to pitch, about +/-1.54 rad.
const PITCH_LIMIT_DEG: f64 = 88.2;

pub const DEFAULT_THRESHOLD_DEG: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraOrientation {
    /// Heading in `[-180, 180)`.
    pub heading_deg: f64,
    pub pitch_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraNudge {
    pub delta_heading_deg: f64,
    pub delta_pitch_deg: f64,
    pub orientation: CameraOrientation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCorrector {
    pub threshold_deg: f64,
    pub gain: f64,
}

impl Default for CameraCorrector {
    fn default() -> Self {
        Self {
            threshold_deg: DEFAULT_THRESHOLD_DEG,
            gain: 1.0,
        }
    }
}

impl CameraCorrector {
    pub fn new(threshold_deg: f64, gain: f64) -> Self {
        Self {
            threshold_deg,
            gain,
        }
    }

    /// Returns the nudge to apply, or `None` while the offset is within the
    /// threshold on both axes.
    pub fn correct(
        &self,
        orientation: CameraOrientation,
        offset: &AlignmentOffset,
    ) -> Option<CameraNudge> {
        if !offset.exceeds(self.threshold_deg) {
            return None;
        }

        let delta_heading_deg = -offset.lon_bias_deg * self.gain;
        let delta_pitch_deg = -offset.lat_bias_deg * self.gain;
        Some(CameraNudge {
            delta_heading_deg,
            delta_pitch_deg,
            orientation: CameraOrientation {
                heading_deg: normalize_longitude(orientation.heading_deg + delta_heading_deg),
                pitch_deg: (orientation.pitch_deg + delta_pitch_deg)
                    .clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG),
            },
        })
    }
}
