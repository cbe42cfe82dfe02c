//! Position resolution.
//!
//! Resolution is a pure function of the object, its parsed record and the
//! requested time. Caching lives in the record cache and the memoizer.

use crate::catalog::TrackedObject;
use crate::geodesy::{teme_to_geodetic, GeodeticPosition};
use crate::record_cache::OrbitalRecord;
use crate::EngineResult;
use chrono::{DateTime, Utc};

/// Where a resolved position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSource {
    Propagated,
    Reported,
}

/// Outcome of resolving one object at one time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Propagated(GeodeticPosition),
    Reported(GeodeticPosition),
    /// Neither propagation nor a reported position is available. The object
    /// is not rendered and contributes nothing to alignment.
    Unresolvable,
}

impl Resolution {
    pub fn position(&self) -> Option<GeodeticPosition> {
        match *self {
            Resolution::Propagated(p) | Resolution::Reported(p) => Some(p),
            Resolution::Unresolvable => None,
        }
    }

    pub fn source(&self) -> Option<PositionSource> {
        match self {
            Resolution::Propagated(_) => Some(PositionSource::Propagated),
            Resolution::Reported(_) => Some(PositionSource::Reported),
            Resolution::Unresolvable => None,
        }
    }

    pub fn is_resolvable(&self) -> bool {
        !matches!(self, Resolution::Unresolvable)
    }
}

/// Propagates `record` to `timestamp` and converts to geodetic coordinates.
///
/// # Errors
/// Returns `EngineError::PropagationError` if SGP4 or the frame conversion
/// fails at this time.
pub fn propagate(record: &OrbitalRecord, timestamp: DateTime<Utc>) -> EngineResult<GeodeticPosition> {
    let teme_km = record.propagate_teme(timestamp)?;
    teme_to_geodetic(teme_km, timestamp)
}

/// Resolves `object` at `timestamp`, preferring propagation and falling back
/// to the last reported position.
pub fn resolve(
    object: &TrackedObject,
    record: Option<&OrbitalRecord>,
    timestamp: DateTime<Utc>,
) -> Resolution {
    if let Some(position) = record.and_then(|r| propagate(r, timestamp).ok()) {
        return Resolution::Propagated(position);
    }

    match object.usable_report() {
        Some(reported) => Resolution::Reported(reported.position),
        None => Resolution::Unresolvable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ElementPair, ObjectId, ReportedPosition};
    use crate::record_cache::tests::iss_pair;
    use crate::record_cache::OrbitalRecordCache;
    use chrono::Duration;

    const DECAYING_LINE1: &str =
        "1 99001U 24001A   24001.50000000  .05000000  00000-0  10000-1 0  9995";
    const DECAYING_LINE2: &str =
        "2 99001  51.6000 100.0000 0005000  90.0000 270.0000 16.20000000000107";

    fn iss() -> (TrackedObject, OrbitalRecord) {
        let object = TrackedObject::new(ObjectId::Catalog(25544), "ISS (ZARYA)")
            .with_elements(iss_pair());
        let record = OrbitalRecord::from_pair(&iss_pair()).unwrap();
        (object, record)
    }

    #[test]
    fn test_longitude_always_normalized() {
        let (object, record) = iss();
        let start = record.epoch() - Duration::hours(12);
        for step in 0..500 {
            let t = start + Duration::minutes(step * 7);
            let position = resolve(&object, Some(&record), t)
                .position()
                .expect("ISS should propagate");
            assert!(
                (-180.0..180.0).contains(&position.longitude_deg),
                "longitude {} out of range at {t}",
                position.longitude_deg
            );
            assert!((-90.0..=90.0).contains(&position.latitude_deg));
        }
    }

    #[test]
    fn test_iss_altitude_and_inclination_bound() {
        let (object, record) = iss();
        let resolution = resolve(&object, Some(&record), record.epoch());
        let position = match resolution {
            Resolution::Propagated(p) => p,
            other => panic!("expected propagation, got {other:?}"),
        };
        assert!(position.altitude_km > 350.0 && position.altitude_km < 480.0);
        assert!(position.latitude_deg.abs() <= 51.7);
    }

    #[test]
    fn test_latitude_repeats_after_one_period() {
        let (object, record) = iss();
        let t0 = record.epoch();
        let period_ms = (record.period_minutes() * 60_000.0).round() as i64;
        let t1 = t0 + Duration::milliseconds(period_ms);

        let lat0 = resolve(&object, Some(&record), t0).position().unwrap().latitude_deg;
        let lat1 = resolve(&object, Some(&record), t1).position().unwrap().latitude_deg;
        assert!(
            (lat0 - lat1).abs() < 0.5,
            "latitude drifted from {lat0} to {lat1} over one period"
        );
    }

    #[test]
    fn test_falls_back_to_reported_position() {
        let reported = ReportedPosition {
            position: GeodeticPosition::new(10.0, 20.0, 500.0),
            observed_at: None,
        };
        let object = TrackedObject::new(ObjectId::Catalog(7), "NO ELEMENTS").with_reported(reported);
        let t = chrono::Utc::now();
        assert_eq!(
            resolve(&object, None, t),
            Resolution::Reported(reported.position)
        );
    }

    #[test]
    fn test_reported_longitude_is_normalized() {
        let reported = ReportedPosition {
            position: GeodeticPosition {
                latitude_deg: 5.0,
                longitude_deg: 190.0,
                altitude_km: 500.0,
            },
            observed_at: None,
        };
        let object = TrackedObject::new(ObjectId::Catalog(8), "RAW REPORT").with_reported(reported);
        let position = resolve(&object, None, chrono::Utc::now()).position().unwrap();
        assert!((position.longitude_deg - (-170.0)).abs() < 1e-9);
        assert_eq!(position.latitude_deg, 5.0);
    }

    #[test]
    fn test_non_finite_report_is_unresolvable() {
        let reported = ReportedPosition {
            position: GeodeticPosition {
                latitude_deg: f64::NAN,
                longitude_deg: 0.0,
                altitude_km: 500.0,
            },
            observed_at: None,
        };
        let object = TrackedObject::new(ObjectId::Catalog(9), "NAN REPORT").with_reported(reported);
        assert_eq!(resolve(&object, None, chrono::Utc::now()), Resolution::Unresolvable);
    }

    #[test]
    fn test_propagation_failure_falls_back_without_poisoning_cache() {
        // Low, high-drag orbit that decays within a few years of epoch
        let pair = ElementPair::new(DECAYING_LINE1, DECAYING_LINE2);
        let id = ObjectId::Catalog(99001);
        let mut cache = OrbitalRecordCache::new();
        let record = cache.get(&id, &pair).expect("decaying elements parse");

        let failure = (1..=7300)
            .map(|day| record.epoch() + Duration::days(day))
            .find(|t| propagate(&record, *t).is_err())
            .expect("decaying orbit should fail to propagate eventually");

        let reported = ReportedPosition {
            position: GeodeticPosition::new(0.0, 0.0, 120.0),
            observed_at: None,
        };
        let object = TrackedObject::new(id.clone(), "DECAYING")
            .with_elements(pair.clone())
            .with_reported(reported);

        let cached = cache.peek(&id);
        assert_eq!(
            resolve(&object, cached.as_deref(), failure),
            Resolution::Reported(reported.position)
        );

        let cached = cache.get(&id, &pair);
        assert!(matches!(
            resolve(&object, cached.as_deref(), record.epoch()),
            Resolution::Propagated(_)
        ));
        assert_eq!(cache.parse_count(), 1);
        assert!(cache.diagnostics().next().is_none());
    }

    #[test]
    fn test_unresolvable_without_elements_or_report() {
        let object = TrackedObject::new(ObjectId::name("GHOST"), "GHOST");
        let resolution = resolve(&object, None, chrono::Utc::now());
        assert_eq!(resolution, Resolution::Unresolvable);
        assert!(resolution.position().is_none());
        assert!(!resolution.is_resolvable());
    }
}
