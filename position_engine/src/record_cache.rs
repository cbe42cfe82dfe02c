//! Orbital record cache.
//!
//! Parsing a TLE and deriving the SGP4 constants is the expensive part of
//! propagation, so it happens once per object and element text. The cache
//! also remembers failures against the text that produced them, so an invalid
//! element set is neither re-parsed every frame nor reported more than once.

use crate::catalog::{ElementPair, ObjectId};
use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use sgp4::{Constants, Elements};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

const MINUTES_PER_DAY: f64 = 1440.0;

/// Parsed, propagation-ready form of an element pair.
pub struct OrbitalRecord {
    constants: Constants<'static>,
    epoch: DateTime<Utc>,
    mean_motion: f64,
    source: ElementPair,
}

impl fmt::Debug for OrbitalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrbitalRecord")
            .field("epoch", &self.epoch)
            .field("mean_motion", &self.mean_motion)
            .field("line1", &self.source.line1)
            .finish_non_exhaustive()
    }
}

impl OrbitalRecord {
    /// Parses an element pair and prepares the SGP4 constants.
    ///
    /// # Errors
    /// Returns `EngineError::TLEError` for malformed text and
    /// `EngineError::PropagationError` for element sets SGP4 rejects as
    /// physically invalid.
    pub fn from_pair(pair: &ElementPair) -> EngineResult<Self> {
        let elements = Elements::from_tle(None, pair.line1.as_bytes(), pair.line2.as_bytes())
            .map_err(|e| EngineError::TLEError(format!("Failed to parse TLE: {e}")))?;

        if !(elements.mean_motion.is_finite() && elements.mean_motion > 0.0) {
            return Err(EngineError::TLEError(format!(
                "Invalid mean motion: {}",
                elements.mean_motion
            )));
        }

        let constants = Constants::from_elements(&elements).map_err(|e| {
            EngineError::PropagationError(format!("Failed to create constants: {e}"))
        })?;

        Ok(Self {
            constants,
            epoch: elements.datetime.and_utc(),
            mean_motion: elements.mean_motion,
            source: pair.clone(),
        })
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Orbital period in minutes, from the mean motion (rev/day).
    pub fn period_minutes(&self) -> f64 {
        MINUTES_PER_DAY / self.mean_motion
    }

    pub fn source(&self) -> &ElementPair {
        &self.source
    }

    /// Minutes between the element epoch and `timestamp`, negative before it.
    pub fn minutes_since_epoch(&self, timestamp: DateTime<Utc>) -> f64 {
        let duration = timestamp.signed_duration_since(self.epoch);
        duration.num_milliseconds() as f64 / 60_000.0
    }

    /// TEME position in km at `timestamp`.
    ///
    /// # Errors
    /// Returns `EngineError::PropagationError` when SGP4 fails at that time
    /// (for example a decayed orbit) or yields a non-finite position.
    pub fn propagate_teme(&self, timestamp: DateTime<Utc>) -> EngineResult<[f64; 3]> {
        let prediction = self
            .constants
            .propagate(self.minutes_since_epoch(timestamp))
            .map_err(|e| EngineError::PropagationError(format!("Propagation failed: {e}")))?;

        if prediction.position.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::PropagationError(
                "Propagation produced a non-finite position".to_string(),
            ));
        }
        Ok(prediction.position)
    }
}

enum CacheEntry {
    Parsed {
        source: ElementPair,
        record: Arc<OrbitalRecord>,
    },
    Failed {
        source: ElementPair,
        reason: String,
    },
}

impl CacheEntry {
    fn source(&self) -> &ElementPair {
        match self {
            CacheEntry::Parsed { source, .. } | CacheEntry::Failed { source, .. } => source,
        }
    }
}

/// Per-identity cache of parsed orbital records.
#[derive(Default)]
pub struct OrbitalRecordCache {
    entries: HashMap<ObjectId, CacheEntry>,
    parse_count: usize,
}

impl OrbitalRecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `id`, parsing `pair` on first use or when the
    /// text differs from what was cached. `None` means no propagation is
    /// available for this object.
    pub fn get(&mut self, id: &ObjectId, pair: &ElementPair) -> Option<Arc<OrbitalRecord>> {
        if let Some(entry) = self.entries.get(id) {
            if entry.source() == pair {
                return match entry {
                    CacheEntry::Parsed { record, .. } => Some(Arc::clone(record)),
                    CacheEntry::Failed { .. } => None,
                };
            }
        }

        self.parse_count += 1;
        match OrbitalRecord::from_pair(pair) {
            Ok(record) => {
                let record = Arc::new(record);
                self.entries.insert(
                    id.clone(),
                    CacheEntry::Parsed {
                        source: pair.clone(),
                        record: Arc::clone(&record),
                    },
                );
                Some(record)
            }
            Err(e) => {
                warn!(object = %id, "no propagation available: {e}");
                self.entries.insert(
                    id.clone(),
                    CacheEntry::Failed {
                        source: pair.clone(),
                        reason: e.to_string(),
                    },
                );
                None
            }
        }
    }

    /// Cached record for `id` without parsing anything.
    pub fn peek(&self, id: &ObjectId) -> Option<Arc<OrbitalRecord>> {
        match self.entries.get(id)? {
            CacheEntry::Parsed { record, .. } => Some(Arc::clone(record)),
            CacheEntry::Failed { .. } => None,
        }
    }

    pub fn evict(&mut self, id: &ObjectId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of parse attempts made since construction.
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    /// Objects whose current element text failed to parse, with the reason.
    pub fn diagnostics(&self) -> impl Iterator<Item = (&ObjectId, &str)> {
        self.entries.iter().filter_map(|(id, entry)| match entry {
            CacheEntry::Failed { reason, .. } => Some((id, reason.as_str())),
            CacheEntry::Parsed { .. } => None,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ISS_LINE1: &str =
        "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    pub(crate) const ISS_LINE2: &str =
        "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    pub(crate) fn iss_pair() -> ElementPair {
        ElementPair::new(ISS_LINE1, ISS_LINE2)
    }

    #[test]
    fn test_parses_once_and_reuses() {
        let mut cache = OrbitalRecordCache::new();
        let id = ObjectId::Catalog(25544);

        let first = cache.get(&id, &iss_pair()).unwrap();
        let second = cache.get(&id, &iss_pair()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.parse_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reparses_when_text_changes() {
        let mut cache = OrbitalRecordCache::new();
        let id = ObjectId::Catalog(25544);
        let first = cache.get(&id, &iss_pair()).unwrap();

        // Same elements, different epoch day fraction in line 1
        let updated = ElementPair::new(
            "1 25544U 98067A   20195.88612269 -.00002218  00000-0 -31515-4 0  9993",
            ISS_LINE2,
        );
        let second = cache.get(&id, &updated).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.parse_count(), 2);
        assert_eq!(cache.len(), 1);
        assert!(second.epoch() > first.epoch());
    }

    #[test]
    fn test_malformed_text_is_remembered() {
        let mut cache = OrbitalRecordCache::new();
        let id = ObjectId::Catalog(1);
        let bad = ElementPair::new("1 garbage", "2 garbage");

        assert!(cache.get(&id, &bad).is_none());
        assert!(cache.get(&id, &bad).is_none());
        assert_eq!(cache.parse_count(), 1);

        let diagnostics: Vec<_> = cache.diagnostics().collect();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].0, &id);
    }

    #[test]
    fn test_evict_and_clear() {
        let mut cache = OrbitalRecordCache::new();
        let id = ObjectId::Catalog(25544);
        cache.get(&id, &iss_pair());
        assert!(cache.contains(&id));
        assert!(cache.evict(&id));
        assert!(!cache.contains(&id));
        assert!(!cache.evict(&id));

        cache.get(&id, &iss_pair());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_period_of_iss() {
        let record = OrbitalRecord::from_pair(&iss_pair()).unwrap();
        assert!((record.period_minutes() - 92.93).abs() < 0.05);
    }
}
