//! Per-entity position memoization.
//!
//! The renderer asks for every entity's position every frame, often for the
//! same time several times over. Each entity keeps its last answer keyed by
//! the requested time, the entity's data revision and the alignment
//! generation, so repeated requests are served without propagating again.

use crate::alignment::AlignmentOffset;
use crate::catalog::TrackedObject;
use crate::geodesy::CartesianPosition;
use crate::lifecycle::EntityId;
use crate::record_cache::OrbitalRecord;
use crate::resolver::{resolve, Resolution};
use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Resolves `object`, corrects propagated output by `offset`, and converts to
/// the renderer's Cartesian frame. Returns `None` when unresolvable.
pub fn evaluate(
    object: &TrackedObject,
    record: Option<&OrbitalRecord>,
    offset: &AlignmentOffset,
    time: DateTime<Utc>,
) -> Option<CartesianPosition> {
    let geodetic = match resolve(object, record, time) {
        Resolution::Propagated(p) => offset.apply(p),
        Resolution::Reported(p) => p,
        Resolution::Unresolvable => return None,
    };
    Some(geodetic.to_cartesian())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MemoKey {
    time: DateTime<Utc>,
    revision: u64,
    generation: u64,
}

#[derive(Debug, Default)]
struct MemoEntry {
    revision: u64,
    last: Option<(MemoKey, Option<CartesianPosition>)>,
}

#[derive(Debug, Default)]
pub struct PositionMemoizer {
    entries: HashMap<EntityId, MemoEntry>,
    hits: u64,
    misses: u64,
}

impl PositionMemoizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: EntityId) {
        self.entries.entry(entity).or_default();
    }

    pub fn evict(&mut self, entity: EntityId) -> bool {
        self.entries.remove(&entity).is_some()
    }

    /// Marks the entity's underlying object data as changed.
    pub fn invalidate(&mut self, entity: EntityId) {
        if let Some(entry) = self.entries.get_mut(&entity) {
            entry.revision += 1;
            entry.last = None;
        }
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entries.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Position of `entity` at `time`, calling `compute` only when the key
    /// differs from the last request.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownEntity` if the entity was never registered
    /// or has been evicted.
    pub fn position_at<F>(
        &mut self,
        entity: EntityId,
        time: DateTime<Utc>,
        generation: u64,
        compute: F,
    ) -> EngineResult<Option<CartesianPosition>>
    where
        F: FnOnce() -> Option<CartesianPosition>,
    {
        let entry = self
            .entries
            .get_mut(&entity)
            .ok_or(EngineError::UnknownEntity(entity))?;

        let key = MemoKey {
            time,
            revision: entry.revision,
            generation,
        };
        if let Some((last_key, cached)) = entry.last {
            if last_key == key {
                self.hits += 1;
                return Ok(cached);
            }
        }

        self.misses += 1;
        let value = compute();
        entry.last = Some((key, value));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 7, 12, 21, 0, 0).unwrap()
    }

    #[test]
    fn test_same_time_is_served_from_cache() {
        let mut memo = PositionMemoizer::new();
        let entity = EntityId(1);
        memo.register(entity);

        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Some(CartesianPosition {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            })
        };

        let a = memo.position_at(entity, t0(), 0, compute).unwrap();
        let b = memo.position_at(entity, t0(), 0, compute).unwrap();
        assert_eq!(a, b);
        assert_eq!(calls.get(), 1);
        assert_eq!(memo.stats(), (1, 1));
    }

    #[test]
    fn test_recomputes_on_new_time_generation_or_revision() {
        let mut memo = PositionMemoizer::new();
        let entity = EntityId(1);
        memo.register(entity);

        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            None
        };

        memo.position_at(entity, t0(), 0, compute).unwrap();
        // Scrubbing backward is a different key
        memo.position_at(entity, t0() - Duration::seconds(5), 0, compute)
            .unwrap();
        memo.position_at(entity, t0() - Duration::seconds(5), 1, compute)
            .unwrap();
        memo.invalidate(entity);
        memo.position_at(entity, t0() - Duration::seconds(5), 1, compute)
            .unwrap();
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_unregistered_entity_is_an_error() {
        let mut memo = PositionMemoizer::new();
        let result = memo.position_at(EntityId(9), t0(), 0, || None);
        assert_eq!(result, Err(EngineError::UnknownEntity(EntityId(9))));

        memo.register(EntityId(9));
        assert!(memo.evict(EntityId(9)));
        assert!(memo.position_at(EntityId(9), t0(), 0, || None).is_err());
    }
}
