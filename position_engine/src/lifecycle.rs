//! Render entity lifecycle and the pick index.
//!
//! Every catalog refresh is reconciled against the current entity set in one
//! pass: new identities get an entity, a memo slot and a pick entry; vanished
//! identities lose all three along with their orbital record.

use crate::catalog::{Classification, ObjectId, TrackedObject};
use crate::memo::PositionMemoizer;
use crate::record_cache::OrbitalRecordCache;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::info;

// Marker colours, sRGB
const PAYLOAD_COLOR: [f32; 3] = [0.475, 0.941, 0.475];
const STATION_COLOR: [f32; 3] = [0.918, 0.878, 0.349];
const ROCKET_BODY_COLOR: [f32; 3] = [0.969, 0.824, 0.431];
const DEBRIS_COLOR: [f32; 3] = [0.969, 0.431, 0.431];
const UNKNOWN_COLOR: [f32; 3] = [0.78, 0.78, 0.82];

/// Renderer-facing identifier of a scene marker. Also serves as the hit id
/// the renderer reports on pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayStyle {
    pub color: [f32; 3],
    pub pixel_size: f32,
}

impl DisplayStyle {
    pub fn for_classification(classification: Classification) -> Self {
        let (color, pixel_size) = match classification {
            Classification::Station => (STATION_COLOR, 8.0),
            Classification::Payload => (PAYLOAD_COLOR, 4.0),
            Classification::RocketBody => (ROCKET_BODY_COLOR, 3.0),
            Classification::Debris => (DEBRIS_COLOR, 2.0),
            Classification::Unknown => (UNKNOWN_COLOR, 3.0),
        };
        Self { color, pixel_size }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntity {
    pub id: EntityId,
    pub object: TrackedObject,
    pub style: DisplayStyle,
}

/// Maps renderer hit ids back to object identities.
#[derive(Debug, Default)]
pub struct PickIndex {
    by_hit: HashMap<EntityId, ObjectId>,
}

impl PickIndex {
    pub fn lookup(&self, hit: EntityId) -> Option<&ObjectId> {
        self.by_hit.get(&hit)
    }

    pub fn len(&self) -> usize {
        self.by_hit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hit.is_empty()
    }

    pub fn contains_object(&self, id: &ObjectId) -> bool {
        self.by_hit.values().any(|o| o == id)
    }

    fn insert(&mut self, hit: EntityId, id: ObjectId) {
        self.by_hit.insert(hit, id);
    }

    fn remove(&mut self, hit: EntityId) -> Option<ObjectId> {
        self.by_hit.remove(&hit)
    }
}

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    /// Retained entities whose object data changed.
    pub updated: Vec<EntityId>,
    pub retained: usize,
    /// Catalog objects left out because they have no usable position source.
    pub unresolvable: Vec<ObjectId>,
}

impl ReconcileReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct EntityLifecycle {
    entities: HashMap<ObjectId, RenderEntity>,
    pick_index: PickIndex,
    catalog_ids: HashSet<ObjectId>,
    next_id: u64,
}

impl EntityLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_for(&self, id: &ObjectId) -> Option<&RenderEntity> {
        self.entities.get(id)
    }

    /// Entity registered under a renderer hit id.
    pub fn entity(&self, hit: EntityId) -> Option<&RenderEntity> {
        self.pick_index
            .lookup(hit)
            .and_then(|id| self.entities.get(id))
    }

    pub fn entities(&self) -> impl Iterator<Item = &RenderEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn pick_index(&self) -> &PickIndex {
        &self.pick_index
    }

    /// Replaces the visible set with `objects`.
    ///
    /// Objects are deduplicated by identity, last occurrence winning. An
    /// object gets an entity only if it can be positioned at all: its element
    /// set parses or it carries a reported position.
    pub fn reconcile(
        &mut self,
        objects: Vec<TrackedObject>,
        memo: &mut PositionMemoizer,
        records: &mut OrbitalRecordCache,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut order: Vec<ObjectId> = Vec::with_capacity(objects.len());
        let mut latest: HashMap<ObjectId, TrackedObject> = HashMap::with_capacity(objects.len());
        for object in objects {
            let id = object.id.clone();
            if latest.insert(id.clone(), object).is_none() {
                order.push(id);
            }
        }

        // Objects gone from the catalog entirely lose their record too
        let new_ids: HashSet<ObjectId> = order.iter().cloned().collect();
        for gone in self.catalog_ids.difference(&new_ids) {
            records.evict(gone);
        }

        let mut renderable: HashSet<ObjectId> = HashSet::with_capacity(order.len());
        for id in order {
            let Some(object) = latest.remove(&id) else {
                continue;
            };

            let has_record = match &object.elements {
                Some(pair) => records.get(&id, pair).is_some(),
                None => {
                    records.evict(&id);
                    false
                }
            };
            if !has_record && object.usable_report().is_none() {
                report.unresolvable.push(id);
                continue;
            }
            renderable.insert(id.clone());

            match self.entities.get_mut(&id) {
                Some(entity) => {
                    if entity.object != object {
                        memo.invalidate(entity.id);
                        entity.style = DisplayStyle::for_classification(object.classification);
                        entity.object = object;
                        report.updated.push(entity.id);
                    }
                    report.retained += 1;
                }
                None => {
                    let entity_id = EntityId(self.next_id);
                    self.next_id += 1;
                    memo.register(entity_id);
                    self.pick_index.insert(entity_id, id.clone());
                    self.entities.insert(
                        id,
                        RenderEntity {
                            id: entity_id,
                            style: DisplayStyle::for_classification(object.classification),
                            object,
                        },
                    );
                    report.added.push(entity_id);
                }
            }
        }

        let stale: Vec<ObjectId> = self
            .entities
            .keys()
            .filter(|id| !renderable.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(entity) = self.entities.remove(&id) {
                memo.evict(entity.id);
                self.pick_index.remove(entity.id);
                report.removed.push(entity.id);
            }
        }

        self.catalog_ids = new_ids;

        if !report.is_unchanged() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                updated = report.updated.len(),
                unresolvable = report.unresolvable.len(),
                "reconciled {} render entities",
                self.entities.len()
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ReportedPosition;
    use crate::geodesy::GeodeticPosition;
    use crate::record_cache::tests::iss_pair;

    fn reported(lat: f64, lon: f64) -> ReportedPosition {
        ReportedPosition {
            position: GeodeticPosition::new(lat, lon, 500.0),
            observed_at: None,
        }
    }

    fn catalog() -> Vec<TrackedObject> {
        vec![
            TrackedObject::new(ObjectId::Catalog(25544), "ISS").with_elements(iss_pair()),
            TrackedObject::new(ObjectId::Catalog(100), "REPORT ONLY").with_reported(reported(1.0, 2.0)),
            TrackedObject::new(ObjectId::name("GHOST"), "GHOST"),
        ]
    }

    #[test]
    fn test_unresolvable_objects_get_no_entity() {
        let mut lifecycle = EntityLifecycle::new();
        let mut memo = PositionMemoizer::new();
        let mut records = OrbitalRecordCache::new();

        let report = lifecycle.reconcile(catalog(), &mut memo, &mut records);
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.unresolvable, vec![ObjectId::name("GHOST")]);
        assert_eq!(lifecycle.pick_index().len(), 2);
        assert!(!lifecycle.pick_index().contains_object(&ObjectId::name("GHOST")));
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn test_non_finite_report_without_elements_is_unresolvable() {
        let mut lifecycle = EntityLifecycle::new();
        let mut memo = PositionMemoizer::new();
        let mut records = OrbitalRecordCache::new();

        let broken = ReportedPosition {
            position: GeodeticPosition {
                latitude_deg: f64::NAN,
                longitude_deg: 10.0,
                altitude_km: 500.0,
            },
            observed_at: None,
        };
        let objects = vec![TrackedObject::new(ObjectId::Catalog(200), "BROKEN").with_reported(broken)];
        let report = lifecycle.reconcile(objects, &mut memo, &mut records);
        assert!(report.added.is_empty());
        assert_eq!(report.unresolvable, vec![ObjectId::Catalog(200)]);
        assert!(lifecycle.pick_index().is_empty());
        assert!(memo.is_empty());
    }

    #[test]
    fn test_eviction_removes_every_trace() {
        let mut lifecycle = EntityLifecycle::new();
        let mut memo = PositionMemoizer::new();
        let mut records = OrbitalRecordCache::new();
        lifecycle.reconcile(catalog(), &mut memo, &mut records);

        let iss_entity = lifecycle.entity_for(&ObjectId::Catalog(25544)).unwrap().id;
        assert!(records.contains(&ObjectId::Catalog(25544)));

        let report = lifecycle.reconcile(catalog().split_off(1), &mut memo, &mut records);
        assert_eq!(report.removed, vec![iss_entity]);
        assert_eq!(report.retained, 1);
        assert!(lifecycle.pick_index().lookup(iss_entity).is_none());
        assert!(!memo.contains(iss_entity));
        assert!(!records.contains(&ObjectId::Catalog(25544)));
        assert!(lifecycle.entity_for(&ObjectId::Catalog(25544)).is_none());
    }

    #[test]
    fn test_retained_entity_keeps_id_and_tracks_changes() {
        let mut lifecycle = EntityLifecycle::new();
        let mut memo = PositionMemoizer::new();
        let mut records = OrbitalRecordCache::new();
        lifecycle.reconcile(catalog(), &mut memo, &mut records);
        let before = lifecycle.entity_for(&ObjectId::Catalog(100)).unwrap().id;

        let mut refreshed = catalog();
        refreshed[1] = TrackedObject::new(ObjectId::Catalog(100), "REPORT ONLY")
            .with_reported(reported(5.0, 6.0));
        let report = lifecycle.reconcile(refreshed.clone(), &mut memo, &mut records);
        assert_eq!(report.updated, vec![before]);
        assert!(report.added.is_empty());
        assert_eq!(lifecycle.entity_for(&ObjectId::Catalog(100)).unwrap().id, before);

        let report = lifecycle.reconcile(refreshed, &mut memo, &mut records);
        assert!(report.is_unchanged());
    }

    #[test]
    fn test_duplicate_ids_collapse_to_last() {
        let mut lifecycle = EntityLifecycle::new();
        let mut memo = PositionMemoizer::new();
        let mut records = OrbitalRecordCache::new();
        let objects = vec![
            TrackedObject::new(ObjectId::Catalog(1), "FIRST").with_reported(reported(1.0, 1.0)),
            TrackedObject::new(ObjectId::Catalog(1), "SECOND").with_reported(reported(2.0, 2.0)),
        ];
        let report = lifecycle.reconcile(objects, &mut memo, &mut records);
        assert_eq!(report.added.len(), 1);
        assert_eq!(lifecycle.entity_for(&ObjectId::Catalog(1)).unwrap().object.name, "SECOND");
    }

    #[test]
    fn test_empty_catalog_evicts_everything() {
        let mut lifecycle = EntityLifecycle::new();
        let mut memo = PositionMemoizer::new();
        let mut records = OrbitalRecordCache::new();
        lifecycle.reconcile(catalog(), &mut memo, &mut records);

        let report = lifecycle.reconcile(Vec::new(), &mut memo, &mut records);
        assert_eq!(report.removed.len(), 2);
        assert!(lifecycle.is_empty());
        assert!(lifecycle.pick_index().is_empty());
        assert!(memo.is_empty());
        assert!(records.is_empty());
    }
}
