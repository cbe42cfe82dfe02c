//! The session-scoped position engine.
//!
//! One `PositionEngine` is built per visualization session and owns every
//! cache. Renderer frame callbacks go through [`PositionEngine::position_at`],
//! timer callbacks through [`PositionEngine::on_clock_tick`], and catalog
//! refreshes through [`PositionEngine::update_catalog`]. Each call completes
//! its mutation before returning.

use crate::alignment::{AlignmentOffset, AlignmentSample};
use crate::camera::{CameraCorrector, CameraNudge, CameraOrientation};
use crate::catalog::{ObjectId, TrackedObject};
use crate::clock::UpdateCoalescer;
use crate::config::EngineConfig;
use crate::geodesy::CartesianPosition;
use crate::lifecycle::{EntityId, EntityLifecycle, PickIndex, ReconcileReport, RenderEntity};
use crate::memo::{evaluate, PositionMemoizer};
use crate::record_cache::OrbitalRecordCache;
use crate::resolver::propagate;
use crate::selection::{RefreshOutcome, SelectionSnapshot, SelectionState, SelectionSynchronizer};
use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, info};

/// What a committed clock tick recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sim_time: DateTime<Utc>,
    pub alignment: AlignmentOffset,
    pub selection: RefreshOutcome,
}

/// Counts for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogSummary {
    pub catalog_objects: usize,
    pub render_entities: usize,
    pub propagatable: usize,
    pub unresolvable: usize,
    pub element_diagnostics: usize,
}

pub struct PositionEngine {
    records: OrbitalRecordCache,
    memo: PositionMemoizer,
    lifecycle: EntityLifecycle,
    coalescer: UpdateCoalescer,
    selection: SelectionSynchronizer,
    camera: CameraCorrector,
    alignment: AlignmentOffset,
    alignment_generation: u64,
    last_frame_time: Option<DateTime<Utc>>,
    catalog_objects: usize,
    unresolvable: usize,
}

impl Default for PositionEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl PositionEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            records: OrbitalRecordCache::new(),
            memo: PositionMemoizer::new(),
            lifecycle: EntityLifecycle::new(),
            coalescer: UpdateCoalescer::new(config.commit_interval()),
            selection: SelectionSynchronizer::new(config.selection_thresholds()),
            camera: config.camera_corrector(),
            alignment: AlignmentOffset::ZERO,
            alignment_generation: 0,
            last_frame_time: None,
            catalog_objects: 0,
            unresolvable: 0,
        }
    }

    /// Replaces the visible catalog and reconciles every cache against it.
    pub fn update_catalog(&mut self, objects: Vec<TrackedObject>) -> ReconcileReport {
        self.catalog_objects = objects.len();
        let report = self
            .lifecycle
            .reconcile(objects, &mut self.memo, &mut self.records);
        self.unresolvable = report.unresolvable.len();

        if let Some(id) = self.selection.selected_id() {
            if self.lifecycle.entity_for(id).is_none() {
                self.selection.refresh(None);
            }
        }

        if let Some(time) = self.coalescer.current_time() {
            self.recompute_alignment(time);
        }
        report
    }

    /// Position function for the renderer. Any time may be requested, in
    /// any order.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownEntity` if `entity` is not registered.
    /// An unresolvable object yields `Ok(None)`.
    pub fn position_at(
        &mut self,
        entity: EntityId,
        time: DateTime<Utc>,
    ) -> EngineResult<Option<CartesianPosition>> {
        let render_entity = self
            .lifecycle
            .entity(entity)
            .ok_or(EngineError::UnknownEntity(entity))?;
        let record = self.records.peek(&render_entity.object.id);
        let offset = &self.alignment;

        self.memo
            .position_at(entity, time, self.alignment_generation, || {
                evaluate(&render_entity.object, record.as_deref(), offset, time)
            })
    }

    /// Clock callback. Returns a report only when the tick was committed.
    pub fn on_clock_tick(&mut self, now: Instant, sim_time: DateTime<Utc>) -> Option<TickReport> {
        self.last_frame_time = Some(sim_time);
        let tick = self.coalescer.tick(now, sim_time)?;

        self.recompute_alignment(tick.sim_time);
        let selection = self.refresh_selection(tick.sim_time);
        Some(TickReport {
            sim_time: tick.sim_time,
            alignment: self.alignment,
            selection,
        })
    }

    /// Handles a renderer pick. `None` means the user clicked empty space.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownEntity` for a hit id that is not in the
    /// pick index.
    pub fn pick(&mut self, hit: Option<EntityId>) -> EngineResult<Option<&SelectionState>> {
        let Some(hit) = hit else {
            self.selection.deselect();
            return Ok(None);
        };
        let id = self
            .lifecycle
            .pick_index()
            .lookup(hit)
            .cloned()
            .ok_or(EngineError::UnknownEntity(hit))?;
        self.select(&id).map(Some)
    }

    /// Selects an object by identity, effective immediately.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownObject` if the object has no render
    /// entity, or `EngineError::PropagationError` if it cannot be positioned
    /// right now.
    pub fn select(&mut self, id: &ObjectId) -> EngineResult<&SelectionState> {
        let time = self.selection_time();
        let entity = self
            .lifecycle
            .entity_for(id)
            .ok_or_else(|| EngineError::UnknownObject(id.clone()))?;
        let record = self.records.peek(id);
        let snapshot = SelectionSnapshot::derive(entity, record.as_deref(), &self.alignment, time)
            .ok_or_else(|| {
                EngineError::PropagationError(format!("{id} cannot be positioned at {time}"))
            })?;
        Ok(self.selection.select(id.clone(), snapshot))
    }

    pub fn deselect(&mut self) -> Option<SelectionState> {
        self.selection.deselect()
    }

    pub fn selection(&self) -> Option<&SelectionState> {
        self.selection.current()
    }

    pub fn alignment(&self) -> AlignmentOffset {
        self.alignment
    }

    /// Incremented whenever the alignment offset changes value.
    pub fn alignment_generation(&self) -> u64 {
        self.alignment_generation
    }

    /// Camera correction for the current offset, if it exceeds the threshold.
    pub fn camera_nudge(&self, orientation: CameraOrientation) -> Option<CameraNudge> {
        self.camera.correct(orientation, &self.alignment)
    }

    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.coalescer.current_time()
    }

    pub fn entity(&self, hit: EntityId) -> Option<&RenderEntity> {
        self.lifecycle.entity(hit)
    }

    pub fn entity_for(&self, id: &ObjectId) -> Option<&RenderEntity> {
        self.lifecycle.entity_for(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &RenderEntity> {
        self.lifecycle.entities()
    }

    pub fn pick_index(&self) -> &PickIndex {
        self.lifecycle.pick_index()
    }

    pub fn records(&self) -> &OrbitalRecordCache {
        &self.records
    }

    pub fn memo(&self) -> &PositionMemoizer {
        &self.memo
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            catalog_objects: self.catalog_objects,
            render_entities: self.lifecycle.len(),
            propagatable: self
                .lifecycle
                .entities()
                .filter(|e| self.records.peek(&e.object.id).is_some())
                .count(),
            unresolvable: self.unresolvable,
            element_diagnostics: self.records.diagnostics().count(),
        }
    }

    /// Drops every entity, record and the selection.
    pub fn clear(&mut self) {
        self.update_catalog(Vec::new());
        self.records.clear();
        self.selection.deselect();
        self.alignment = AlignmentOffset::ZERO;
        self.alignment_generation += 1;
        self.coalescer.reset();
    }

    fn selection_time(&self) -> DateTime<Utc> {
        self.last_frame_time
            .or_else(|| self.coalescer.current_time())
            .unwrap_or_else(Utc::now)
    }

    fn alignment_samples(&self, time: DateTime<Utc>) -> Vec<AlignmentSample> {
        self.lifecycle
            .entities()
            .filter_map(|entity| {
                let reported = entity.object.usable_report()?;
                let record = self.records.peek(&entity.object.id)?;
                let sample_time = reported.observed_at.unwrap_or(time);
                match propagate(&record, sample_time) {
                    Ok(propagated) => Some(AlignmentSample {
                        propagated,
                        reported: reported.position,
                    }),
                    Err(e) => {
                        debug!(object = %entity.object.id, "no alignment sample: {e}");
                        None
                    }
                }
            })
            .collect()
    }

    fn recompute_alignment(&mut self, time: DateTime<Utc>) {
        let offset = AlignmentOffset::estimate(self.alignment_samples(time));
        if offset != self.alignment {
            self.alignment = offset;
            self.alignment_generation += 1;
        }

        // The intent of this offset is unverified; keep its magnitude visible
        if offset.exceeds(self.camera.threshold_deg) {
            info!(
                lat_bias_deg = offset.lat_bias_deg,
                lon_bias_deg = offset.lon_bias_deg,
                samples = offset.sample_count,
                "alignment offset magnitude {:.4} deg",
                offset.magnitude()
            );
        } else {
            debug!(
                lat_bias_deg = offset.lat_bias_deg,
                lon_bias_deg = offset.lon_bias_deg,
                samples = offset.sample_count,
                "alignment offset magnitude {:.4} deg",
                offset.magnitude()
            );
        }
    }

    fn refresh_selection(&mut self, time: DateTime<Utc>) -> RefreshOutcome {
        let Some(id) = self.selection.selected_id() else {
            return RefreshOutcome::Idle;
        };
        let latest = match self.lifecycle.entity_for(id) {
            None => None,
            Some(entity) => {
                let record = self.records.peek(id);
                match SelectionSnapshot::derive(entity, record.as_deref(), &self.alignment, time) {
                    Some(snapshot) => Some(snapshot),
                    // Still present, just not positionable at this instant
                    None => return RefreshOutcome::Unchanged,
                }
            }
        };
        self.selection.refresh(latest)
    }
}
