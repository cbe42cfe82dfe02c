//! Selection synchronization.
//!
//! At most one object is selected. Its displayed snapshot is re-derived by
//! identity on each coalesced tick, so it follows catalog refreshes without
//! holding on to any particular entity. The snapshot is only replaced when a
//! field moved by more than its threshold.

use crate::alignment::AlignmentOffset;
use crate::catalog::{Classification, ObjectId};
use crate::geodesy::GeodeticPosition;
use crate::lifecycle::{EntityId, RenderEntity};
use crate::record_cache::OrbitalRecord;
use crate::resolver::{resolve, PositionSource};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Display data for the selected object.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot {
    pub entity: EntityId,
    pub name: String,
    pub classification: Classification,
    pub position: GeodeticPosition,
    pub source: PositionSource,
    pub velocity_km_s: Option<f64>,
    /// Simulated time the snapshot was derived for. Not compared.
    pub as_of: DateTime<Utc>,
}

impl SelectionSnapshot {
    /// Derives a snapshot from an entity's current data, corrected the same
    /// way the renderer's position is. `None` when the object cannot be
    /// positioned at `time`.
    pub fn derive(
        entity: &RenderEntity,
        record: Option<&OrbitalRecord>,
        offset: &AlignmentOffset,
        time: DateTime<Utc>,
    ) -> Option<Self> {
        let resolution = resolve(&entity.object, record, time);
        let source = resolution.source()?;
        let raw = resolution.position()?;
        let position = match source {
            PositionSource::Propagated => offset.apply(raw),
            PositionSource::Reported => raw,
        };
        Some(Self {
            entity: entity.id,
            name: entity.object.name.clone(),
            classification: entity.object.classification,
            position,
            source,
            velocity_km_s: entity.object.velocity.map(|v| v.km_per_s),
            as_of: time,
        })
    }
}

/// Per-field change thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionThresholds {
    pub angle_deg: f64,
    pub altitude_km: f64,
    pub velocity_km_s: f64,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self {
            angle_deg: 1e-6,
            altitude_km: 1e-3,
            velocity_km_s: 1e-6,
        }
    }
}

impl SelectionThresholds {
    fn differs(&self, a: &SelectionSnapshot, b: &SelectionSnapshot) -> bool {
        let velocity_changed = match (a.velocity_km_s, b.velocity_km_s) {
            (Some(x), Some(y)) => (x - y).abs() > self.velocity_km_s,
            (None, None) => false,
            _ => true,
        };
        a.entity != b.entity
            || a.name != b.name
            || a.classification != b.classification
            || a.source != b.source
            || (a.position.latitude_deg - b.position.latitude_deg).abs() > self.angle_deg
            || crate::geodesy::wrap180(a.position.longitude_deg - b.position.longitude_deg).abs()
                > self.angle_deg
            || (a.position.altitude_km - b.position.altitude_km).abs() > self.altitude_km
            || velocity_changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    pub id: ObjectId,
    pub snapshot: SelectionSnapshot,
}

/// Result of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Nothing is selected.
    Idle,
    Unchanged,
    Updated,
    /// The selected identity disappeared.
    Cleared,
}

#[derive(Debug, Default)]
pub struct SelectionSynchronizer {
    state: Option<SelectionState>,
    thresholds: SelectionThresholds,
}

impl SelectionSynchronizer {
    pub fn new(thresholds: SelectionThresholds) -> Self {
        Self {
            state: None,
            thresholds,
        }
    }

    pub fn current(&self) -> Option<&SelectionState> {
        self.state.as_ref()
    }

    pub fn selected_id(&self) -> Option<&ObjectId> {
        self.state.as_ref().map(|s| &s.id)
    }

    /// Selects `id` immediately, replacing any previous selection.
    pub fn select(&mut self, id: ObjectId, snapshot: SelectionSnapshot) -> &SelectionState {
        debug!(object = %id, "selected");
        self.state.insert(SelectionState { id, snapshot })
    }

    pub fn deselect(&mut self) -> Option<SelectionState> {
        self.state.take()
    }

    /// Rebinds the selection to fresh data for the same identity.
    ///
    /// `latest` is `None` when the identity is no longer in the catalog,
    /// which clears the selection.
    pub fn refresh(&mut self, latest: Option<SelectionSnapshot>) -> RefreshOutcome {
        let Some(state) = self.state.as_mut() else {
            return RefreshOutcome::Idle;
        };
        match latest {
            None => {
                debug!(object = %state.id, "selected object evicted");
                self.state = None;
                RefreshOutcome::Cleared
            }
            Some(snapshot) if self.thresholds.differs(&state.snapshot, &snapshot) => {
                state.snapshot = snapshot;
                RefreshOutcome::Updated
            }
            Some(_) => RefreshOutcome::Unchanged,
        }
    }
}
