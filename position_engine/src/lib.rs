//! Position Engine
//!
//! Turns a catalog of tracked orbital objects into render-ready positions.
//!
//! The engine parses two-line element sets once, propagates them with SGP4 on
//! demand, corrects the propagated output by an alignment offset estimated
//! against reported positions, and keeps per-entity memoized positions, a
//! pick index and the current selection consistent across catalog refreshes.

use thiserror::Error;

pub mod alignment;
pub mod camera;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod geodesy;
pub mod lifecycle;
pub mod memo;
pub mod record_cache;
pub mod resolver;
pub mod selection;

pub use alignment::{AlignmentOffset, AlignmentSample};
pub use camera::{CameraCorrector, CameraNudge, CameraOrientation};
pub use catalog::{
    parse_tle_catalog, Classification, ElementPair, ObjectId, RawCatalogRecord, ReportedPosition,
    TrackedObject, Velocity,
};
pub use clock::{CommittedTick, UpdateCoalescer};
pub use config::{ConfigError, EngineConfig};
pub use engine::{CatalogSummary, PositionEngine, TickReport};
pub use geodesy::{CartesianPosition, GeodeticPosition};
pub use lifecycle::{DisplayStyle, EntityId, PickIndex, ReconcileReport, RenderEntity};
pub use record_cache::{OrbitalRecord, OrbitalRecordCache};
pub use resolver::{resolve, Resolution};
pub use selection::{SelectionSnapshot, SelectionState, SelectionSynchronizer};

/// Result type alias for position engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types for position engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("TLEError: {0}")]
    TLEError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("PropagationError: {0}")]
    PropagationError(String),
    #[error("UnknownEntity: {0}")]
    UnknownEntity(EntityId),
    #[error("UnknownObject: {0}")]
    UnknownObject(ObjectId),
    #[error("InvalidInput: {0}")]
    InvalidInput(String),
}
