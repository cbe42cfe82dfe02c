//! Catalog input handling.
//!
//! The data-loading layer hands the engine a full list of tracked objects on
//! every refresh. This module defines the canonical [`TrackedObject`] shape and
//! the two ingestion paths into it: 3-line TLE text and loose JSON records.
//! All field-name variants are resolved here, once, by
//! [`RawCatalogRecord::normalize`].

use crate::geodesy::GeodeticPosition;
use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

/// Stable identity of a tracked object.
///
/// A NORAD catalog number is preferred; the name is only used when no number
/// is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Catalog(u32),
    Name(String),
}

impl ObjectId {
    pub fn name(name: &str) -> Self {
        ObjectId::Name(name.trim().to_string())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Catalog(n) => write!(f, "{n}"),
            ObjectId::Name(name) => write!(f, "{name}"),
        }
    }
}

/// The two fixed-format lines of a TLE, without the name line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPair {
    pub line1: String,
    pub line2: String,
}

impl ElementPair {
    pub fn new(line1: &str, line2: &str) -> Self {
        Self {
            line1: line1.trim().to_string(),
            line2: line2.trim().to_string(),
        }
    }

    /// Catalog number from columns 3-7 of line 1, if readable.
    pub fn catalog_number(&self) -> Option<u32> {
        self.line1.get(2..7)?.trim().parse().ok()
    }
}

/// Last externally reported position of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportedPosition {
    pub position: GeodeticPosition,
    /// When the report was taken. Reports without a timestamp are treated as
    /// current at whatever time they are compared.
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub km_per_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Classification {
    Payload,
    RocketBody,
    Debris,
    Station,
    #[default]
    Unknown,
}

impl Classification {
    /// Interprets a catalog classification tag (case-insensitive).
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "payload" | "satellite" | "active" => Classification::Payload,
            "rocket body" | "rocket_body" | "r/b" => Classification::RocketBody,
            "debris" | "deb" => Classification::Debris,
            "station" | "space station" => Classification::Station,
            _ => Classification::Unknown,
        }
    }

    /// Guesses the classification from the usual CelesTrak naming suffixes.
    pub fn from_object_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        if upper.contains(" DEB") {
            Classification::Debris
        } else if upper.contains(" R/B") {
            Classification::RocketBody
        } else if upper.starts_with("ISS ") || upper.contains("TIANGONG") || upper == "CSS" {
            Classification::Station
        } else {
            Classification::Payload
        }
    }
}

/// A catalog entry in canonical form. Read-only input to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: ObjectId,
    pub name: String,
    pub elements: Option<ElementPair>,
    pub reported: Option<ReportedPosition>,
    pub velocity: Option<Velocity>,
    pub classification: Classification,
}

impl TrackedObject {
    pub fn new(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            elements: None,
            reported: None,
            velocity: None,
            classification: Classification::Unknown,
        }
    }

    pub fn with_elements(mut self, elements: ElementPair) -> Self {
        self.elements = Some(elements);
        self
    }

    pub fn with_reported(mut self, reported: ReportedPosition) -> Self {
        self.reported = Some(reported);
        self
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    /// The reported position if it is usable, with longitude normalized.
    ///
    /// A report with any non-finite coordinate counts as no report at all.
    pub fn usable_report(&self) -> Option<ReportedPosition> {
        let reported = self.reported?;
        let p = reported.position;
        if !p.is_finite() {
            return None;
        }
        Some(ReportedPosition {
            position: GeodeticPosition::new(p.latitude_deg, p.longitude_deg, p.altitude_km),
            observed_at: reported.observed_at,
        })
    }
}

/// A catalog record as delivered by the data-loading layer.
///
/// Upstream feeds disagree on field names; the aliases below cover the
/// variants seen in practice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCatalogRecord {
    #[serde(
        default,
        alias = "id",
        alias = "noradId",
        alias = "norad_cat_id",
        alias = "catalog_number"
    )]
    pub norad_id: Option<u32>,
    #[serde(default, alias = "satellite_name", alias = "object_name")]
    pub name: Option<String>,
    #[serde(default, alias = "line1", alias = "tle_line1")]
    pub tle1: Option<String>,
    #[serde(default, alias = "line2", alias = "tle_line2")]
    pub tle2: Option<String>,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lon", alias = "lng")]
    pub longitude: Option<f64>,
    #[serde(default, alias = "alt", alias = "altitude_km")]
    pub altitude: Option<f64>,
    #[serde(default, alias = "last_updated", alias = "observed_at")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "speed")]
    pub velocity: Option<f64>,
    #[serde(default, alias = "object_type", alias = "type")]
    pub classification: Option<String>,
}

impl RawCatalogRecord {
    /// Produces the canonical object.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidInput` when neither a catalog number nor a
    /// name can be found. Every other gap degrades to an absent field.
    pub fn normalize(self) -> EngineResult<TrackedObject> {
        let elements = match (self.tle1.as_deref(), self.tle2.as_deref()) {
            (Some(l1), Some(l2)) if !l1.trim().is_empty() && !l2.trim().is_empty() => {
                Some(ElementPair::new(l1, l2))
            }
            _ => None,
        };

        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let id = match (
            self.norad_id,
            elements.as_ref().and_then(ElementPair::catalog_number),
            name.as_deref(),
        ) {
            (Some(n), _, _) | (None, Some(n), _) => ObjectId::Catalog(n),
            (None, None, Some(name)) => ObjectId::name(name),
            (None, None, None) => {
                return Err(EngineError::InvalidInput(
                    "catalog record has no catalog number or name".to_string(),
                ))
            }
        };

        let reported = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon))
                if lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) =>
            {
                let alt = self.altitude.filter(|a| a.is_finite()).unwrap_or(0.0);
                Some(ReportedPosition {
                    position: GeodeticPosition::new(lat, lon, alt),
                    observed_at: self.timestamp,
                })
            }
            _ => None,
        };

        let classification = match self.classification.as_deref() {
            Some(tag) => Classification::from_tag(tag),
            None => name
                .as_deref()
                .map(Classification::from_object_name)
                .unwrap_or_default(),
        };

        Ok(TrackedObject {
            name: name.unwrap_or_else(|| id.to_string()),
            id,
            elements,
            reported,
            velocity: self
                .velocity
                .filter(|v| v.is_finite())
                .map(|km_per_s| Velocity { km_per_s }),
            classification,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogPayload {
    List(Vec<RawCatalogRecord>),
    Wrapped { satellites: Vec<RawCatalogRecord> },
}

/// Parses a JSON catalog, either a bare array of records or an object with a
/// `satellites` array. Records without any identity are skipped.
///
/// # Errors
/// Returns `EngineError::ParseError` if the text is not a recognised payload.
pub fn parse_catalog_json(text: &str) -> EngineResult<Vec<TrackedObject>> {
    let payload: CatalogPayload = serde_json::from_str(text)
        .map_err(|e| EngineError::ParseError(format!("Failed to parse catalog JSON: {e}")))?;
    let records = match payload {
        CatalogPayload::List(records) => records,
        CatalogPayload::Wrapped { satellites } => satellites,
    };

    let mut objects = Vec::with_capacity(records.len());
    for record in records {
        match record.normalize() {
            Ok(object) => objects.push(object),
            Err(e) => warn!("skipping catalog record: {e}"),
        }
    }
    Ok(objects)
}

/// Parses multi-entry TLE text into tracked objects keyed by catalog number.
///
/// Accepts the 3-line format (name, line 1, line 2) with blank lines between
/// entries, and bare 2-line entries, which are named by their catalog number.
/// Entries whose two lines disagree on the catalog number are skipped.
pub fn parse_tle_catalog(text: &str) -> Vec<TrackedObject> {
    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut objects = Vec::new();
    let mut pending_name: Option<&str> = None;
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if !line.starts_with("1 ") {
            if !line.starts_with("2 ") {
                pending_name = Some(line);
            }
            i += 1;
            continue;
        }

        let Some(line2) = lines.get(i + 1).filter(|l| l.starts_with("2 ")) else {
            debug!("TLE line 1 without line 2: {line}");
            pending_name = None;
            i += 1;
            continue;
        };

        let pair = ElementPair::new(line, line2);
        let id1 = pair.catalog_number();
        let id2 = line2.get(2..7).and_then(|s| s.trim().parse::<u32>().ok());
        match (id1, id2) {
            (Some(a), Some(b)) if a == b => {
                let name = pending_name.map_or_else(|| a.to_string(), str::to_string);
                objects.push(
                    TrackedObject::new(ObjectId::Catalog(a), name.clone())
                        .with_classification(Classification::from_object_name(&name))
                        .with_elements(pair),
                );
            }
            _ => debug!("TLE entry with mismatched catalog numbers skipped"),
        }
        pending_name = None;
        i += 2;
    }

    objects
}
