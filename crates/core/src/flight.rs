//! Flight-log domain types: the section catalog and the telemetry document.
//!
//! An uploaded log is a JSON object keyed by section name. Only the eight
//! sections in [`SectionId`] are ever offered to the router; every other key
//! is kept as-is but can never be selected.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;

/// One recognized telemetry section.
///
/// Declaration order is catalog order; `Ord` follows it, so a
/// [`SectionSet`] always iterates in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionId {
    FlightModeChanges,
    Events,
    Mission,
    Attitude,
    Trajectories,
    TextMessages,
    Params,
    Vehicle,
}

/// An ordered set of sections.
pub type SectionSet = BTreeSet<SectionId>;

impl SectionId {
    /// The full catalog, in order.
    pub const ALL: [SectionId; 8] = [
        SectionId::FlightModeChanges,
        SectionId::Events,
        SectionId::Mission,
        SectionId::Attitude,
        SectionId::Trajectories,
        SectionId::TextMessages,
        SectionId::Params,
        SectionId::Vehicle,
    ];

    /// Wire name as it appears in uploaded documents.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionId::FlightModeChanges => "flightModeChanges",
            SectionId::Events => "events",
            SectionId::Mission => "mission",
            SectionId::Attitude => "attitude",
            SectionId::Trajectories => "trajectories",
            SectionId::TextMessages => "textMessages",
            SectionId::Params => "params",
            SectionId::Vehicle => "vehicle",
        }
    }

    /// Structural description of the section's payload.
    pub fn description(self) -> &'static str {
        match self {
            SectionId::FlightModeChanges => "list of [time (in milliseconds), flightMode]",
            SectionId::Events => "list of [time (in milliseconds), event]",
            SectionId::Mission => "list of [latitude, longitude, altitude]",
            SectionId::Attitude => {
                "dictionary mapping { time (in milliseconds): [roll, pitch, yaw] }"
            }
            SectionId::Trajectories => {
                "list of [longitude, latitude, relative altitude, time (in milliseconds)]"
            }
            SectionId::TextMessages => {
                "list of [time (in milliseconds), severity, text_message] where severity is \
                 0=emergency, 1=alert, 2=critical, 3=error, 4=warning, 5=notice, 6=info, 7=debug"
            }
            SectionId::Params => {
                "dictionary mapping { values: {param: initial_value}, \
                 changeArray: [[time (in milliseconds), param, value]] }"
            }
            SectionId::Vehicle => "string describing vehicle type (e.g., 'quadcopter')",
        }
    }

    /// Every section in the catalog.
    pub fn catalog() -> SectionSet {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown telemetry section: {s}"))
    }
}

/// The description block sent to the router: one `name: shape` line per section.
pub fn section_descriptions() -> String {
    SectionId::ALL
        .iter()
        .map(|id| format!("{}: {}", id.as_str(), id.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comma-separated section names, in catalog order.
pub fn join_sections<'a>(sections: impl IntoIterator<Item = &'a SectionId>) -> String {
    sections
        .into_iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A parsed flight log. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryDocument {
    sections: Map<String, Value>,
}

impl TelemetryDocument {
    /// Build a document from an uploaded JSON value. Only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self, SessionError> {
        match value {
            Value::Object(sections) => Ok(Self { sections }),
            other => Err(SessionError::InvalidDocument(format!(
                "expected a JSON object keyed by section name, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Parse a document from raw JSON text (e.g. a dump file on disk).
    pub fn from_json_str(text: &str) -> Result<Self, SessionError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SessionError::InvalidDocument(e.to_string()))?;
        Self::from_value(value)
    }

    /// Top-level keys as received.
    pub fn keys(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    pub fn get(&self, section: SectionId) -> Option<&Value> {
        self.sections.get(section.as_str())
    }

    /// Catalog sections that are actually present in this document.
    pub fn present_sections(&self) -> SectionSet {
        SectionId::ALL
            .into_iter()
            .filter(|id| self.sections.contains_key(id.as_str()))
            .collect()
    }

    /// Restrict the document to `sections`.
    ///
    /// Every requested section gets an entry; missing ones map to `null`.
    pub fn slice(&self, sections: &SectionSet) -> Map<String, Value> {
        sections
            .iter()
            .map(|id| {
                let data = self.get(*id).cloned().unwrap_or(Value::Null);
                (id.as_str().to_string(), data)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
