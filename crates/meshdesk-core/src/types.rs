use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::summarize::{PayloadSummary, Summarized, summarize};

// ─── Entity Types ─────────────────────────────────────────────────

/// Closed set of record categories; each maps to one remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Users,
    Cards,
    Decks,
    Games,
    Actors,
    Agreements,
    Chat,
    Positions,
    Values,
    Capabilities,
}

impl EntityType {
    pub const ALL: [Self; 10] = [
        Self::Users,
        Self::Cards,
        Self::Decks,
        Self::Games,
        Self::Actors,
        Self::Agreements,
        Self::Chat,
        Self::Positions,
        Self::Values,
        Self::Capabilities,
    ];

    /// Types the database explorer subscribes to when none are configured.
    pub const EXPLORER_DEFAULT: [Self; 8] = [
        Self::Users,
        Self::Cards,
        Self::Decks,
        Self::Games,
        Self::Actors,
        Self::Agreements,
        Self::Chat,
        Self::Positions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Cards => "cards",
            Self::Decks => "decks",
            Self::Games => "games",
            Self::Actors => "actors",
            Self::Agreements => "agreements",
            Self::Chat => "chat",
            Self::Positions => "positions",
            Self::Values => "values",
            Self::Capabilities => "capabilities",
        }
    }

    /// Name of the remote collection holding records of this type.
    pub fn collection(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| CoreError::UnknownEntityType(s.to_owned()))
    }
}

// ─── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),
}

// ─── Records ──────────────────────────────────────────────────────

/// Field name used when a store value is a scalar rather than a keyed node.
pub const SCALAR_FIELD: &str = "value";

/// One observed record of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub entity_type: EntityType,
    pub fields: Map<String, Value>,
}

impl EntityRecord {
    /// Build a record from a raw store value. Objects become the field map,
    /// anything else is wrapped under [`SCALAR_FIELD`].
    pub fn from_value(entity_type: EntityType, id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert(SCALAR_FIELD.to_owned(), other);
                map
            }
        };
        Self {
            id: id.into(),
            entity_type,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Current local value of one projected id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ProjectedValue {
    Record(EntityRecord),
    Summary(PayloadSummary),
}

impl ProjectedValue {
    /// Run `value` through the summarizer and wrap the result.
    pub fn project(entity_type: EntityType, id: &str, value: &Value, max_bytes: usize) -> Self {
        match summarize(value, max_bytes) {
            Summarized::Raw(raw) => Self::Record(EntityRecord::from_value(entity_type, id, raw)),
            Summarized::Summary(summary) => Self::Summary(summary),
        }
    }

    pub fn as_record(&self) -> Option<&EntityRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Summary(_) => None,
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, Self::Summary(_))
    }
}

// ─── Change Notifications ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Upserted,
    Removed,
}

/// Emitted once per applied store event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionChange {
    pub entity_type: EntityType,
    pub id: String,
    pub kind: ChangeKind,
    /// Count of events applied by the emitting projection, including this one.
    pub version: u64,
}

// ─── Snapshots ────────────────────────────────────────────────────

/// Owned copy of one projection, ordered by id.
pub type ProjectionSnapshot = BTreeMap<String, ProjectedValue>;

/// Owned copy of every projection in a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Registry-wide count of applied events at snapshot time.
    pub version: u64,
    pub projections: BTreeMap<EntityType, ProjectionSnapshot>,
}

impl RegistrySnapshot {
    pub fn get(&self, entity_type: EntityType) -> Option<&ProjectionSnapshot> {
        self.projections.get(&entity_type)
    }

    pub fn record(&self, entity_type: EntityType, id: &str) -> Option<&EntityRecord> {
        self.projections
            .get(&entity_type)
            .and_then(|p| p.get(id))
            .and_then(ProjectedValue::as_record)
    }

    /// All full (non-summarized) records in entity type, then id order.
    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.projections
            .values()
            .flat_map(|p| p.values())
            .filter_map(ProjectedValue::as_record)
    }

    pub fn total_entries(&self) -> usize {
        self.projections.values().map(BTreeMap::len).sum()
    }
}
