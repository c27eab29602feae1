//! Persisted entity model: reference entities, data element definitions and
//! provenance events, plus the natural keys they are deduplicated on.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{GovernanceAttrs, PartyAttrs, ScriptAttrs};

/// Row identifier assigned by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The seven persisted entity kinds, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    DataStore,
    Script,
    DataOwner,
    DataSteward,
    DataGovernance,
    DataElement,
    DataProvenance,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::DataStore,
        EntityKind::Script,
        EntityKind::DataOwner,
        EntityKind::DataSteward,
        EntityKind::DataGovernance,
        EntityKind::DataElement,
        EntityKind::DataProvenance,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::DataStore => "data_store",
            EntityKind::Script => "script",
            EntityKind::DataOwner => "data_owner",
            EntityKind::DataSteward => "data_steward",
            EntityKind::DataGovernance => "data_governance",
            EntityKind::DataElement => "data_element",
            EntityKind::DataProvenance => "data_provenance",
        }
    }

    /// Natural-key columns, in the order `NaturalKey::values` is laid out.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::DataStore => &["name"],
            EntityKind::Script => &["name", "version", "creator"],
            EntityKind::DataOwner | EntityKind::DataSteward => {
                &["name", "role", "type", "department"]
            }
            EntityKind::DataGovernance => &["name", "version", "status"],
            EntityKind::DataElement => &[
                "name",
                "description",
                "source_id",
                "source_variable",
                "destination_id",
                "destination_variable",
                "description_of_transformation",
                "description_of_qualitycheck",
                "status_log",
                "script_id",
                "owner_id",
                "governance_id",
                "steward_id",
            ],
            EntityKind::DataProvenance => &[
                "dataelement_id",
                "source_reference",
                "destination_reference",
                "quality",
                "timestamp",
            ],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// One nullable natural-key column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Text(Option<String>),
    Ref(Option<EntityId>),
}

impl KeyValue {
    pub fn text(value: &str) -> Self {
        KeyValue::Text(Some(value.to_string()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyValue::Text(v) => v.as_deref(),
            KeyValue::Ref(_) => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<EntityId> {
        match self {
            KeyValue::Ref(v) => *v,
            KeyValue::Text(_) => None,
        }
    }
}

/// The full attribute tuple an entity is deduplicated on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub kind: EntityKind,
    pub values: Vec<KeyValue>,
}

impl NaturalKey {
    pub fn new(kind: EntityKind, values: Vec<KeyValue>) -> Self {
        debug_assert_eq!(kind.columns().len(), values.len());
        Self { kind, values }
    }

    pub fn data_store(name: &str) -> Self {
        Self::new(EntityKind::DataStore, vec![KeyValue::text(name)])
    }

    pub fn script(attrs: &ScriptAttrs) -> Self {
        Self::new(
            EntityKind::Script,
            vec![
                KeyValue::Text(attrs.name.clone()),
                KeyValue::Text(attrs.version.clone()),
                KeyValue::Text(attrs.creator.clone()),
            ],
        )
    }

    /// Owners and stewards share one shape; `kind` picks the table.
    pub fn party(kind: EntityKind, attrs: &PartyAttrs) -> Self {
        debug_assert!(matches!(
            kind,
            EntityKind::DataOwner | EntityKind::DataSteward
        ));
        Self::new(
            kind,
            vec![
                KeyValue::Text(attrs.name.clone()),
                KeyValue::Text(attrs.role.clone()),
                KeyValue::Text(attrs.kind.clone()),
                KeyValue::Text(attrs.department.clone()),
            ],
        )
    }

    pub fn governance(attrs: &GovernanceAttrs) -> Self {
        Self::new(
            EntityKind::DataGovernance,
            vec![
                KeyValue::Text(attrs.name.clone()),
                KeyValue::Text(attrs.version.clone()),
                KeyValue::Text(attrs.status.clone()),
            ],
        )
    }

    /// Column value by name, if the column belongs to this kind.
    pub fn get(&self, column: &str) -> Option<&KeyValue> {
        self.kind
            .columns()
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.values.get(i))
    }
}

/// A persisted record together with its id and whether this call created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: EntityId,
    pub record: T,
    pub created: bool,
}

/// Definition of one variable flowing from a source store to a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataElement {
    pub name: String,
    pub description: Option<String>,
    pub source: EntityId,
    pub source_variable: Option<String>,
    pub destination: EntityId,
    pub destination_variable: Option<String>,
    pub description_of_transformation: Option<String>,
    pub description_of_qualitycheck: Option<String>,
    pub status_log: Option<String>,
    pub script: Option<EntityId>,
    pub owner: Option<EntityId>,
    pub governance: Option<EntityId>,
    pub steward: Option<EntityId>,
}

impl DataElement {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(
            EntityKind::DataElement,
            vec![
                KeyValue::text(&self.name),
                KeyValue::Text(self.description.clone()),
                KeyValue::Ref(Some(self.source)),
                KeyValue::Text(self.source_variable.clone()),
                KeyValue::Ref(Some(self.destination)),
                KeyValue::Text(self.destination_variable.clone()),
                KeyValue::Text(self.description_of_transformation.clone()),
                KeyValue::Text(self.description_of_qualitycheck.clone()),
                KeyValue::Text(self.status_log.clone()),
                KeyValue::Ref(self.script),
                KeyValue::Ref(self.owner),
                KeyValue::Ref(self.governance),
                KeyValue::Ref(self.steward),
            ],
        )
    }
}

/// One concrete movement of a value by a data element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProvenance {
    pub dataelement: EntityId,
    pub source_reference: String,
    pub destination_reference: String,
    pub quality: String,
    pub timestamp: DateTime<Utc>,
}

impl DataProvenance {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(
            EntityKind::DataProvenance,
            vec![
                KeyValue::Ref(Some(self.dataelement)),
                KeyValue::text(&self.source_reference),
                KeyValue::text(&self.destination_reference),
                KeyValue::text(&self.quality),
                KeyValue::text(&encode_timestamp(&self.timestamp)),
            ],
        )
    }
}

/// Timestamps are stored as RFC 3339 text with full sub-second precision so
/// that the event key survives a round-trip through the store.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

pub fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// A (store, variable, reference) triple addressing one stored value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub store: String,
    pub variable: String,
    pub reference: String,
}

impl Coordinate {
    pub fn new(
        store: impl Into<String>,
        variable: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            store: store.into(),
            variable: variable.into(),
            reference: reference.into(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.store, self.variable, self.reference)
    }
}

/// A provenance event joined with its element and every referenced entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEvent {
    pub event_id: EntityId,
    pub element_id: EntityId,
    pub element_name: String,
    pub source: String,
    pub source_variable: Option<String>,
    pub source_reference: String,
    pub destination: String,
    pub destination_variable: Option<String>,
    pub destination_reference: String,
    pub description_of_transformation: Option<String>,
    pub description_of_qualitycheck: Option<String>,
    pub quality: String,
    pub timestamp: DateTime<Utc>,
    pub script: Option<ScriptAttrs>,
    pub owner: Option<PartyAttrs>,
    pub steward: Option<PartyAttrs>,
    pub governance: Option<GovernanceAttrs>,
}

impl ResolvedEvent {
    /// Where the moved value came from. `None` when the element has no
    /// source variable, which ends the chain.
    pub fn source_coordinate(&self) -> Option<Coordinate> {
        self.source_variable
            .as_ref()
            .map(|var| Coordinate::new(&self.source, var, &self.source_reference))
    }

    pub fn destination_coordinate(&self) -> Coordinate {
        Coordinate::new(
            &self.destination,
            self.destination_variable.clone().unwrap_or_default(),
            &self.destination_reference,
        )
    }
}
