//! In-memory entity store for tests and ephemeral catalogs.
//!
//! Does not persist across process restarts.

use std::collections::HashMap;

use super::EntityStore;
use crate::attributes::{GovernanceAttrs, PartyAttrs, ScriptAttrs};
use crate::error::StoreError;
use crate::model::{
    Coordinate, EntityId, EntityKind, KeyValue, NaturalKey, ResolvedEvent, decode_timestamp,
};

/// Rows per kind, in insertion order. Ids are 1-based row positions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<EntityKind, Vec<NaturalKey>>,
    index: HashMap<NaturalKey, EntityId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, kind: EntityKind, id: EntityId) -> Result<&NaturalKey, StoreError> {
        usize::try_from(id.0 - 1)
            .ok()
            .and_then(|i| self.tables.get(&kind)?.get(i))
            .ok_or_else(|| StoreError::corrupt(format!("missing {kind} row {id}")))
    }

    fn optional_row(
        &self,
        kind: EntityKind,
        id: Option<EntityId>,
    ) -> Result<Option<&NaturalKey>, StoreError> {
        id.map(|id| self.row(kind, id)).transpose()
    }

    fn resolve(&self, id: EntityId, event: &NaturalKey) -> Result<ResolvedEvent, StoreError> {
        let element_id = ref_of(event, "dataelement_id")
            .ok_or_else(|| StoreError::corrupt(format!("event {id} has no element")))?;
        let element = self.row(EntityKind::DataElement, element_id)?;
        let store_name = |column: &str| -> Result<String, StoreError> {
            let store_id = ref_of(element, column)
                .ok_or_else(|| StoreError::corrupt(format!("element {element_id} has no {column}")))?;
            Ok(text_of(self.row(EntityKind::DataStore, store_id)?, "name").unwrap_or_default())
        };

        let raw_ts = text_of(event, "timestamp").unwrap_or_default();
        let timestamp = decode_timestamp(&raw_ts)
            .ok_or_else(|| StoreError::corrupt(format!("invalid timestamp {raw_ts:?}")))?;

        let party = |kind: EntityKind, column: &str| -> Result<Option<PartyAttrs>, StoreError> {
            Ok(self
                .optional_row(kind, ref_of(element, column))?
                .map(|row| PartyAttrs {
                    name: text_of(row, "name"),
                    role: text_of(row, "role"),
                    kind: text_of(row, "type"),
                    department: text_of(row, "department"),
                }))
        };

        Ok(ResolvedEvent {
            event_id: id,
            element_id,
            element_name: text_of(element, "name").unwrap_or_default(),
            source: store_name("source_id")?,
            source_variable: text_of(element, "source_variable"),
            source_reference: text_of(event, "source_reference").unwrap_or_default(),
            destination: store_name("destination_id")?,
            destination_variable: text_of(element, "destination_variable"),
            destination_reference: text_of(event, "destination_reference").unwrap_or_default(),
            description_of_transformation: text_of(element, "description_of_transformation"),
            description_of_qualitycheck: text_of(element, "description_of_qualitycheck"),
            quality: text_of(event, "quality").unwrap_or_default(),
            timestamp,
            script: self
                .optional_row(EntityKind::Script, ref_of(element, "script_id"))?
                .map(|row| ScriptAttrs {
                    name: text_of(row, "name"),
                    version: text_of(row, "version"),
                    creator: text_of(row, "creator"),
                }),
            owner: party(EntityKind::DataOwner, "owner_id")?,
            steward: party(EntityKind::DataSteward, "steward_id")?,
            governance: self
                .optional_row(EntityKind::DataGovernance, ref_of(element, "governance_id"))?
                .map(|row| GovernanceAttrs {
                    name: text_of(row, "name"),
                    version: text_of(row, "version"),
                    status: text_of(row, "status"),
                }),
        })
    }
}

fn text_of(row: &NaturalKey, column: &str) -> Option<String> {
    row.get(column).and_then(KeyValue::as_text).map(str::to_string)
}

fn ref_of(row: &NaturalKey, column: &str) -> Option<EntityId> {
    row.get(column).and_then(KeyValue::as_ref_id)
}

impl EntityStore for MemoryStore {
    fn get_or_create(&mut self, key: &NaturalKey) -> Result<(EntityId, bool), StoreError> {
        if let Some(id) = self.index.get(key) {
            return Ok((*id, false));
        }
        let rows = self.tables.entry(key.kind).or_default();
        rows.push(key.clone());
        let id = EntityId(rows.len() as i64);
        self.index.insert(key.clone(), id);
        Ok((id, true))
    }

    fn events_by_destination(&self, coord: &Coordinate) -> Result<Vec<ResolvedEvent>, StoreError> {
        let Some(events) = self.tables.get(&EntityKind::DataProvenance) else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();
        for (i, event) in events.iter().enumerate() {
            if text_of(event, "destination_reference").as_deref() != Some(coord.reference.as_str()) {
                continue;
            }
            let Some(element_id) = ref_of(event, "dataelement_id") else {
                continue;
            };
            let element = self.row(EntityKind::DataElement, element_id)?;
            if text_of(element, "destination_variable").as_deref() != Some(coord.variable.as_str()) {
                continue;
            }
            let Some(destination) = ref_of(element, "destination_id") else {
                continue;
            };
            let store = self.row(EntityKind::DataStore, destination)?;
            if text_of(store, "name").as_deref() != Some(coord.store.as_str()) {
                continue;
            }
            matches.push(self.resolve(EntityId(i as i64 + 1), event)?);
        }
        Ok(matches)
    }

    fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        Ok(self.tables.get(&kind).map_or(0, Vec::len))
    }
}
