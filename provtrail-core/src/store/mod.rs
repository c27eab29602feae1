//! Entity store: deduplicating persistence for the provenance catalog.
//!
//! Provides a trait-based abstraction with two implementations:
//! - `SqliteStore`: durable storage in an SQLite file (or in-memory database).
//! - `MemoryStore`: plain in-process rows, for tests and throwaway runs.
//!
//! Writes go through `get_or_create` only. Rows are never updated or deleted.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Coordinate, EntityId, EntityKind, NaturalKey, ResolvedEvent};

/// Trait for entity store backends.
///
/// Single writer: dedup checks are not guarded against concurrent callers.
pub trait EntityStore {
    /// Return the row with an identical natural key, inserting it first if
    /// none exists. The flag reports whether this call inserted the row.
    fn get_or_create(&mut self, key: &NaturalKey) -> Result<(EntityId, bool), StoreError>;

    /// All events whose element writes to `coord`, joined with the element,
    /// both stores and every optional reference entity, in insertion order.
    fn events_by_destination(&self, coord: &Coordinate) -> Result<Vec<ResolvedEvent>, StoreError>;

    /// Number of rows of one entity kind.
    fn count(&self, kind: EntityKind) -> Result<usize, StoreError>;

    /// Row counts for every entity kind.
    fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut rows = BTreeMap::new();
        for kind in EntityKind::ALL {
            rows.insert(kind.table().to_string(), self.count(kind)?);
        }
        Ok(StoreStats { rows })
    }

    /// Release the backend's resources. Dropping the store does the same
    /// but swallows errors.
    fn release(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

impl<S: EntityStore + ?Sized> EntityStore for Box<S> {
    fn get_or_create(&mut self, key: &NaturalKey) -> Result<(EntityId, bool), StoreError> {
        (**self).get_or_create(key)
    }

    fn events_by_destination(&self, coord: &Coordinate) -> Result<Vec<ResolvedEvent>, StoreError> {
        (**self).events_by_destination(coord)
    }

    fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        (**self).count(kind)
    }

    fn release(self: Box<Self>) -> Result<(), StoreError> {
        S::release(*self)
    }
}

/// Row counts keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub rows: BTreeMap<String, usize>,
}

impl StoreStats {
    pub fn get(&self, kind: EntityKind) -> usize {
        self.rows.get(kind.table()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.rows.values().sum()
    }
}
