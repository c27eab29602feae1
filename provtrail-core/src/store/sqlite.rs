//! SQLite-backed entity store.

use std::path::{Path, PathBuf};

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use super::{EntityStore, schema};
use crate::attributes::{GovernanceAttrs, PartyAttrs, ScriptAttrs};
use crate::error::StoreError;
use crate::model::{
    Coordinate, EntityId, EntityKind, KeyValue, NaturalKey, ResolvedEvent, decode_timestamp,
};

/// Entity store persisted in one SQLite database.
///
/// Owns its connection for its whole lifetime; dropping the store (or
/// calling [`SqliteStore::close`]) releases it.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the provenance database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening provenance database at {:?}", path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Schema {
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory provenance database");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Release the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

fn sql_value(value: &KeyValue) -> Value {
    match value {
        KeyValue::Text(Some(text)) => Value::Text(text.clone()),
        KeyValue::Ref(Some(id)) => Value::Integer(id.0),
        KeyValue::Text(None) | KeyValue::Ref(None) => Value::Null,
    }
}

const EVENTS_BY_DESTINATION: &str = r#"
SELECT p.id, p.source_reference, p.destination_reference, p.quality, p.timestamp,
       e.id, e.name, e.source_variable, e.destination_variable,
       e.description_of_transformation, e.description_of_qualitycheck,
       src.name, dst.name,
       s.id, s.name, s.version, s.creator,
       o.id, o.name, o.role, o.type, o.department,
       st.id, st.name, st.role, st.type, st.department,
       g.id, g.name, g.version, g.status
FROM data_provenance p
JOIN data_element e ON p.dataelement_id = e.id
JOIN data_store dst ON e.destination_id = dst.id
JOIN data_store src ON e.source_id = src.id
LEFT JOIN script s ON e.script_id = s.id
LEFT JOIN data_owner o ON e.owner_id = o.id
LEFT JOIN data_steward st ON e.steward_id = st.id
LEFT JOIN data_governance g ON e.governance_id = g.id
WHERE p.destination_reference = ?1
  AND dst.name = ?2
  AND e.destination_variable = ?3
ORDER BY p.id
"#;

fn party_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Option<PartyAttrs>> {
    if row.get::<_, Option<i64>>(at)?.is_none() {
        return Ok(None);
    }
    Ok(Some(PartyAttrs {
        name: row.get(at + 1)?,
        role: row.get(at + 2)?,
        kind: row.get(at + 3)?,
        department: row.get(at + 4)?,
    }))
}

fn resolved_event(row: &Row<'_>) -> rusqlite::Result<ResolvedEvent> {
    let raw_ts: String = row.get(4)?;
    let timestamp = decode_timestamp(&raw_ts).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("invalid timestamp {raw_ts:?}").into(),
        )
    })?;

    let script = match row.get::<_, Option<i64>>(13)? {
        Some(_) => Some(ScriptAttrs {
            name: row.get(14)?,
            version: row.get(15)?,
            creator: row.get(16)?,
        }),
        None => None,
    };
    let governance = match row.get::<_, Option<i64>>(27)? {
        Some(_) => Some(GovernanceAttrs {
            name: row.get(28)?,
            version: row.get(29)?,
            status: row.get(30)?,
        }),
        None => None,
    };

    Ok(ResolvedEvent {
        event_id: EntityId(row.get(0)?),
        source_reference: row.get(1)?,
        destination_reference: row.get(2)?,
        quality: row.get(3)?,
        timestamp,
        element_id: EntityId(row.get(5)?),
        element_name: row.get(6)?,
        source_variable: row.get(7)?,
        destination_variable: row.get(8)?,
        description_of_transformation: row.get(9)?,
        description_of_qualitycheck: row.get(10)?,
        source: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
        destination: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        script,
        owner: party_at(row, 17)?,
        steward: party_at(row, 22)?,
        governance,
    })
}

impl EntityStore for SqliteStore {
    fn get_or_create(&mut self, key: &NaturalKey) -> Result<(EntityId, bool), StoreError> {
        let table = key.kind.table();
        let columns = key.kind.columns();
        let values: Vec<Value> = key.values.iter().map(sql_value).collect();

        let predicate = columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("\"{col}\" IS ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let select = format!("SELECT id FROM {table} WHERE {predicate} ORDER BY id LIMIT 1");
        let existing = self
            .conn
            .prepare_cached(&select)?
            .query_row(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))
            .optional()?;
        if let Some(id) = existing {
            debug!(table, id, "get_or_create hit");
            return Ok((EntityId(id), false));
        }

        let column_list = columns
            .iter()
            .map(|col| format!("\"{col}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})");
        self.conn
            .prepare_cached(&insert)?
            .execute(params_from_iter(values.iter()))?;
        let id = self.conn.last_insert_rowid();
        debug!(table, id, "get_or_create inserted");
        Ok((EntityId(id), true))
    }

    fn release(self: Box<Self>) -> Result<(), StoreError> {
        SqliteStore::close(*self)
    }

    fn events_by_destination(&self, coord: &Coordinate) -> Result<Vec<ResolvedEvent>, StoreError> {
        let mut stmt = self.conn.prepare_cached(EVENTS_BY_DESTINATION)?;
        let rows = stmt.query_map(
            params![coord.reference, coord.store, coord.variable],
            resolved_event,
        )?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| StoreError::corrupt(format!("negative count in {kind}")))
    }
}
