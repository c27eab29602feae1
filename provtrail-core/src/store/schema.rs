//! SQLite schema definitions.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::StoreError;

/// Current schema version for migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Create or migrate the schema.
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating provenance schema v{}", SCHEMA_VERSION);
        conn.execute_batch(TABLES_SCHEMA)?;
        conn.execute_batch(INDEXES_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating provenance schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StoreError::Schema {
            message: format!(
                "database schema v{current_version} is newer than supported v{SCHEMA_VERSION}"
            ),
        });
    }

    Ok(())
}

/// Current schema version, 0 if the database is fresh.
fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

const TABLES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS data_store (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT
);

CREATE TABLE IF NOT EXISTS script (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    version TEXT,
    creator TEXT
);

CREATE TABLE IF NOT EXISTS data_owner (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    role TEXT,
    type TEXT,
    department TEXT
);

CREATE TABLE IF NOT EXISTS data_steward (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    role TEXT,
    type TEXT,
    department TEXT
);

CREATE TABLE IF NOT EXISTS data_governance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    version TEXT,
    status TEXT
);

CREATE TABLE IF NOT EXISTS data_element (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    source_id INTEGER NOT NULL REFERENCES data_store(id),
    source_variable TEXT,
    destination_id INTEGER NOT NULL REFERENCES data_store(id),
    destination_variable TEXT,
    description_of_transformation TEXT,
    description_of_qualitycheck TEXT,
    status_log TEXT,
    script_id INTEGER REFERENCES script(id),
    owner_id INTEGER REFERENCES data_owner(id),
    governance_id INTEGER REFERENCES data_governance(id),
    steward_id INTEGER REFERENCES data_steward(id)
);

CREATE TABLE IF NOT EXISTS data_provenance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dataelement_id INTEGER NOT NULL REFERENCES data_element(id),
    source_reference TEXT NOT NULL,
    destination_reference TEXT NOT NULL,
    quality TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_data_store_name ON data_store(name);
CREATE INDEX IF NOT EXISTS idx_data_element_destination
    ON data_element(destination_id, destination_variable);
CREATE INDEX IF NOT EXISTS idx_data_provenance_destination
    ON data_provenance(destination_reference, dataelement_id);
"#;
