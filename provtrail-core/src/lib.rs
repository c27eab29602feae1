//! # Provtrail Core
//!
//! Core library for the provtrail provenance catalog.
//! Records element-level data lineage for ETL pipelines: reference entities
//! and data element definitions deduplicated in an entity store, provenance
//! events for individual values, and a lineage resolver that rebuilds the
//! history of any stored value and renders it as log text, Mermaid diagrams
//! or FHIR `Provenance` resources.

pub mod attributes;
pub mod config;
pub mod definition;
pub mod error;
pub mod lineage;
pub mod model;
pub mod provenance;
pub mod registry;
pub mod render;
pub mod store;

// Re-export commonly used types at the crate root.
pub use attributes::{Defaults, GovernanceAttrs, Merge, PartyAttrs, ScriptAttrs};
pub use config::{ProvtrailConfig, load_config};
pub use definition::{DefinitionRequest, EventRequest};
pub use error::{ProvenanceError, Result, StoreError};
pub use lineage::{ChainStop, Lineage, LineageEntry, LineageResolver, LineageStep};
pub use model::{
    Coordinate, DataElement, DataProvenance, EntityId, EntityKind, ResolvedEvent, Stored,
};
pub use provenance::Provenance;
pub use registry::DefinitionRegistry;
pub use render::{Format, Renderer};
pub use store::{EntityStore, MemoryStore, SqliteStore, StoreStats};
