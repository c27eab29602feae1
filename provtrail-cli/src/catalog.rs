//! Catalog manifests: defaults, definitions and events in one TOML file.
//!
//! ```toml
//! [defaults.script]
//! name = "sample_etl.py"
//! version = "v1.9"
//!
//! [[definition]]
//! id = "pulse"
//! name = "pulse"
//! source = "stg_sap_vitalis"
//! source_variable = "pulse"
//! destination = "dwh_vitalis"
//! destination_variable = "Pulse"
//!
//! [[event]]
//! definition = "pulse"
//! source_reference = "1"
//! destination_reference = "10001"
//! quality = "good"
//! timestamp = "2022-05-12T08:30:00Z"
//! ```
//!
//! Definitions are registered before any event is recorded, so events may
//! refer to any definition in the same file.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use provtrail_core::{Defaults, DefinitionRequest, EntityStore, EventRequest, Provenance};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    /// Replaces the defaults in force when present.
    #[serde(default)]
    pub defaults: Option<Defaults>,
    #[serde(default, rename = "definition")]
    pub definitions: Vec<DefinitionRequest>,
    #[serde(default, rename = "event")]
    pub events: Vec<CatalogEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEvent {
    #[serde(alias = "id")]
    pub definition: String,
    pub source_reference: String,
    pub destination_reference: String,
    pub quality: String,
    /// RFC 3339 string; the load time when omitted.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// What a load added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub definitions: usize,
    pub new_elements: usize,
    pub events: usize,
    pub new_events: usize,
}

impl Catalog {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid catalog {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply<S: EntityStore>(self, prov: &mut Provenance<S>) -> anyhow::Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        if let Some(defaults) = self.defaults {
            prov.set_defaults(defaults);
        }

        for definition in self.definitions {
            let id = definition.id.clone();
            let stored = prov
                .add_definition(definition)
                .with_context(|| format!("definition '{id}'"))?;
            summary.definitions += 1;
            summary.new_elements += usize::from(stored.created);
        }

        for event in self.events {
            let request = EventRequest::new(
                event.source_reference,
                event.destination_reference,
                event.quality,
                event.timestamp.unwrap_or_else(Utc::now),
            );
            let stored = prov
                .make_provenance(&event.definition, request)
                .with_context(|| format!("event for '{}'", event.definition))?;
            summary.events += 1;
            summary.new_events += usize::from(stored.created);
        }

        info!(?summary, "catalog loaded");
        Ok(summary)
    }
}
