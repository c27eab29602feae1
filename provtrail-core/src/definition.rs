//! Request types for registering data element definitions and recording
//! provenance events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{GovernanceAttrs, PartyAttrs, ScriptAttrs};
use crate::error::ProvenanceError;

/// Everything `add_definition` accepts. Only `id`, `name`, `source` and
/// `destination` are required; the attribute groups override the defaults
/// field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRequest {
    pub id: String,
    pub name: String,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_variable: Option<String>,
    #[serde(default)]
    pub destination_variable: Option<String>,
    #[serde(default)]
    pub description_of_transformation: Option<String>,
    #[serde(default)]
    pub description_of_qualitycheck: Option<String>,
    #[serde(default)]
    pub status_log: Option<String>,
    #[serde(default)]
    pub script: ScriptAttrs,
    #[serde(default)]
    pub owner: PartyAttrs,
    #[serde(default)]
    pub steward: PartyAttrs,
    #[serde(default, alias = "sop")]
    pub governance: GovernanceAttrs,
}

impl DefinitionRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn source_variable(mut self, variable: impl Into<String>) -> Self {
        self.source_variable = Some(variable.into());
        self
    }

    pub fn destination_variable(mut self, variable: impl Into<String>) -> Self {
        self.destination_variable = Some(variable.into());
        self
    }

    pub fn transformation(mut self, description: impl Into<String>) -> Self {
        self.description_of_transformation = Some(description.into());
        self
    }

    pub fn quality_check(mut self, description: impl Into<String>) -> Self {
        self.description_of_qualitycheck = Some(description.into());
        self
    }

    pub fn status_log(mut self, status: impl Into<String>) -> Self {
        self.status_log = Some(status.into());
        self
    }

    pub fn script(mut self, script: ScriptAttrs) -> Self {
        self.script = script;
        self
    }

    pub fn owner(mut self, owner: PartyAttrs) -> Self {
        self.owner = owner;
        self
    }

    pub fn steward(mut self, steward: PartyAttrs) -> Self {
        self.steward = steward;
        self
    }

    pub fn governance(mut self, governance: GovernanceAttrs) -> Self {
        self.governance = governance;
        self
    }

    /// Reject requests missing a required field.
    pub fn validate(&self) -> Result<(), ProvenanceError> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("source", &self.source),
            ("destination", &self.destination),
        ] {
            if value.trim().is_empty() {
                return Err(ProvenanceError::missing_field(field));
            }
        }
        Ok(())
    }
}

/// One movement of one value, as passed to `make_provenance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    pub source_reference: String,
    pub destination_reference: String,
    pub quality: String,
    pub timestamp: DateTime<Utc>,
}

impl EventRequest {
    pub fn new(
        source_reference: impl Into<String>,
        destination_reference: impl Into<String>,
        quality: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source_reference: source_reference.into(),
            destination_reference: destination_reference.into(),
            quality: quality.into(),
            timestamp,
        }
    }

    /// Event stamped with the current time.
    pub fn now(
        source_reference: impl Into<String>,
        destination_reference: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self::new(source_reference, destination_reference, quality, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let req = DefinitionRequest::new("pulse", "pulse", "stg_sap_vitalis", "dwh_vitalis")
            .source_variable("pulse")
            .destination_variable("Pulse")
            .transformation("copy")
            .quality_check("range check 40-150");
        assert_eq!(req.destination_variable.as_deref(), Some("Pulse"));
        assert_eq!(req.description_of_qualitycheck.as_deref(), Some("range check 40-150"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let req = DefinitionRequest::new("pulse", "pulse", "stg", " ");
        assert!(matches!(
            req.validate(),
            Err(ProvenanceError::MissingField { field: "destination" })
        ));
        let req = DefinitionRequest::new("", "pulse", "stg", "dwh");
        assert!(matches!(
            req.validate(),
            Err(ProvenanceError::MissingField { field: "id" })
        ));
    }

    #[test]
    fn test_deserialize_with_sop_alias() {
        let req: DefinitionRequest = toml::from_str(
            r#"
id = "patid"
name = "patid"
source = "stg_sap_vitalis"
destination = "dwh_vitalis"

[sop]
name = "SOP xy"
version = "v1"
"#,
        )
        .unwrap();
        assert_eq!(req.governance.name.as_deref(), Some("SOP xy"));
        assert!(req.script.name.is_none());
    }
}
