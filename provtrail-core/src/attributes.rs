//! Attribute groups for the reference entities and the default-resolution
//! rule applied when a data element is defined.
//!
//! Every field is nullable. Resolution is field-wise: an explicit value wins,
//! otherwise the default applies, otherwise the field stays absent. Empty
//! strings count as absent on both sides.

use serde::{Deserialize, Serialize};

/// Script that performed a transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptAttrs {
    pub name: Option<String>,
    pub version: Option<String>,
    pub creator: Option<String>,
}

/// Accountable party: used for both data owners and data stewards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyAttrs {
    pub name: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub department: Option<String>,
}

/// Operating procedure in force when the element was processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceAttrs {
    pub name: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
}

/// Field-wise merge of an explicit attribute group over a default one.
pub trait Merge: Sized {
    /// Resolve `self` (explicit) against `default`.
    fn merge(&self, default: &Self) -> Self;

    /// True when no field carries a value. Empty groups are not persisted.
    fn is_empty(&self) -> bool;

    /// Resolve and drop the group entirely if nothing survives.
    fn resolve(&self, default: &Self) -> Option<Self> {
        let merged = self.merge(default);
        (!merged.is_empty()).then_some(merged)
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn pick(explicit: &Option<String>, default: &Option<String>) -> Option<String> {
    present(explicit).or_else(|| present(default))
}

impl ScriptAttrs {
    pub fn new(name: &str, version: &str, creator: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            creator: Some(creator.to_string()),
        }
    }
}

impl Merge for ScriptAttrs {
    fn merge(&self, default: &Self) -> Self {
        Self {
            name: pick(&self.name, &default.name),
            version: pick(&self.version, &default.version),
            creator: pick(&self.creator, &default.creator),
        }
    }

    fn is_empty(&self) -> bool {
        [&self.name, &self.version, &self.creator]
            .into_iter()
            .all(|v| present(v).is_none())
    }
}

impl PartyAttrs {
    pub fn new(name: &str, role: &str, kind: &str, department: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            role: Some(role.to_string()),
            kind: Some(kind.to_string()),
            department: Some(department.to_string()),
        }
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

impl Merge for PartyAttrs {
    fn merge(&self, default: &Self) -> Self {
        Self {
            name: pick(&self.name, &default.name),
            role: pick(&self.role, &default.role),
            kind: pick(&self.kind, &default.kind),
            department: pick(&self.department, &default.department),
        }
    }

    fn is_empty(&self) -> bool {
        [&self.name, &self.role, &self.kind, &self.department]
            .into_iter()
            .all(|v| present(v).is_none())
    }
}

impl GovernanceAttrs {
    pub fn new(name: &str, version: &str, status: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            status: Some(status.to_string()),
        }
    }
}

impl Merge for GovernanceAttrs {
    fn merge(&self, default: &Self) -> Self {
        Self {
            name: pick(&self.name, &default.name),
            version: pick(&self.version, &default.version),
            status: pick(&self.status, &default.status),
        }
    }

    fn is_empty(&self) -> bool {
        [&self.name, &self.version, &self.status]
            .into_iter()
            .all(|v| present(v).is_none())
    }
}

/// Process-wide default attribute groups.
///
/// An immutable value: `add_definition` captures the defaults in force at
/// call time, so replacing them later never touches existing elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub script: ScriptAttrs,
    pub owner: PartyAttrs,
    pub steward: PartyAttrs,
    pub governance: GovernanceAttrs,
}

impl Defaults {
    pub fn with_script(mut self, script: ScriptAttrs) -> Self {
        self.script = script;
        self
    }

    pub fn with_owner(mut self, owner: PartyAttrs) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_steward(mut self, steward: PartyAttrs) -> Self {
        self.steward = steward;
        self
    }

    pub fn with_governance(mut self, governance: GovernanceAttrs) -> Self {
        self.governance = governance;
        self
    }
}
