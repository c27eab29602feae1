//! HL7 FHIR `Provenance` resources, one pretty-printed JSON document per
//! event. Field order follows the struct declarations.
//!
//! A branch that stopped early is reported as an `OperationOutcome` with a
//! warning issue naming the coordinate where it stopped.

use serde::Serialize;
use uuid::Uuid;

use super::{Renderer, text};
use crate::error::ProvenanceError;
use crate::lineage::ChainStop;
use crate::model::{ResolvedEvent, encode_timestamp};

const ACT_REASON_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-ActReason";
const LIFECYCLE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/iso-21089-lifecycle";
const PARTICIPANT_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/provenance-participant-type";
const COORDINATE_SYSTEM: &str = "urn:provtrail:coordinate";
const STEWARD_SYSTEM: &str = "urn:provtrail:steward";

pub struct FhirProvenance;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvenanceResource {
    resource_type: &'static str,
    id: String,
    occurred_date_time: String,
    recorded: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    policy: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Reference>,
    authorization: Vec<CodeableConcept>,
    activity: CodeableConcept,
    based_on: Vec<Reference>,
    target: Vec<Reference>,
    entity: Vec<Entity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    agent: Vec<Agent>,
}

#[derive(Debug, Serialize)]
struct CodeableConcept {
    coding: Vec<Coding>,
}

#[derive(Debug, Serialize)]
struct Coding {
    system: &'static str,
    code: String,
    display: String,
}

#[derive(Debug, Default, Serialize)]
struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display: Option<String>,
}

#[derive(Debug, Serialize)]
struct Identifier {
    system: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct Entity {
    role: &'static str,
    what: Reference,
}

#[derive(Debug, Serialize)]
struct Agent {
    #[serde(rename = "type")]
    kind: CodeableConcept,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    role: Vec<CodeableConcept>,
    who: Reference,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationOutcome {
    resource_type: &'static str,
    issue: Vec<Issue>,
}

#[derive(Debug, Serialize)]
struct Issue {
    severity: &'static str,
    code: &'static str,
    diagnostics: String,
    expression: Vec<String>,
}

fn to_document<T: Serialize>(resource: &T) -> Result<String, ProvenanceError> {
    let mut doc = serde_json::to_string_pretty(resource)?;
    doc.push('\n');
    Ok(doc)
}

fn concept(system: &'static str, code: &str, display: &str) -> CodeableConcept {
    CodeableConcept {
        coding: vec![Coding {
            system,
            code: code.to_string(),
            display: display.to_string(),
        }],
    }
}

/// Stable resource id: the same event always renders with the same id.
fn resource_id(event: &ResolvedEvent) -> Uuid {
    let name = format!(
        "{}|{}.{}.{}|{}|{}",
        event.element_name,
        event.source,
        text(&event.source_variable),
        event.source_reference,
        event.destination_coordinate(),
        encode_timestamp(&event.timestamp),
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

fn agents(event: &ResolvedEvent) -> Vec<Agent> {
    let mut agents = Vec::new();
    if let Some(owner) = &event.owner {
        agents.push(Agent {
            kind: concept(PARTICIPANT_SYSTEM, text(&owner.kind), text(&owner.name)),
            role: vec![concept(PARTICIPANT_SYSTEM, text(&owner.role), text(&owner.name))],
            who: Reference {
                display: owner.name.clone(),
                ..Default::default()
            },
        });
    }
    if let Some(steward) = &event.steward {
        agents.push(Agent {
            kind: concept(PARTICIPANT_SYSTEM, "custodian", text(&steward.kind)),
            role: Vec::new(),
            who: Reference {
                identifier: steward.name.clone().map(|value| Identifier {
                    system: STEWARD_SYSTEM,
                    value,
                }),
                display: steward.role.clone(),
                ..Default::default()
            },
        });
    }
    agents
}

impl Renderer for FhirProvenance {
    fn render_step(&self, event: &ResolvedEvent) -> Result<String, ProvenanceError> {
        let when = encode_timestamp(&event.timestamp);
        let policy = event
            .governance
            .as_ref()
            .map(|sop| {
                format!("{} {}", text(&sop.name), text(&sop.version))
                    .trim()
                    .to_string()
            })
            .filter(|p| !p.is_empty())
            .into_iter()
            .collect();

        let resource = ProvenanceResource {
            resource_type: "Provenance",
            id: resource_id(event).to_string(),
            occurred_date_time: when.clone(),
            recorded: when,
            policy,
            location: event
                .steward
                .as_ref()
                .and_then(|steward| steward.name.clone())
                .map(|name| Reference {
                    display: Some(name),
                    ..Default::default()
                }),
            authorization: vec![concept(
                ACT_REASON_SYSTEM,
                "TRANSRCH",
                "translational healthcare research",
            )],
            activity: concept(
                LIFECYCLE_SYSTEM,
                text(&event.description_of_transformation),
                "Transform",
            ),
            based_on: vec![Reference {
                reference: Some(format!("ServiceRequest/{}", event.element_name)),
                ..Default::default()
            }],
            target: vec![Reference {
                reference: Some(event.destination_coordinate().to_string()),
                display: Some(event.element_name.clone()),
                ..Default::default()
            }],
            entity: vec![Entity {
                role: "derivation",
                what: Reference {
                    identifier: Some(Identifier {
                        system: COORDINATE_SYSTEM,
                        value: format!(
                            "{}.{}.{}",
                            event.source,
                            text(&event.source_variable),
                            event.source_reference
                        ),
                    }),
                    ..Default::default()
                },
            }],
            agent: agents(event),
        };

        to_document(&resource)
    }

    fn render_stop(&self, stop: &ChainStop) -> Result<String, ProvenanceError> {
        let (code, diagnostics) = match stop {
            ChainStop::Cycle { at, depth } => (
                "processing",
                format!("cycle: {at} was reached again at depth {depth}; lineage stops here"),
            ),
            ChainStop::DepthLimit { at, depth } => (
                "incomplete",
                format!("truncated: {at} has further history beyond depth {depth}"),
            ),
        };
        to_document(&OperationOutcome {
            resource_type: "OperationOutcome",
            issue: vec![Issue {
                severity: "warning",
                code,
                diagnostics,
                expression: vec![stop.at().to_string()],
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinate;
    use crate::render::fixtures::pulse_event;
    use serde_json::Value;

    #[test]
    fn test_resource_shape() {
        let doc = FhirProvenance.render_step(&pulse_event()).unwrap();
        let json: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(json["resourceType"], "Provenance");
        assert_eq!(json["recorded"], "2023-01-23T10:00:00Z");
        assert_eq!(json["policy"][0], "SOP z v5");
        assert_eq!(json["activity"]["coding"][0]["code"], "copy");
        assert_eq!(json["target"][0]["reference"], "dwh_vitalis.Pulse.10001");
        assert_eq!(json["entity"][0]["role"], "derivation");
        assert_eq!(
            json["entity"][0]["what"]["identifier"]["value"],
            "stg_sap_vitalis.pulse.1"
        );
        assert_eq!(json["agent"][1]["who"]["identifier"]["value"], "Hr. Koch");
        assert_eq!(json["location"]["display"], "Hr. Koch");
        assert_eq!(json["basedOn"][0]["reference"], "ServiceRequest/pulse");
    }

    #[test]
    fn test_field_order_is_stable() {
        let doc = FhirProvenance.render_step(&pulse_event()).unwrap();
        let resource_type = doc.find("\"resourceType\"").unwrap();
        let recorded = doc.find("\"recorded\"").unwrap();
        let agent = doc.find("\"agent\"").unwrap();
        assert!(resource_type < recorded && recorded < agent);
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = FhirProvenance.render_step(&pulse_event()).unwrap();
        let b = FhirProvenance.render_step(&pulse_event()).unwrap();
        assert_eq!(a, b);

        let mut other = pulse_event();
        other.destination_reference = "10002".into();
        assert_ne!(resource_id(&pulse_event()), resource_id(&other));
    }

    #[test]
    fn test_absent_agents_are_omitted() {
        let mut event = pulse_event();
        event.owner = None;
        event.steward = None;
        event.governance = None;
        let json: Value =
            serde_json::from_str(&FhirProvenance.render_step(&event).unwrap()).unwrap();
        assert!(json.get("agent").is_none());
        assert!(json.get("location").is_none());
        assert!(json.get("policy").is_none());
    }

    #[test]
    fn test_stops_become_operation_outcomes() {
        let cycle = ChainStop::Cycle {
            at: Coordinate::new("A", "v", "1"),
            depth: 1,
        };
        let json: Value =
            serde_json::from_str(&FhirProvenance.render_stop(&cycle).unwrap()).unwrap();
        assert_eq!(json["resourceType"], "OperationOutcome");
        assert_eq!(json["issue"][0]["severity"], "warning");
        assert_eq!(json["issue"][0]["code"], "processing");
        assert_eq!(json["issue"][0]["expression"][0], "A.v.1");
        assert!(json["issue"][0]["diagnostics"].as_str().unwrap().starts_with("cycle"));

        let limit = ChainStop::DepthLimit {
            at: Coordinate::new("B", "v", "2"),
            depth: 3,
        };
        let json: Value =
            serde_json::from_str(&FhirProvenance.render_stop(&limit).unwrap()).unwrap();
        assert_eq!(json["issue"][0]["code"], "incomplete");
        assert_eq!(json["issue"][0]["expression"][0], "B.v.2");
    }
}
