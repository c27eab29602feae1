//! Output formats for resolved lineage.
//!
//! Each format is a [`Renderer`] turning one resolved event into a chunk of
//! text. The resolver never branches on the format: [`render`] walks the
//! lineage entries and hands each one to the selected renderer.

pub mod fhir;
pub mod logtext;
pub mod mermaid;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProvenanceError;
use crate::lineage::{ChainStop, Lineage, LineageEntry};
use crate::model::ResolvedEvent;

pub use fhir::FhirProvenance;
pub use logtext::LogText;
pub use mermaid::{MermaidFlow, MermaidProv};

/// One lineage output format.
pub trait Renderer {
    /// Emitted once before the first step of the outermost query.
    fn header(&self) -> Option<&'static str> {
        None
    }

    fn render_step(&self, event: &ResolvedEvent) -> Result<String, ProvenanceError>;

    /// Marker for a branch that stopped early at a cycle or the depth limit.
    fn render_stop(&self, stop: &ChainStop) -> Result<String, ProvenanceError>;

    fn footer(&self) -> Option<&'static str> {
        None
    }
}

/// Closed set of supported formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[default]
    #[serde(rename = "logtext", alias = "log")]
    LogText,
    #[serde(rename = "mermaid_flow", alias = "flow-diagram")]
    MermaidFlow,
    #[serde(rename = "mermaid_w3cprov", alias = "lineage-notation", alias = "prov")]
    MermaidProv,
    #[serde(rename = "fhir", alias = "lineage-resource")]
    Fhir,
}

impl Format {
    pub const ALL: [Format; 4] = [
        Format::LogText,
        Format::MermaidFlow,
        Format::MermaidProv,
        Format::Fhir,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Format::LogText => "logtext",
            Format::MermaidFlow => "mermaid_flow",
            Format::MermaidProv => "mermaid_w3cprov",
            Format::Fhir => "fhir",
        }
    }

    pub fn renderer(self) -> &'static dyn Renderer {
        match self {
            Format::LogText => &LogText,
            Format::MermaidFlow => &MermaidFlow,
            Format::MermaidProv => &MermaidProv,
            Format::Fhir => &FhirProvenance,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Format {
    type Err = ProvenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logtext" | "log" => Ok(Format::LogText),
            "mermaid_flow" | "flow-diagram" => Ok(Format::MermaidFlow),
            "mermaid_w3cprov" | "lineage-notation" | "prov" => Ok(Format::MermaidProv),
            "fhir" | "lineage-resource" => Ok(Format::Fhir),
            other => Err(ProvenanceError::UnknownFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Render a resolved lineage. An empty lineage renders as an empty string,
/// header included.
pub fn render(lineage: &Lineage, format: Format) -> Result<String, ProvenanceError> {
    if lineage.is_empty() {
        return Ok(String::new());
    }
    let renderer = format.renderer();
    let mut out = String::new();
    if let Some(header) = renderer.header() {
        out.push_str(header);
    }
    for entry in &lineage.entries {
        match entry {
            LineageEntry::Step(step) => out.push_str(&renderer.render_step(&step.event)?),
            LineageEntry::Stop(stop) => out.push_str(&renderer.render_stop(stop)?),
        }
    }
    if let Some(footer) = renderer.footer() {
        out.push_str(footer);
    }
    Ok(out)
}

/// Absent joined values render as empty text.
pub(crate) fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::LineageStep;
    use crate::model::Coordinate;

    #[test]
    fn test_format_keys_and_aliases() {
        for format in Format::ALL {
            assert_eq!(format.key().parse::<Format>().unwrap(), format);
        }
        assert_eq!("flow-diagram".parse::<Format>().unwrap(), Format::MermaidFlow);
        assert_eq!("lineage-notation".parse::<Format>().unwrap(), Format::MermaidProv);
        assert_eq!("lineage-resource".parse::<Format>().unwrap(), Format::Fhir);
        assert!(matches!(
            "xml".parse::<Format>(),
            Err(ProvenanceError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn test_empty_lineage_has_no_header() {
        let lineage = Lineage {
            target: Coordinate::new("dwh", "v", "1"),
            entries: Vec::new(),
        };
        assert_eq!(render(&lineage, Format::MermaidFlow).unwrap(), "");
    }

    #[test]
    fn test_header_emitted_once() {
        let event = fixtures::pulse_event();
        let step = |depth| {
            LineageEntry::Step(LineageStep {
                depth,
                event: event.clone(),
            })
        };
        let lineage = Lineage {
            target: event.destination_coordinate(),
            entries: vec![step(0), step(1)],
        };
        let out = render(&lineage, Format::MermaidFlow).unwrap();
        assert!(out.starts_with("graph TD\n"));
        assert_eq!(out.matches("graph TD").count(), 1);
    }

    #[test]
    fn test_formats_carry_same_facts() {
        let event = fixtures::pulse_event();
        let lineage = Lineage {
            target: event.destination_coordinate(),
            entries: vec![LineageEntry::Step(LineageStep { depth: 0, event })],
        };
        let log = render(&lineage, Format::LogText).unwrap();
        let flow = render(&lineage, Format::MermaidFlow).unwrap();
        assert_ne!(log, flow);
        for fact in [
            "stg_sap_vitalis.pulse.1",
            "dwh_vitalis.Pulse.10001",
            "sample_etl.py",
            "v1.9",
            "Hr. Koch",
            "Data Steward",
        ] {
            assert!(log.contains(fact), "logtext missing {fact}");
            assert!(flow.contains(fact), "flow diagram missing {fact}");
        }
    }
}
