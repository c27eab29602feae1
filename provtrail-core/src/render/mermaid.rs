//! Mermaid graph definitions: a plain flowchart and a W3C PROV style
//! used / generated / associated / derived view.
//!
//! Node ids are derived from the coordinates they stand for, so the
//! destination of one step and the source of the next are the same node.
//! The encoding is injective: ASCII letters and digits are kept, `_` is
//! doubled, any other character becomes `_<hex codepoint>_` and coordinate
//! parts are joined by `_x`. Labels are always quoted; free text never has
//! to be valid Mermaid.

use std::fmt::Write;

use super::{Renderer, text};
use crate::error::ProvenanceError;
use crate::lineage::ChainStop;
use crate::model::{Coordinate, ResolvedEvent};

const GRAPH_HEADER: &str = "graph TD\n";

pub struct MermaidFlow;

pub struct MermaidProv;

const PART_SEPARATOR: &str = "_x";

fn encode_into(id: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            c if c.is_ascii_alphanumeric() => id.push(c),
            '_' => id.push_str("__"),
            c => {
                let _ = write!(id, "_{:x}_", u32::from(c));
            }
        }
    }
}

fn node_id(prefix: &str, parts: &[&str]) -> String {
    let mut id = String::from(prefix);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            id.push_str(PART_SEPARATOR);
        }
        encode_into(&mut id, part);
    }
    id
}

fn label(raw: &str) -> String {
    raw.replace('#', "#35;").replace('"', "#quot;")
}

fn value_node(coord: &Coordinate) -> String {
    node_id(
        "v_",
        &[
            coord.store.as_str(),
            coord.variable.as_str(),
            coord.reference.as_str(),
        ],
    )
}

fn source_coordinate(event: &ResolvedEvent) -> Coordinate {
    Coordinate::new(
        &event.source,
        text(&event.source_variable),
        &event.source_reference,
    )
}

fn script_label(event: &ResolvedEvent) -> String {
    let script = event.script.clone().unwrap_or_default();
    format!("{} {}", text(&script.name), text(&script.version))
}

fn steward_label(event: &ResolvedEvent) -> String {
    let steward = event.steward.clone().unwrap_or_default();
    format!("{} {}", text(&steward.name), text(&steward.role))
}

fn stop_comment(stop: &ChainStop) -> String {
    match stop {
        ChainStop::Cycle { at, .. } => format!("    %% cycle at {at}\n"),
        ChainStop::DepthLimit { at, .. } => format!("    %% truncated at {at}\n"),
    }
}

impl Renderer for MermaidFlow {
    fn header(&self) -> Option<&'static str> {
        Some(GRAPH_HEADER)
    }

    fn render_step(&self, event: &ResolvedEvent) -> Result<String, ProvenanceError> {
        let source = source_coordinate(event);
        let destination = event.destination_coordinate();
        Ok(format!(
            "    {}[\"{}\"] -->|\"{} / {}\"| {}[\"{}\"]\n",
            value_node(&source),
            label(&source.to_string()),
            label(&script_label(event)),
            label(&steward_label(event)),
            value_node(&destination),
            label(&destination.to_string()),
        ))
    }

    fn render_stop(&self, stop: &ChainStop) -> Result<String, ProvenanceError> {
        Ok(stop_comment(stop))
    }
}

impl Renderer for MermaidProv {
    fn header(&self) -> Option<&'static str> {
        Some(GRAPH_HEADER)
    }

    fn render_step(&self, event: &ResolvedEvent) -> Result<String, ProvenanceError> {
        let source = source_coordinate(event);
        let destination = event.destination_coordinate();
        let script = script_label(event);
        let steward = steward_label(event);

        let activity = format!(
            "{}[\"{}\"]",
            node_id("act_", &[script.as_str()]),
            label(&script)
        );
        let used = format!("{}([\"{}\"])", value_node(&source), label(&source.to_string()));
        let generated = format!(
            "{}([\"{}\"])",
            value_node(&destination),
            label(&destination.to_string())
        );
        let agent = format!(
            "{}[/\"{}\"\\]",
            node_id("agent_", &[steward.as_str()]),
            label(&steward)
        );

        Ok(format!(
            "    {activity} -->|used| {used}\n\
             \x20   {generated} -->|was generated by| {activity}\n\
             \x20   {activity} -.->|was associated with| {agent}\n\
             \x20   {generated} -->|was derived from| {used}\n"
        ))
    }

    fn render_stop(&self, stop: &ChainStop) -> Result<String, ProvenanceError> {
        Ok(stop_comment(stop))
    }
}
