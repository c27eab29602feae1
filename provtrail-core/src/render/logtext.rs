//! Human-readable log sentences, one per event.

use super::{Renderer, text};
use crate::error::ProvenanceError;
use crate::lineage::ChainStop;
use crate::model::ResolvedEvent;

pub struct LogText;

impl Renderer for LogText {
    fn render_step(&self, event: &ResolvedEvent) -> Result<String, ProvenanceError> {
        let script = event.script.clone().unwrap_or_default();
        let steward = event.steward.clone().unwrap_or_default();
        Ok(format!(
            "{}.{}.{} was converted by {} {} to {} by {} {}\n",
            event.source,
            text(&event.source_variable),
            event.source_reference,
            text(&script.name),
            text(&script.version),
            event.destination_coordinate(),
            text(&steward.name),
            text(&steward.role),
        ))
    }

    fn render_stop(&self, stop: &ChainStop) -> Result<String, ProvenanceError> {
        Ok(match stop {
            ChainStop::Cycle { at, .. } => {
                format!("{at} was reached again; lineage stops here (cycle)\n")
            }
            ChainStop::DepthLimit { at, .. } => {
                format!("{at} has further history beyond the depth limit\n")
            }
        })
    }
}
