//! Lineage resolution: rebuilds the backward chain of events that produced a
//! value by matching each event's source coordinate against the destination
//! coordinates of earlier events.
//!
//! The walk is depth-first and most-recent-first. It keeps the coordinates on
//! the current path in a set; reaching one of them again records a cycle
//! stop instead of descending. Shared ancestors reached through different
//! branches are not cycles and are walked once per branch.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProvenanceError;
use crate::model::{Coordinate, ResolvedEvent};
use crate::store::EntityStore;

/// One rendered step of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageStep {
    /// 0 for events writing the queried coordinate, +1 per hop back.
    pub depth: usize,
    pub event: ResolvedEvent,
}

/// Why a branch stopped before reaching its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainStop {
    /// The branch led back to a coordinate already on its path.
    Cycle { at: Coordinate, depth: usize },
    /// The configured depth limit was hit while history remained.
    DepthLimit { at: Coordinate, depth: usize },
}

impl ChainStop {
    pub fn at(&self) -> &Coordinate {
        match self {
            ChainStop::Cycle { at, .. } | ChainStop::DepthLimit { at, .. } => at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageEntry {
    Step(LineageStep),
    Stop(ChainStop),
}

/// Structured lineage of one coordinate, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub target: Coordinate,
    pub entries: Vec<LineageEntry>,
}

impl Lineage {
    pub fn steps(&self) -> impl Iterator<Item = &LineageStep> {
        self.entries.iter().filter_map(|entry| match entry {
            LineageEntry::Step(step) => Some(step),
            LineageEntry::Stop(_) => None,
        })
    }

    pub fn stops(&self) -> impl Iterator<Item = &ChainStop> {
        self.entries.iter().filter_map(|entry| match entry {
            LineageEntry::Stop(stop) => Some(stop),
            LineageEntry::Step(_) => None,
        })
    }

    /// No recorded history for the target.
    pub fn is_empty(&self) -> bool {
        self.steps().next().is_none()
    }

    pub fn is_cyclic(&self) -> bool {
        self.stops().any(|s| matches!(s, ChainStop::Cycle { .. }))
    }

    pub fn is_truncated(&self) -> bool {
        self.stops().any(|s| matches!(s, ChainStop::DepthLimit { .. }))
    }
}

enum Frame {
    Visit(Coordinate, usize),
    Emit(Box<ResolvedEvent>, usize),
    Leave(Coordinate),
}

/// Walks the event graph of one store.
pub struct LineageResolver<'a, S: EntityStore + ?Sized> {
    store: &'a S,
    max_depth: Option<usize>,
}

impl<'a, S: EntityStore + ?Sized> LineageResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_depth: None,
        }
    }

    /// Limit chains to `max_depth` steps. `None` walks to the origin.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn resolve(&self, target: &Coordinate) -> Result<Lineage, ProvenanceError> {
        let mut entries = Vec::new();
        let mut on_path: HashSet<Coordinate> = HashSet::from([target.clone()]);
        // Explicit stack so long chains cannot exhaust the call stack.
        let mut stack = vec![Frame::Visit(target.clone(), 0)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Visit(coord, depth) => {
                    let events = self.store.events_by_destination(&coord)?;
                    debug!(%coord, depth, matches = events.len(), "lineage lookup");
                    for event in events.into_iter().rev() {
                        stack.push(Frame::Emit(Box::new(event), depth));
                    }
                }
                Frame::Emit(event, depth) => {
                    let source = event.source_coordinate();
                    entries.push(LineageEntry::Step(LineageStep {
                        depth,
                        event: *event,
                    }));
                    let Some(source) = source else {
                        continue;
                    };
                    if on_path.contains(&source) {
                        warn!(at = %source, "lineage cycle detected, branch stopped");
                        entries.push(LineageEntry::Stop(ChainStop::Cycle {
                            at: source,
                            depth: depth + 1,
                        }));
                        continue;
                    }
                    if self.max_depth.is_some_and(|max| depth + 1 >= max) {
                        if !self.store.events_by_destination(&source)?.is_empty() {
                            warn!(at = %source, "lineage depth limit reached, branch truncated");
                            entries.push(LineageEntry::Stop(ChainStop::DepthLimit {
                                at: source,
                                depth: depth + 1,
                            }));
                        }
                        continue;
                    }
                    on_path.insert(source.clone());
                    stack.push(Frame::Leave(source.clone()));
                    stack.push(Frame::Visit(source, depth + 1));
                }
                Frame::Leave(coord) => {
                    on_path.remove(&coord);
                }
            }
        }

        Ok(Lineage {
            target: target.clone(),
            entries,
        })
    }
}
