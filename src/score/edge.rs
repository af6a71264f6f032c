use serde::{Deserialize, Serialize};

use super::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// A directed link between two nodes. Its length is derived from the
/// endpoint positions and is only recomputed on an explicit request
/// (`Score::move_node` / `Score::recompute_edge_length`); there is no
/// implicit observer on node positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    id: EdgeId,
    source: NodeId,
    destination: NodeId,
    length: f64,
}

impl Edge {
    pub(super) fn new(id: EdgeId, source: NodeId, destination: NodeId, length: f64) -> Self {
        Self {
            id,
            source,
            destination,
            length,
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Traversal cost in distance units; a traverser spends
    /// `length / edge_ratio` ticks crossing this edge.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub(super) fn set_length(&mut self, length: f64) {
        self.length = length.max(0.0);
    }
}
