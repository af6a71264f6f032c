mod edge;
mod event;
mod graph;
mod node;
mod note;

pub use edge::{Edge, EdgeId};
pub use event::{EventKind, NodeEvent, choose_event};
pub use graph::Score;
pub use node::{MetaNode, Node, NodeId, NodeKind, Playable};
pub use note::{Note, Pitch};

use thiserror::Error;

/// Rejections at the data-model boundary. A rejected mutation leaves
/// the score untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("a node event must contain at least one note")]
    EmptyEvent,
    #[error("node {0:?} is not part of this score")]
    UnknownNode(NodeId),
    #[error("edge {0:?} is not part of this score")]
    UnknownEdge(EdgeId),
    #[error("an edge between these nodes already exists")]
    DuplicateEdge,
}

/// Visual radius of a node; edges start at a node's rim, not its center.
pub const NODE_RADIUS: f64 = 15.0;

/// Gap left between an edge's endpoint and the destination node.
pub const EDGE_MARGIN: f64 = 2.0;

/// How close (in score units) a point must be to hit a node or edge.
pub const CLICK_ACCURACY: f64 = 20.0;
