use serde::{Deserialize, Serialize};

use super::{
    CLICK_ACCURACY, EDGE_MARGIN, Edge, EdgeId, MetaNode, NODE_RADIUS, Node, NodeId, NodeKind,
    ScoreError,
};

/// One composition: the node and edge sets, with the incidence
/// invariants maintained here. Every edge's endpoints are members of
/// the score, and removing a node removes its incident edges first, so
/// a dangling edge never exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    next_node: u32,
    next_edge: u32,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id() == id)
    }

    pub fn add_node(&mut self, x: f64, y: f64) -> NodeId {
        self.insert_node(x, y, NodeKind::Simple)
    }

    pub fn add_meta_node(&mut self, x: f64, y: f64, inner: Score) -> NodeId {
        self.insert_node(x, y, NodeKind::Meta(MetaNode::new(inner)))
    }

    fn insert_node(&mut self, x: f64, y: f64, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.push(Node::new(id, x, y, kind));
        id
    }

    /// Removes a node and every edge incident to it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id() == id)?;
        let incident: Vec<EdgeId> = self.nodes[index].edges().to_vec();
        for edge_id in incident {
            self.remove_edge(edge_id);
        }
        Some(self.nodes.remove(index))
    }

    /// Creates a directed edge. Both endpoints must already belong to
    /// this score, and only one edge may exist per (source,
    /// destination) pair.
    pub fn add_edge(&mut self, source: NodeId, destination: NodeId) -> Result<EdgeId, ScoreError> {
        if self.node(source).is_none() {
            return Err(ScoreError::UnknownNode(source));
        }
        if self.node(destination).is_none() {
            return Err(ScoreError::UnknownNode(destination));
        }
        if self
            .edges
            .iter()
            .any(|e| e.source() == source && e.destination() == destination)
        {
            return Err(ScoreError::DuplicateEdge);
        }

        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        let length = self.length_between(source, destination);
        self.edges.push(Edge::new(id, source, destination, length));

        if source == destination {
            // A self-loop is incident to its node once, on the inbound
            // side, keeping the inbound/outbound partition exact.
            if let Some(node) = self.node_mut(source) {
                node.register_edge(id, true);
            }
        } else {
            if let Some(node) = self.node_mut(source) {
                node.register_edge(id, false);
            }
            if let Some(node) = self.node_mut(destination) {
                node.register_edge(id, true);
            }
        }
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let index = self.edges.iter().position(|e| e.id() == id)?;
        let edge = self.edges.remove(index);
        if let Some(node) = self.node_mut(edge.source()) {
            node.unregister_edge(id);
        }
        if let Some(node) = self.node_mut(edge.destination()) {
            node.unregister_edge(id);
        }
        Some(edge)
    }

    /// Repositions a node and recomputes the length of every edge
    /// incident to it. Length updates only happen here and in
    /// `recompute_edge_length`; nothing watches positions.
    pub fn move_node(&mut self, id: NodeId, x: f64, y: f64) -> Result<(), ScoreError> {
        let node = self.node_mut(id).ok_or(ScoreError::UnknownNode(id))?;
        node.set_position(x, y);
        let incident: Vec<EdgeId> = node.edges().to_vec();
        for edge_id in incident {
            self.recompute_edge_length(edge_id)?;
        }
        Ok(())
    }

    pub fn recompute_edge_length(&mut self, id: EdgeId) -> Result<(), ScoreError> {
        let edge = self.edge(id).ok_or(ScoreError::UnknownEdge(id))?;
        let length = self.length_between(edge.source(), edge.destination());
        if let Some(edge) = self.edges.iter_mut().find(|e| e.id() == id) {
            edge.set_length(length);
        }
        Ok(())
    }

    fn length_between(&self, source: NodeId, destination: NodeId) -> f64 {
        let (Some(a), Some(b)) = (self.node(source), self.node(destination)) else {
            return 0.0;
        };
        let distance = ((a.x() - b.x()).powi(2) + (a.y() - b.y()).powi(2)).sqrt();
        (distance - NODE_RADIUS - EDGE_MARGIN).max(0.0)
    }

    pub fn prime_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_prime())
            .map(Node::id)
            .collect()
    }

    /// Closest node within click accuracy of a point, if any. Editor
    /// hit-testing; traversal never calls this.
    pub fn find_node_near(&self, x: f64, y: f64) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for node in &self.nodes {
            let dist = ((node.x() - x).powi(2) + (node.y() - y).powi(2)).sqrt();
            if dist <= CLICK_ACCURACY && best.map_or(true, |(_, d)| dist < d) {
                best = Some((node.id(), dist));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Closest edge within click accuracy of a point, measured by
    /// point-to-segment distance between the endpoint centers.
    pub fn find_edge_near(&self, x: f64, y: f64) -> Option<EdgeId> {
        let mut best: Option<(EdgeId, f64)> = None;
        for edge in &self.edges {
            let (Some(a), Some(b)) = (self.node(edge.source()), self.node(edge.destination()))
            else {
                continue;
            };
            let dist = segment_distance(a.x(), a.y(), b.x(), b.y(), x, y);
            if dist <= CLICK_ACCURACY && best.map_or(true, |(_, d)| dist < d) {
                best = Some((edge.id(), dist));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Resolves the score a traverser scope addresses: each element of
    /// `scope` names a meta node to descend into.
    pub fn scope_graph(&self, scope: &[NodeId]) -> Option<&Score> {
        match scope.split_first() {
            None => Some(self),
            Some((&meta, rest)) => match self.node(meta)?.kind() {
                NodeKind::Meta(m) => m.inner.scope_graph(rest),
                NodeKind::Simple => None,
            },
        }
    }

    pub fn scope_graph_mut(&mut self, scope: &[NodeId]) -> Option<&mut Score> {
        match scope.split_first() {
            None => Some(self),
            Some((&meta, rest)) => match self.node_mut(meta)?.kind_mut() {
                NodeKind::Meta(m) => m.inner.scope_graph_mut(rest),
                NodeKind::Simple => None,
            },
        }
    }

    /// Clears playback leftovers (highlights, meta entry pointers) on
    /// this score and every embedded one.
    pub fn reset_transients(&mut self) {
        for node in &mut self.nodes {
            node.clear_highlight();
            if let NodeKind::Meta(meta) = node.kind_mut() {
                meta.current_inner = None;
                meta.inner.reset_transients();
            }
        }
    }
}

fn segment_distance(x1: f64, y1: f64, x2: f64, y2: f64, px: f64, py: f64) -> f64 {
    let (dx, dy) = (x2 - x1, y2 - y1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - x1) * dx + (py - y1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (x1 + t * dx, y1 + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_node_plays_silence() {
        let mut score = Score::new();
        let id = score.add_node(0.0, 0.0);
        let node = score.node(id).unwrap();
        assert_eq!(node.events().len(), 1);
        assert_eq!(node.events()[0].kind(), crate::score::EventKind::Rest);
    }

    #[test]
    fn edge_endpoints_must_be_members() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let stranger = NodeId(999);
        assert_eq!(
            score.add_edge(a, stranger),
            Err(ScoreError::UnknownNode(stranger))
        );
        assert!(score.edges().is_empty());
    }

    #[test]
    fn duplicate_edges_are_rejected() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(100.0, 0.0);
        score.add_edge(a, b).unwrap();
        assert_eq!(score.add_edge(a, b), Err(ScoreError::DuplicateEdge));
        // The reverse direction is a different edge.
        assert!(score.add_edge(b, a).is_ok());
    }

    #[test]
    fn edge_registration_partitions_inbound_outbound() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(100.0, 0.0);
        let e = score.add_edge(a, b).unwrap();

        let a_node = score.node(a).unwrap();
        assert_eq!(a_node.outbound_edges(), &[e]);
        assert!(a_node.inbound_edges().is_empty());
        assert_eq!(a_node.edges(), &[e]);

        let b_node = score.node(b).unwrap();
        assert_eq!(b_node.inbound_edges(), &[e]);
        assert!(b_node.outbound_edges().is_empty());
    }

    #[test]
    fn self_loop_registers_on_exactly_one_side() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let e = score.add_edge(a, a).unwrap();

        let node = score.node(a).unwrap();
        assert_eq!(node.edges(), &[e]);
        assert_eq!(node.inbound_edges(), &[e]);
        assert!(node.outbound_edges().is_empty());

        score.remove_edge(e).unwrap();
        assert!(score.node(a).unwrap().edges().is_empty());
    }

    #[test]
    fn removing_a_node_removes_incident_edges() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(100.0, 0.0);
        let c = score.add_node(200.0, 0.0);
        score.add_edge(a, b).unwrap();
        score.add_edge(b, c).unwrap();

        score.remove_node(b).unwrap();

        assert_eq!(score.edges().len(), 0);
        assert!(score.node(a).unwrap().edges().is_empty());
        assert!(score.node(c).unwrap().edges().is_empty());
    }

    #[test]
    fn edge_length_is_distance_minus_radius_and_margin() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(100.0, 0.0);
        let e = score.add_edge(a, b).unwrap();
        let expected = 100.0 - NODE_RADIUS - EDGE_MARGIN;
        assert_eq!(score.edge(e).unwrap().length(), expected);
    }

    #[test]
    fn moving_an_endpoint_recomputes_length_never_negative() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(100.0, 0.0);
        let e = score.add_edge(a, b).unwrap();

        score.move_node(b, 0.0, 50.0).unwrap();
        let expected = 50.0 - NODE_RADIUS - EDGE_MARGIN;
        assert!((score.edge(e).unwrap().length() - expected).abs() < 1e-9);

        // Pushing the endpoints on top of each other clamps at zero.
        score.move_node(b, 1.0, 0.0).unwrap();
        assert_eq!(score.edge(e).unwrap().length(), 0.0);
    }

    #[test]
    fn find_node_near_picks_the_closest_within_accuracy() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(10.0, 0.0);
        assert_eq!(score.find_node_near(7.0, 0.0), Some(b));
        assert_eq!(score.find_node_near(2.0, 0.0), Some(a));
        assert_eq!(score.find_node_near(500.0, 500.0), None);
    }

    #[test]
    fn find_edge_near_uses_segment_distance() {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(200.0, 0.0);
        let e = score.add_edge(a, b).unwrap();
        assert_eq!(score.find_edge_near(100.0, 5.0), Some(e));
        assert_eq!(score.find_edge_near(100.0, 80.0), None);
    }

    #[test]
    fn scope_resolution_descends_into_meta_nodes() {
        let mut inner = Score::new();
        let inner_node = inner.add_node(0.0, 0.0);

        let mut outer = Score::new();
        let meta = outer.add_meta_node(0.0, 0.0, inner);
        let plain = outer.add_node(50.0, 0.0);

        let scoped = outer.scope_graph(&[meta]).unwrap();
        assert!(scoped.node(inner_node).is_some());
        assert!(outer.scope_graph(&[plain]).is_none());
        assert!(outer.scope_graph(&[]).unwrap().node(meta).is_some());
    }
}
