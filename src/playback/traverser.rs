use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, warn};

use crate::midi::NoteSink;
use crate::score::{EdgeId, NodeEvent, NodeId, NodeKind, Playable, Score};

/// Picks which outbound edge a traverser leaves a node on. Always
/// called with a non-empty slice.
pub trait EdgeSelector: Send {
    fn choose(&mut self, outbound: &[EdgeId], rng: &mut dyn RngCore) -> EdgeId;
}

/// The default strategy: every outbound edge is equally likely.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEdgeSelector;

impl EdgeSelector for UniformEdgeSelector {
    fn choose(&mut self, outbound: &[EdgeId], rng: &mut dyn RngCore) -> EdgeId {
        outbound[rng.gen_range(0..outbound.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NodePlay,
    EdgeWait,
}

/// What one step of a traverser means for the voice that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Still walking; nothing for the owner to do.
    Running,
    /// Reached a dead end at the top level (or was cancelled).
    Finished,
    /// Entered a meta node; the owner should hand this voice to a new
    /// traverser starting at `inner_start` inside `meta`.
    EnterMeta { meta: NodeId, inner_start: NodeId },
    /// Hit a dead end inside `meta`; the owner should hand this voice
    /// to a new traverser continuing along the meta's outbound edges.
    ExitMeta { meta: NodeId },
}

/// One agent walking a score, alternating between playing a node and
/// crossing an edge. Plain data plus a step function; the conductor
/// drives every live traverser once per tick.
pub struct Traverser {
    /// Meta nodes entered to reach the score being walked, outermost
    /// first. Empty at the top level.
    scope: Vec<NodeId>,
    current_node: NodeId,
    current_edge: Option<EdgeId>,
    last_event: Option<NodeEvent>,
    edge_distance: f64,
    phase: Phase,
    done: bool,
    /// Set on traversers that resume at a meta node after its inner
    /// walk ended; the first step goes straight to edge choice.
    skip_respond: bool,
    rng: StdRng,
    selector: Box<dyn EdgeSelector>,
}

impl Traverser {
    pub fn new(start: NodeId) -> Self {
        Self::spawn(Vec::new(), start, None, false, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn seeded(start: NodeId, seed: u64) -> Self {
        Self::spawn(Vec::new(), start, None, false, StdRng::seed_from_u64(seed))
    }

    pub(crate) fn spawn(
        scope: Vec<NodeId>,
        start: NodeId,
        last_event: Option<NodeEvent>,
        skip_respond: bool,
        rng: StdRng,
    ) -> Self {
        Self {
            scope,
            current_node: start,
            current_edge: None,
            last_event,
            edge_distance: 0.0,
            phase: Phase::NodePlay,
            done: false,
            skip_respond,
            rng,
            selector: Box::new(UniformEdgeSelector),
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn EdgeSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn scope(&self) -> &[NodeId] {
        &self.scope
    }

    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    pub fn last_event(&self) -> Option<&NodeEvent> {
        self.last_event.as_ref()
    }

    pub(crate) fn take_last_event(&mut self) -> Option<NodeEvent> {
        self.last_event.take()
    }

    pub(crate) fn rng_fork(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.rng.next_u64())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Cooperative cancellation; every later tick is a no-op. No
    /// note-off is owed for anything still sounding.
    pub fn stop_traverse(&mut self) {
        self.done = true;
    }

    /// Forces the traverser onto another node, ready to play it.
    pub fn set_location(&mut self, node: NodeId) {
        self.current_node = node;
        self.current_edge = None;
        self.edge_distance = 0.0;
        self.phase = Phase::NodePlay;
    }

    /// Advances the agent by one tick: accumulate distance while on an
    /// edge, otherwise play the current node and pick a way out.
    pub fn tick(&mut self, root: &mut Score, sink: &mut dyn NoteSink, ratio: f64) -> StepOutcome {
        if self.done {
            return StepOutcome::Finished;
        }
        let Some(graph) = root.scope_graph_mut(&self.scope) else {
            warn!(node = ?self.current_node, "traverser scope no longer resolves; stopping");
            self.done = true;
            return StepOutcome::Finished;
        };

        if self.phase == Phase::EdgeWait {
            self.edge_distance += ratio;

            let Some(edge) = self.current_edge.and_then(|id| graph.edge(id)) else {
                warn!(node = ?self.current_node, "current edge was removed mid-flight; stopping");
                self.done = true;
                return StepOutcome::Finished;
            };
            if self.edge_distance <= edge.length() {
                // Still in flight; the suspension point of the machine.
                return StepOutcome::Running;
            }

            let destination = edge.destination();
            if let Some(node) = graph.node_mut(self.current_node) {
                // Departure: the node's notes keep sounding until a
                // later event releases them, so nothing is owed here.
                if let Err(e) = node.stop(None, sink) {
                    warn!(error = %e, "note delivery failed on stop");
                }
            }
            debug!(from = ?self.current_node, to = ?destination, "edge crossed");
            self.current_node = destination;
            self.current_edge = None;
            self.edge_distance = 0.0;
            self.phase = Phase::NodePlay;
        }

        debug_assert_eq!(self.phase, Phase::NodePlay);
        self.play_node(graph, sink)
    }

    fn play_node(&mut self, graph: &mut Score, sink: &mut dyn NoteSink) -> StepOutcome {
        let Some(node) = graph.node_mut(self.current_node) else {
            warn!(node = ?self.current_node, "current node was removed; stopping");
            self.done = true;
            return StepOutcome::Finished;
        };

        if self.skip_respond {
            self.skip_respond = false;
        } else if let NodeKind::Meta(meta) = node.kind_mut() {
            if meta.current_inner.is_none() {
                let primes = meta.inner.prime_nodes();
                if primes.is_empty() {
                    // Nothing to delegate to; fall through and treat
                    // the meta as a silent pass-through node.
                    warn!(node = ?self.current_node, "meta node has no prime nodes");
                } else {
                    let entry = primes[self.rng.gen_range(0..primes.len())];
                    meta.current_inner = Some(entry);
                    self.done = true;
                    return StepOutcome::EnterMeta {
                        meta: self.current_node,
                        inner_start: entry,
                    };
                }
            }
            // Already entered (another voice is inside): keep the last
            // event and continue along this node's own outbound edges.
        } else {
            match node.respond(self.last_event.as_ref(), &mut self.rng, sink) {
                Ok(event) => self.last_event = Some(event),
                Err(e) => warn!(error = %e, "note delivery failed on respond"),
            }
        }

        let outbound: Vec<EdgeId> = graph
            .node(self.current_node)
            .map(|n| n.outbound_edges().to_vec())
            .unwrap_or_default();

        if outbound.is_empty() {
            self.done = true;
            if let Some(&meta) = self.scope.last() {
                // Dead end inside a meta node: hand control back to
                // the outer graph without cutting anything short.
                if let Some(node) = graph.node_mut(self.current_node) {
                    if let Err(e) = node.stop(None, sink) {
                        warn!(error = %e, "note delivery failed on stop");
                    }
                }
                return StepOutcome::ExitMeta { meta };
            }
            // The one normal terminal: no outbound edges at the top
            // level. Whatever is still sounding gets cut off here, so
            // compositions are expected to end on a rest.
            if let Some(node) = graph.node_mut(self.current_node) {
                if let Err(e) = node.stop(self.last_event.as_ref(), sink) {
                    warn!(error = %e, "note delivery failed on stop");
                }
            }
            self.last_event = None;
            debug!(node = ?self.current_node, "traversal finished");
            return StepOutcome::Finished;
        }

        let edge = self.selector.choose(&outbound, &mut self.rng);
        self.current_edge = Some(edge);
        self.phase = Phase::EdgeWait;
        StepOutcome::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{CaptureSink, MidiMessage};
    use crate::score::{Note, NodeEvent};

    fn two_node_score() -> (Score, NodeId, NodeId) {
        let mut score = Score::new();
        let a = score.add_node(0.0, 0.0);
        let b = score.add_node(67.0, 0.0); // edge length 50
        score.add_edge(a, b).unwrap();
        (score, a, b)
    }

    #[test]
    fn cancelled_traverser_ignores_ticks() {
        let (mut score, a, _) = two_node_score();
        score
            .node_mut(a)
            .unwrap()
            .set_events(vec![NodeEvent::single(Note::new(60, 100), 1.0)])
            .unwrap();

        let mut sink = CaptureSink::new();
        let mut t = Traverser::seeded(a, 1);
        t.stop_traverse();

        for _ in 0..8 {
            assert_eq!(t.tick(&mut score, &mut sink, 3.125), StepOutcome::Finished);
        }
        assert!(sink.messages.is_empty());
        assert!(t.is_done());
    }

    #[test]
    fn rest_start_emits_nothing() {
        let (mut score, a, _) = two_node_score();
        // Node a keeps its default single rest event.
        let mut sink = CaptureSink::new();
        let mut t = Traverser::seeded(a, 2);

        assert_eq!(t.tick(&mut score, &mut sink, 3.125), StepOutcome::Running);
        assert!(sink.messages.is_empty(), "initial silence releases nothing");
    }

    #[test]
    fn dead_end_finishes_in_the_same_tick() {
        let mut score = Score::new();
        let only = score.add_node(0.0, 0.0);
        score
            .node_mut(only)
            .unwrap()
            .set_events(vec![NodeEvent::single(Note::new(72, 90), 1.0)])
            .unwrap();

        let mut sink = CaptureSink::new();
        let mut t = Traverser::seeded(only, 3);

        assert_eq!(t.tick(&mut score, &mut sink, 3.125), StepOutcome::Finished);
        assert!(t.is_done());
        // Note-on, then the terminal stop cut it short.
        assert_eq!(
            sink.messages,
            vec![
                MidiMessage::NoteOn {
                    pitch: 72,
                    velocity: 90
                },
                MidiMessage::NoteOff {
                    pitch: 72,
                    velocity: 90
                },
            ]
        );

        // Later ticks change nothing.
        assert_eq!(t.tick(&mut score, &mut sink, 3.125), StepOutcome::Finished);
        assert_eq!(sink.messages.len(), 2);
    }

    #[test]
    fn legato_releases_the_previous_event_first() {
        let (mut score, a, b) = two_node_score();
        score
            .node_mut(a)
            .unwrap()
            .set_events(vec![NodeEvent::single(Note::new(60, 100), 1.0)])
            .unwrap();
        let b_node = score.node_mut(b).unwrap();
        b_node
            .set_events(vec![NodeEvent::single(Note::new(64, 80), 1.0)])
            .unwrap();
        b_node.set_legato(true);

        let mut sink = CaptureSink::new();
        let mut t = Traverser::seeded(a, 4);
        // Play a, cross the 50-unit edge, play b.
        for _ in 0..64 {
            t.tick(&mut score, &mut sink, 3.125);
        }

        let on_64 = sink
            .messages
            .iter()
            .position(|m| matches!(m, MidiMessage::NoteOn { pitch: 64, .. }))
            .expect("b sounded");
        let off_60 = sink
            .messages
            .iter()
            .position(|m| matches!(m, MidiMessage::NoteOff { pitch: 60, .. }))
            .expect("a released");
        assert!(off_60 < on_64, "legato releases before sounding");
    }

    #[test]
    fn relocation_resets_to_node_play() {
        let (mut score, a, b) = two_node_score();
        let mut sink = CaptureSink::new();
        let mut t = Traverser::seeded(a, 5);

        t.tick(&mut score, &mut sink, 3.125);
        t.tick(&mut score, &mut sink, 3.125); // in flight on the edge
        t.set_location(b);
        assert_eq!(t.current_node(), b);

        // Next tick plays b (a dead end), so the walk finishes.
        assert_eq!(t.tick(&mut score, &mut sink, 3.125), StepOutcome::Finished);
    }
}
