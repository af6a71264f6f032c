use tracing::{debug, warn};

use super::traverser::{StepOutcome, Traverser};
use crate::midi::NoteSink;
use crate::score::{NodeId, NodeKind, Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub usize);

struct Voice {
    id: VoiceId,
    traverser: Traverser,
}

/// Guard against a pathological graph bouncing a voice between meta
/// boundaries forever within a single tick.
const MAX_HANDOFFS_PER_TICK: usize = 32;

/// The set of live voices for one playback session. Each voice owns
/// exactly one active traverser at a time; meta delegation swaps the
/// traverser record for that voice rather than nesting calls.
pub struct Ensemble {
    voices: Vec<Voice>,
    ratio: f64,
}

impl Ensemble {
    /// One voice per prime node.
    pub fn from_primes(primes: &[NodeId], ratio: f64) -> Self {
        let voices = primes
            .iter()
            .enumerate()
            .map(|(i, &node)| Voice {
                id: VoiceId(i),
                traverser: Traverser::new(node),
            })
            .collect();
        Self { voices, ratio }
    }

    /// Test/bench constructor with caller-supplied traversers.
    pub fn from_traversers(traversers: Vec<Traverser>, ratio: f64) -> Self {
        let voices = traversers
            .into_iter()
            .enumerate()
            .map(|(i, traverser)| Voice {
                id: VoiceId(i),
                traverser,
            })
            .collect();
        Self { voices, ratio }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn all_done(&self) -> bool {
        self.voices.iter().all(|v| v.traverser.is_done())
    }

    pub fn stop_all(&mut self) {
        for voice in &mut self.voices {
            voice.traverser.stop_traverse();
        }
    }

    /// Advances every live voice by one tick. Relative order between
    /// voices is unspecified; nothing may rely on it.
    pub fn tick(&mut self, score: &mut Score, sink: &mut dyn NoteSink) {
        for voice in &mut self.voices {
            let mut handoffs = 0;
            loop {
                let outcome = voice.traverser.tick(score, sink, self.ratio);
                match outcome {
                    StepOutcome::Running | StepOutcome::Finished => break,
                    StepOutcome::EnterMeta { meta, inner_start } => {
                        handoffs += 1;
                        let mut scope = voice.traverser.scope().to_vec();
                        scope.push(meta);
                        let last = voice.traverser.take_last_event();
                        let rng = voice.traverser.rng_fork();
                        debug!(voice = voice.id.0, ?meta, ?inner_start, "entering meta node");
                        voice.traverser = Traverser::spawn(scope, inner_start, last, false, rng);
                    }
                    StepOutcome::ExitMeta { meta } => {
                        handoffs += 1;
                        let scope = voice.traverser.scope();
                        let parent: Vec<NodeId> = scope[..scope.len() - 1].to_vec();
                        let last = voice.traverser.take_last_event();
                        let rng = voice.traverser.rng_fork();

                        // The meta is open for a fresh entry again.
                        if let Some(graph) = score.scope_graph_mut(&parent) {
                            if let Some(node) = graph.node_mut(meta) {
                                if let NodeKind::Meta(m) = node.kind_mut() {
                                    m.current_inner = None;
                                }
                            }
                        }

                        debug!(voice = voice.id.0, ?meta, "leaving meta node");
                        voice.traverser = Traverser::spawn(parent, meta, last, true, rng);
                    }
                }
                if handoffs >= MAX_HANDOFFS_PER_TICK {
                    warn!(voice = voice.id.0, "too many meta handoffs in one tick; stopping voice");
                    voice.traverser.stop_traverse();
                    break;
                }
            }
        }
    }
}
