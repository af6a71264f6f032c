use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{EdgeId, EventKind, NodeEvent, Pitch, Score, ScoreError, choose_event};
use crate::midi::{MidiMessage, NoteDeliveryError, NoteSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Contract between a traverser and anything it can land on. `respond`
/// plays one freshly chosen event and returns it so the caller can
/// carry it forward; `stop` is called on the way out, with whatever the
/// traverser still owes a release for (`None` when the notes should
/// keep sounding past the departure). Both may fail on delivery only;
/// the caller recovers and continues. A meta node's `respond` is
/// inert: it returns the last event unchanged (a rest when there was
/// none) and emits nothing, since delegation happens above this trait.
pub trait Playable {
    fn respond(
        &mut self,
        last_event: Option<&NodeEvent>,
        rng: &mut dyn RngCore,
        sink: &mut dyn NoteSink,
    ) -> Result<NodeEvent, NoteDeliveryError>;

    fn stop(
        &mut self,
        sounding: Option<&NodeEvent>,
        sink: &mut dyn NoteSink,
    ) -> Result<(), NoteDeliveryError>;
}

/// An embedded sub-score. Entering one redirects the traverser to a
/// random prime node inside; leaving a dead end inside redirects it
/// back out along this node's own outbound edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaNode {
    pub inner: Score,
    /// Entry point chosen on first entry; live until the inner
    /// traversal terminates.
    #[serde(skip)]
    pub(crate) current_inner: Option<NodeId>,
}

impl MetaNode {
    pub fn new(inner: Score) -> Self {
        Self {
            inner,
            current_inner: None,
        }
    }

    pub fn current_inner(&self) -> Option<NodeId> {
        self.current_inner
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Simple,
    Meta(MetaNode),
}

/// One stop in a composition: an ordered list of weighted events plus
/// the edges that lead in and out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    x: f64,
    y: f64,
    events: Vec<NodeEvent>,
    edges: Vec<EdgeId>,
    inbound: Vec<EdgeId>,
    outbound: Vec<EdgeId>,
    prime: bool,
    legato: bool,
    kind: NodeKind,
    #[serde(skip)]
    highlighted: bool,
}

impl Node {
    pub(super) fn new(id: NodeId, x: f64, y: f64, kind: NodeKind) -> Self {
        Self {
            id,
            x,
            y,
            // A fresh node plays silence until the editor gives it notes.
            events: vec![NodeEvent::rest()],
            edges: Vec::new(),
            inbound: Vec::new(),
            outbound: Vec::new(),
            prime: false,
            legato: false,
            kind,
            highlighted: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub(super) fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn events(&self) -> &[NodeEvent] {
        &self.events
    }

    /// Replaces the event list. An empty list is rejected and the
    /// current list kept.
    pub fn set_events(&mut self, events: Vec<NodeEvent>) -> Result<(), ScoreError> {
        if events.is_empty() {
            return Err(ScoreError::EmptyEvent);
        }
        self.events = events;
        Ok(())
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn inbound_edges(&self) -> &[EdgeId] {
        &self.inbound
    }

    pub fn outbound_edges(&self) -> &[EdgeId] {
        &self.outbound
    }

    pub fn is_prime(&self) -> bool {
        self.prime
    }

    pub fn set_prime(&mut self, prime: bool) {
        self.prime = prime;
    }

    pub fn is_legato(&self) -> bool {
        self.legato
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.legato = legato;
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Lit up while the node was recently sounded; purely visual.
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub(crate) fn clear_highlight(&mut self) {
        self.highlighted = false;
    }

    /// Registers an incident edge on the correct side of the
    /// inbound/outbound partition.
    pub(super) fn register_edge(&mut self, id: EdgeId, inbound: bool) {
        if inbound {
            self.inbound.push(id);
        } else {
            self.outbound.push(id);
        }
        self.edges.push(id);
    }

    pub(super) fn unregister_edge(&mut self, id: EdgeId) {
        self.edges.retain(|&e| e != id);
        self.inbound.retain(|&e| e != id);
        self.outbound.retain(|&e| e != id);
    }

    fn release(event: &NodeEvent, sink: &mut dyn NoteSink) -> Result<(), NoteDeliveryError> {
        for note in event.notes() {
            if let Pitch::Midi(pitch) = note.pitch() {
                sink.send(MidiMessage::NoteOff {
                    pitch,
                    velocity: note.velocity(),
                })?;
            }
        }
        Ok(())
    }
}

impl Playable for Node {
    fn respond(
        &mut self,
        last_event: Option<&NodeEvent>,
        rng: &mut dyn RngCore,
        sink: &mut dyn NoteSink,
    ) -> Result<NodeEvent, NoteDeliveryError> {
        if let NodeKind::Meta(_) = self.kind {
            // Delegation is the traverser's business; a meta node asked
            // to respond directly hands the last event back, emitting
            // nothing. The signature owes an event, so a missing last
            // event comes back as a rest.
            return Ok(last_event.cloned().unwrap_or_default());
        }

        let Some(event) = choose_event(&self.events, rng).cloned() else {
            return Ok(last_event.cloned().unwrap_or_default());
        };

        match event.kind() {
            EventKind::Rest => {
                // A rest releases whatever the previous event left
                // sounding. With no prior event this is initial
                // silence, which needs nothing released.
                if let Some(last) = last_event {
                    Self::release(last, sink)?;
                }
            }
            EventKind::SingleNote | EventKind::Chord => {
                if self.legato {
                    if let Some(last) = last_event {
                        Self::release(last, sink)?;
                    }
                }
                for note in event.notes() {
                    if let Pitch::Midi(pitch) = note.pitch() {
                        sink.send(MidiMessage::NoteOn {
                            pitch,
                            velocity: note.velocity(),
                        })?;
                    }
                }
            }
        }

        self.highlighted = true;
        Ok(event)
    }

    fn stop(
        &mut self,
        sounding: Option<&NodeEvent>,
        sink: &mut dyn NoteSink,
    ) -> Result<(), NoteDeliveryError> {
        self.highlighted = false;
        if let Some(event) = sounding {
            if event.kind() != EventKind::Rest {
                Self::release(event, sink)?;
            }
        }
        Ok(())
    }
}
