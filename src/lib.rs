//! A generative sequencing engine. A directed graph of musical nodes
//! is walked by one or more concurrent traversers that make weighted
//! random choices at each node and emit note events to a shared sink,
//! in lock-step with a periodic conductor.

pub mod engine;
pub mod midi;
pub mod playback;
pub mod score;

pub use engine::{EngineCommand, EngineHandle, EngineUpdate, spawn_engine};
pub use midi::{CaptureSink, LogSink, MidiMessage, MidirSink, NoteDeliveryError, NoteSink};
pub use playback::{Conductor, Ensemble, PlaybackConfig, Player, Traverser};
pub use score::{Edge, MetaNode, Node, NodeEvent, Note, Pitch, Score, ScoreError};
