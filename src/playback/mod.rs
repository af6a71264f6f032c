mod conductor;
mod ensemble;
mod traverser;

pub use conductor::Conductor;
pub use ensemble::{Ensemble, VoiceId};
pub use traverser::{EdgeSelector, StepOutcome, Traverser, UniformEdgeSelector};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::midi::SharedSink;
use crate::score::Score;

pub const DEFAULT_TEMPO: f64 = 120.0;
pub const DEFAULT_SUBDIVISION: u32 = 64;
/// Distance units a traverser moves along an edge per tick. At the
/// default tempo and subdivision, a quarter note covers 50 units.
pub const DEFAULT_EDGE_RATIO: f64 = 3.125;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Quarter notes per minute.
    pub tempo: f64,
    /// The note value of one tick, as a fraction of a whole note
    /// (64 means 64th notes).
    pub subdivision: u32,
    /// Edge distance covered per tick.
    pub edge_ratio: f64,
}

impl PlaybackConfig {
    pub fn tick_interval(&self) -> Duration {
        let seconds = (60.0 / self.tempo) / (self.subdivision as f64 / 4.0);
        Duration::from_secs_f64(seconds)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            subdivision: DEFAULT_SUBDIVISION,
            edge_ratio: DEFAULT_EDGE_RATIO,
        }
    }
}

struct Session {
    conductor: Conductor,
    ensemble: Arc<Mutex<Ensemble>>,
}

/// The orchestration surface: start playback (one voice per prime
/// node, one shared conductor) and stop it (cancel every voice, cancel
/// the conductor, clear transient node state).
pub struct Player {
    score: Arc<RwLock<Score>>,
    config: PlaybackConfig,
    sink: SharedSink,
    session: Option<Session>,
}

impl Player {
    pub fn new(score: Score, sink: SharedSink) -> Self {
        Self {
            score: Arc::new(RwLock::new(score)),
            config: PlaybackConfig::default(),
            sink,
            session: None,
        }
    }

    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared handle to the score, for editing between sessions. Edits
    /// while playing are a known hazard the host must serialize.
    pub fn score(&self) -> Arc<RwLock<Score>> {
        Arc::clone(&self.score)
    }

    pub fn set_score(&mut self, score: Score) {
        *self.score.write() = score;
    }

    pub fn set_config(&mut self, config: PlaybackConfig) {
        self.config = config;
    }

    pub fn config(&self) -> PlaybackConfig {
        self.config
    }

    pub fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.ensemble.lock().all_done())
    }

    /// Spawns one traverser per prime node and starts the conductor.
    /// A second call while a session is live is a no-op.
    pub fn play_score(&mut self) {
        if self.is_playing() {
            return;
        }
        let primes = self.score.read().prime_nodes();
        if primes.is_empty() {
            warn!("score has no prime nodes; nothing to play");
            return;
        }
        info!(voices = primes.len(), "starting playback");

        let ensemble = Arc::new(Mutex::new(Ensemble::from_primes(
            &primes,
            self.config.edge_ratio,
        )));
        let conductor = Conductor::start(
            self.config.tick_interval(),
            Arc::clone(&self.score),
            Arc::clone(&ensemble),
            Arc::clone(&self.sink),
        );
        self.session = Some(Session {
            conductor,
            ensemble,
        });
    }

    /// Cancels every live traverser and the conductor, then clears
    /// transient node state. Best-effort: a tick already in progress
    /// may still emit, and notes left sounding stay unterminated.
    pub fn stop_score(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.ensemble.lock().stop_all();
        session.conductor.join();
        self.score.write().reset_transients();
        info!("playback stopped");
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop_score();
    }
}
