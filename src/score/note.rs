use serde::{Deserialize, Serialize};

pub const DEFAULT_VELOCITY: u8 = 100;

/// A MIDI pitch, or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pitch {
    Rest,
    Midi(u8),
}

/// A single musical note. Notes do not play themselves; a traverser
/// reads them off a node's events and emits the messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pitch: Pitch,
    velocity: u8,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8) -> Self {
        Self {
            pitch: Pitch::Midi(pitch.min(127)),
            velocity: velocity.min(127),
        }
    }

    pub fn pitched(pitch: u8) -> Self {
        Self::new(pitch, DEFAULT_VELOCITY)
    }

    pub fn rest() -> Self {
        Self {
            pitch: Pitch::Rest,
            velocity: DEFAULT_VELOCITY,
        }
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn is_rest(&self) -> bool {
        self.pitch == Pitch::Rest
    }

    pub fn set_pitch(&mut self, pitch: Pitch) {
        self.pitch = match pitch {
            Pitch::Midi(p) => Pitch::Midi(p.min(127)),
            Pitch::Rest => Pitch::Rest,
        };
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.velocity = velocity.min(127);
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::rest()
    }
}
