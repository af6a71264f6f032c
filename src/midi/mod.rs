use std::sync::Arc;

use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8, velocity: u8 },
}

/// The sink rejected a message. Recovered where it happens: the
/// offending agent logs it and keeps traversing.
#[derive(Debug, Error)]
#[error("note sink rejected {message:?}: {reason}")]
pub struct NoteDeliveryError {
    pub message: MidiMessage,
    pub reason: String,
}

/// Where note events go. One sink is shared by every agent in a
/// playback session, so implementations sit behind a lock; a failed
/// send must not poison later sends. Sinks must also tolerate
/// unterminated notes: cancellation can cut a session off between a
/// note-on and its note-off.
pub trait NoteSink: Send {
    fn send(&mut self, message: MidiMessage) -> Result<(), NoteDeliveryError>;
}

/// The shared per-session sink handle handed to playback.
pub type SharedSink = Arc<Mutex<dyn NoteSink>>;

pub fn shared<S: NoteSink + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Records every message it is given. The assertion surface for tests,
/// and useful to hosts that render events themselves.
#[derive(Debug, Default)]
pub struct CaptureSink {
    pub messages: Vec<MidiMessage>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteSink for CaptureSink {
    fn send(&mut self, message: MidiMessage) -> Result<(), NoteDeliveryError> {
        self.messages.push(message);
        Ok(())
    }
}

/// Logs messages instead of delivering them anywhere. Stands in when
/// no MIDI device is available.
#[derive(Debug, Default)]
pub struct LogSink;

impl NoteSink for LogSink {
    fn send(&mut self, message: MidiMessage) -> Result<(), NoteDeliveryError> {
        debug!(?message, "note event");
        Ok(())
    }
}

const NOTE_ON_STATUS: u8 = 0x90;
const NOTE_OFF_STATUS: u8 = 0x80;

/// Real MIDI output through midir, on channel 1.
pub struct MidirSink {
    connection: MidiOutputConnection,
}

impl MidirSink {
    /// Names of the available MIDI output ports, for device pickers.
    pub fn ports() -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let output = MidiOutput::new("meander")?;
        Ok(output
            .ports()
            .iter()
            .map(|p| output.port_name(p).unwrap_or_default())
            .collect())
    }

    /// Connects to the first port whose name contains `name`, or the
    /// first port at all when `name` is `None`.
    pub fn open(name: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let output = MidiOutput::new("meander")?;
        let ports = output.ports();
        let port = ports
            .iter()
            .find(|p| match name {
                Some(name) => output.port_name(p).unwrap_or_default().contains(name),
                None => true,
            })
            .ok_or("no MIDI output port found")?;
        let connection = output.connect(port, "meander-out")?;
        Ok(Self { connection })
    }
}

impl NoteSink for MidirSink {
    fn send(&mut self, message: MidiMessage) -> Result<(), NoteDeliveryError> {
        let bytes = match message {
            MidiMessage::NoteOn { pitch, velocity } => [NOTE_ON_STATUS, pitch, velocity],
            MidiMessage::NoteOff { pitch, velocity } => [NOTE_OFF_STATUS, pitch, velocity],
        };
        self.connection
            .send(&bytes)
            .map_err(|e| NoteDeliveryError {
                message,
                reason: e.to_string(),
            })
    }
}
