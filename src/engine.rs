use crossbeam::channel::{Receiver, Sender};
use tracing::info;

use crate::midi::SharedSink;
use crate::playback::{PlaybackConfig, Player};
use crate::score::Score;

#[derive(Debug, Clone)]
pub enum EngineCommand {
    SetScore(Score),
    SetConfig(PlaybackConfig),
    Play,
    Stop,
}

#[derive(Debug, Clone)]
pub enum EngineUpdate {
    PlaybackState { playing: bool },
    Error { message: String },
}

pub struct EngineHandle {
    pub command_tx: Sender<EngineCommand>,
    pub update_rx: Receiver<EngineUpdate>,
}

/// Spawns the engine thread that owns the player. Commands are applied
/// in arrival order, which also serializes score edits against
/// playback. The thread exits when the handle's command sender drops.
pub fn spawn_engine(sink: SharedSink) -> EngineHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    std::thread::spawn(move || {
        engine_thread(sink, command_rx, update_tx);
    });

    EngineHandle {
        command_tx,
        update_rx,
    }
}

fn engine_thread(
    sink: SharedSink,
    command_rx: Receiver<EngineCommand>,
    update_tx: Sender<EngineUpdate>,
) {
    let mut player = Player::new(Score::new(), sink);

    loop {
        match command_rx.recv() {
            Ok(EngineCommand::SetScore(score)) => {
                if player.is_playing() {
                    let _ = update_tx.send(EngineUpdate::Error {
                        message: "cannot replace the score while playing".into(),
                    });
                    continue;
                }
                player.set_score(score);
                info!("score replaced");
            }
            Ok(EngineCommand::SetConfig(config)) => {
                if player.is_playing() {
                    let _ = update_tx.send(EngineUpdate::Error {
                        message: "cannot change timing while playing".into(),
                    });
                    continue;
                }
                player.set_config(config);
            }
            Ok(EngineCommand::Play) => {
                player.play_score();
                let _ = update_tx.send(EngineUpdate::PlaybackState {
                    playing: player.is_playing(),
                });
            }
            Ok(EngineCommand::Stop) => {
                player.stop_score();
                let _ = update_tx.send(EngineUpdate::PlaybackState { playing: false });
            }
            Err(crossbeam::channel::RecvError) => break,
        }
    }
}
