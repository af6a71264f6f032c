use std::thread;
use std::time::Duration;

use meander::midi::{self, LogSink, MidirSink, SharedSink};
use meander::score::{Note, NodeEvent, Score};
use meander::Player;
use tracing::info;

/// Plays a small demo score for a few seconds on the first available
/// MIDI output, or logs the events when no device exists.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meander=debug".into()),
        )
        .init();

    let sink: SharedSink = match MidirSink::open(None) {
        Ok(sink) => {
            info!("connected to a MIDI output");
            midi::shared(sink)
        }
        Err(e) => {
            info!(error = %e, "no MIDI output; logging note events instead");
            midi::shared(LogSink)
        }
    };

    let mut player = Player::new(demo_score(), sink);
    player.play_score();
    thread::sleep(Duration::from_secs(6));
    player.stop_score();
}

/// A four-node loop: arpeggio start, two alternatives, and a rest that
/// closes each pass.
fn demo_score() -> Score {
    let mut score = Score::new();

    let start = score.add_node(0.0, 0.0);
    let high = score.add_node(100.0, -60.0);
    let low = score.add_node(100.0, 60.0);
    let close = score.add_node(200.0, 0.0);

    let set = |score: &mut Score, id, events| {
        score.node_mut(id).unwrap().set_events(events).unwrap();
    };
    set(
        &mut score,
        start,
        vec![
            NodeEvent::single(Note::new(60, 100), 2.0),
            NodeEvent::new(vec![Note::new(60, 90), Note::new(64, 90), Note::new(67, 90)], 1.0)
                .unwrap(),
        ],
    );
    set(&mut score, high, vec![NodeEvent::single(Note::new(72, 80), 1.0)]);
    set(&mut score, low, vec![NodeEvent::single(Note::new(55, 80), 1.0)]);
    set(&mut score, close, vec![NodeEvent::rest()]);

    score.node_mut(start).unwrap().set_prime(true);

    score.add_edge(start, high).unwrap();
    score.add_edge(start, low).unwrap();
    score.add_edge(high, close).unwrap();
    score.add_edge(low, close).unwrap();
    score.add_edge(close, start).unwrap();

    score
}
