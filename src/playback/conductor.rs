use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use crossbeam::select;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::ensemble::Ensemble;
use crate::midi::SharedSink;
use crate::score::Score;

/// The single periodic tick source for a session. Holds no musical
/// state; each period it advances every voice in the ensemble, and it
/// winds down on its own once every voice is done.
pub struct Conductor {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Conductor {
    pub fn start(
        interval: Duration,
        score: Arc<RwLock<Score>>,
        ensemble: Arc<Mutex<Ensemble>>,
        sink: SharedSink,
    ) -> Self {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = std::thread::spawn(move || {
            info!(?interval, "conductor started");
            // First tick fires immediately, not an interval later.
            tick_once(&score, &ensemble, &sink);

            let ticker = channel::tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        tick_once(&score, &ensemble, &sink);
                        if ensemble.lock().all_done() {
                            debug!("all voices done; conductor winding down");
                            break;
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
            info!("conductor stopped");
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signals the tick loop to stop. Best-effort: a tick already in
    /// progress may still deliver messages.
    pub fn cancel(&self) {
        let _ = self.stop_tx.try_send(());
    }

    pub fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Conductor {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn tick_once(score: &RwLock<Score>, ensemble: &Mutex<Ensemble>, sink: &SharedSink) {
    let mut score = score.write();
    let mut ensemble = ensemble.lock();
    let mut sink = sink.lock();
    ensemble.tick(&mut score, &mut *sink);
}
