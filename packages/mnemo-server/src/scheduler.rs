//! `DecayScheduler`: a single long-lived task that calls `decay_all` every
//! 12 hours until cancelled (§4.7). Grounded on the teacher's
//! `BackgroundWorker` run-loop shape: a cancellation token checked
//! alongside a sleep, log-and-continue on a failed tick rather than
//! aborting the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

use crate::store::DecayingStore;

const DECAY_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

pub struct DecayScheduler {
    cancel: watch::Sender<bool>,
}

impl DecayScheduler {
    #[must_use]
    pub fn spawn(store: Arc<DecayingStore>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_interval(store, DECAY_INTERVAL)
    }

    #[must_use]
    pub fn spawn_with_interval(store: Arc<DecayingStore>, interval: Duration) -> (Self, JoinHandle<()>) {
        let (cancel, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {
                        if let Err(err) = store.decay_all().await {
                            error!(%err, "decay sweep failed, will retry next tick");
                        }
                    }
                    _ = cancelled.changed() => {
                        if *cancelled.borrow() {
                            return;
                        }
                    }
                }
            }
        });
        (Self { cancel }, handle)
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}
