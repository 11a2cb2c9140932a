use std::time::Duration;

use tokio::sync::{mpsc, watch};
use triage_core::{update, AppState, Effect, JobId, Msg};
use triage_logging::{triage_debug, triage_trace, SYNC_TARGET};

/// Cloneable handle to the job store.
///
/// Every message goes through one channel drained by a single task that applies
/// [`update`], so the state has exactly one writer no matter how many streams deliver
/// concurrently. Readers see the latest published state.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    msg_tx: mpsc::UnboundedSender<Msg>,
    state_rx: watch::Receiver<AppState>,
}

impl StoreHandle {
    /// Spawns the store task on the current runtime. Effects produced by `update` are
    /// forwarded to the returned receiver.
    pub fn spawn(initial: AppState) -> (Self, mpsc::UnboundedReceiver<Effect>) {
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Msg>();
        let (state_tx, state_rx) = watch::channel(initial);
        let (effect_tx, effect_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                triage_trace!(target: SYNC_TARGET, "applying {msg:?}");
                let mut effects = Vec::new();
                state_tx.send_if_modified(|state| {
                    let (next, produced) = update(std::mem::take(state), msg);
                    *state = next;
                    effects = produced;
                    state.consume_dirty()
                });
                for effect in effects {
                    let _ = effect_tx.send(effect);
                }
            }
            triage_debug!(target: SYNC_TARGET, "store loop stopped");
        });

        (Self { msg_tx, state_rx }, effect_rx)
    }

    pub fn dispatch(&self, msg: Msg) {
        if self.msg_tx.send(msg).is_err() {
            triage_debug!(target: SYNC_TARGET, "store loop gone; message dropped");
        }
    }

    pub fn select(&self, job_id: Option<JobId>) {
        self.dispatch(Msg::SelectJob(job_id));
    }

    /// Runs `read` against the latest published state.
    pub fn with_state<R>(&self, read: impl FnOnce(&AppState) -> R) -> R {
        read(&self.state_rx.borrow())
    }

    pub fn snapshot(&self) -> AppState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified every time a change is published.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state_rx.clone()
    }

    /// Waits until `predicate` holds for the published state, or `timeout` elapses.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&AppState) -> bool,
    ) -> Option<AppState> {
        let mut state_rx = self.subscribe();
        let waited = tokio::time::timeout(timeout, state_rx.wait_for(predicate)).await;
        match waited {
            Ok(Ok(state)) => Some(state.clone()),
            _ => None,
        }
    }
}
