use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use triage_logging::{triage_debug, SYNC_TARGET};

/// Handle to one live event stream. Closing it is the only way to cancel the stream;
/// dropping the handle leaves the stream running.
#[derive(Debug)]
pub struct Subscription {
    label: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps a stream that observes `token` for cancellation.
    pub fn new(label: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            label: label.into(),
            token,
            task: None,
        }
    }

    pub(crate) fn with_task(
        label: impl Into<String>,
        token: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            task: Some(task),
            ..Self::new(label, token)
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the stream has stopped delivering, whether closed or ended by the server.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(self.is_closed(), JoinHandle::is_finished)
    }
}

/// Every subscription opened for one view. Once closed, subscriptions added later are
/// closed on arrival.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    inner: Mutex<SetInner>,
}

#[derive(Debug, Default)]
struct SetInner {
    subscriptions: Vec<Subscription>,
    closed: bool,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, subscription: Subscription) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.closed {
            triage_debug!(target: SYNC_TARGET, "closing late subscription {}", subscription.label());
            subscription.close();
        }
        inner.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .iter()
            .map(|subscription| subscription.label().to_string())
            .collect()
    }

    /// Closes every subscription and returns how many were open.
    pub fn close_all(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.closed = true;
        let mut closed = 0;
        for subscription in &inner.subscriptions {
            if !subscription.is_closed() {
                subscription.close();
                closed += 1;
            }
        }
        triage_debug!(target: SYNC_TARGET, "closed {closed} subscriptions");
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }
}
