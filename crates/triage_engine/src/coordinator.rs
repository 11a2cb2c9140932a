use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use triage_core::{Job, JobDescription, JobEvent, JobId, Msg};
use triage_logging::{triage_debug, triage_info, triage_warn, SYNC_TARGET};

use crate::{JobEventSink, JobService, NewJobSink, ServiceError, StoreHandle, SubscriptionSet};

/// Keeps the store in sync with the backend: one bootstrap, then live streams until
/// [`Coordinator::shutdown`].
pub struct Coordinator {
    shared: Arc<Shared>,
    started: AtomicBool,
}

struct Shared {
    service: Arc<dyn JobService>,
    store: StoreHandle,
    subscriptions: SubscriptionSet,
    ledger: Mutex<Ledger>,
    shutdown: CancellationToken,
}

/// Ids that already have a stream, and jobs learnt from the new-job stream.
///
/// Every coordinator-side dispatch happens while holding it.
#[derive(Default)]
struct Ledger {
    subscribed: HashSet<JobId>,
    announced: Vec<Job>,
}

impl Ledger {
    /// Announced jobs missing from `listed`.
    fn unlisted<'a>(&'a self, listed: &'a HashSet<JobId>) -> impl Iterator<Item = Job> + 'a {
        self.announced
            .iter()
            .filter(move |job| !listed.contains(&job.id))
            .cloned()
    }

    /// Replaces every job with `jobs`, keeping the live state of announced jobs. The store
    /// merges them after every message already queued, so their streamed progress stays.
    fn reconcile(&self, store: &StoreHandle, jobs: Vec<Job>) {
        let keep_live = self.announced.iter().map(|job| job.id).collect();
        store.dispatch(Msg::ReconcileJobs { jobs, keep_live });
    }

    /// Marks `ids` as subscribed and returns the ones that were not.
    fn claim(&mut self, ids: impl IntoIterator<Item = JobId>) -> Vec<JobId> {
        ids.into_iter()
            .filter(|job_id| self.subscribed.insert(*job_id))
            .collect()
    }
}

impl Coordinator {
    pub fn new(service: Arc<dyn JobService>, store: StoreHandle) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                store,
                subscriptions: SubscriptionSet::new(),
                ledger: Mutex::new(Ledger::default()),
                shutdown: CancellationToken::new(),
            }),
            started: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.shared.store
    }

    /// Number of streams opened so far, the new-job stream included.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.len()
    }

    /// Subscribes to new jobs, loads placeholders, opens the per-job streams and finally
    /// replaces the placeholders with the full snapshot.
    ///
    /// Runs once; later calls return immediately.
    pub async fn bootstrap(&self) -> Result<(), ServiceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            triage_warn!(target: SYNC_TARGET, "bootstrap already ran");
            return Ok(());
        }
        let shared = &self.shared;

        let (announce_tx, announce_rx) = mpsc::unbounded_channel();
        let new_jobs = shared
            .service
            .open_new_job_events(Arc::new(ChannelSink { tx: announce_tx }))
            .await?;
        shared.subscriptions.push(new_jobs);
        tokio::spawn(listen(Arc::clone(shared), announce_rx));

        let pending = {
            let mut ledger = shared.ledger.lock().await;
            let ids = shared.service.fetch_all_job_ids().await?;
            triage_info!(target: SYNC_TARGET, "backend lists {} jobs", ids.len());

            let listed: HashSet<JobId> = ids.iter().copied().collect();
            let mut jobs: Vec<Job> = ids.iter().copied().map(Job::placeholder).collect();
            jobs.extend(ledger.unlisted(&listed));
            ledger.reconcile(&shared.store, jobs);
            ledger.claim(ids)
        };

        join_all(pending.into_iter().map(|job_id| shared.open_job(job_id))).await;

        let mut ledger = shared.ledger.lock().await;
        let snapshot = shared.service.fetch_all_jobs().await?;
        let listed: HashSet<JobId> = snapshot.iter().map(|job| job.id).collect();
        let mut jobs: Vec<Job> = snapshot.into_iter().map(Job::from).collect();
        jobs.extend(ledger.unlisted(&listed));
        triage_info!(target: SYNC_TARGET, "snapshot loaded with {} jobs", jobs.len());
        ledger.reconcile(&shared.store, jobs);

        let missing = ledger.claim(listed);
        drop(ledger);
        // Jobs created between the id fetch and the snapshot that no stream announced.
        join_all(missing.into_iter().map(|job_id| shared.open_job(job_id))).await;
        Ok(())
    }

    /// Closes every subscription. Returns how many were still open.
    pub fn shutdown(&self) -> usize {
        self.shared.shutdown.cancel();
        let closed = self.shared.subscriptions.close_all();
        triage_info!(target: SYNC_TARGET, "closed {closed} live subscriptions");
        closed
    }
}

impl Shared {
    async fn open_job(&self, job_id: JobId) {
        let sink = Arc::new(StoreEventSink {
            store: self.store.clone(),
        });
        match self.service.open_job_events(job_id, sink).await {
            Ok(subscription) => self.subscriptions.push(subscription),
            Err(err) => {
                triage_warn!(target: SYNC_TARGET, "could not subscribe to job {job_id}: {err}")
            }
        }
    }

    async fn announce(&self, description: JobDescription) {
        let job_id = description.id;
        {
            let mut ledger = self.ledger.lock().await;
            if ledger.claim([job_id]).is_empty() {
                triage_debug!(target: SYNC_TARGET, "job {job_id} already subscribed");
                return;
            }
            let job = Job::from(description);
            ledger.announced.push(job.clone());
            self.store.dispatch(Msg::AddJob(job));
        }
        triage_info!(target: SYNC_TARGET, "new job {job_id}");
        self.open_job(job_id).await;
    }
}

async fn listen(shared: Arc<Shared>, mut announcements: mpsc::UnboundedReceiver<JobDescription>) {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            next = announcements.recv() => match next {
                Some(description) => shared.announce(description).await,
                None => break,
            },
        }
    }
    triage_debug!(target: SYNC_TARGET, "new-job listener stopped");
}

/// Hands announcements to the listener task, which serializes them with the bootstrap.
struct ChannelSink {
    tx: mpsc::UnboundedSender<JobDescription>,
}

impl NewJobSink for ChannelSink {
    fn emit(&self, job: JobDescription) {
        if self.tx.send(job).is_err() {
            triage_debug!(target: SYNC_TARGET, "announcement after shutdown dropped");
        }
    }
}

/// Turns one job's stream events into store messages.
struct StoreEventSink {
    store: StoreHandle,
}

impl JobEventSink for StoreEventSink {
    fn emit(&self, job_id: JobId, event: JobEvent) {
        match event {
            JobEvent::Progress(result) => {
                self.store.dispatch(Msg::AddJobProgress { job_id, result })
            }
            JobEvent::ExpandedResultCount(count) => self
                .store
                .dispatch(Msg::UpdateExpectedResultCount { job_id, count }),
            JobEvent::Error(message) => {
                triage_warn!(target: SYNC_TARGET, "job {job_id} reported: {message}");
                self.store.dispatch(Msg::AddJobWarning { job_id, message });
            }
            JobEvent::Done => triage_debug!(target: SYNC_TARGET, "job {job_id} done"),
        }
    }
}
