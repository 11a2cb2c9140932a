use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use triage_core::{AnalysisResult, AppState, JobDescription, JobEvent, JobId};
use triage_engine::{
    Coordinator, FailureKind, JobEventSink, JobService, NewJobSink, ServiceError, StoreHandle,
    Subscription,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct FakeService {
    ids: Vec<JobId>,
    snapshot: Vec<JobDescription>,
    fail_ids: bool,
    failing_streams: HashSet<JobId>,
    announce_during_ids: Mutex<Option<JobDescription>>,
    announce_during_jobs: Mutex<Option<JobDescription>>,
    progress_during_jobs: Mutex<Option<(JobId, AnalysisResult)>>,
    slow_streams: HashMap<JobId, Duration>,
    calls: Mutex<Vec<String>>,
    job_sinks: Mutex<HashMap<JobId, Arc<dyn JobEventSink>>>,
    new_job_sink: Mutex<Option<Arc<dyn NewJobSink>>>,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl FakeService {
    fn new(ids: &[JobId], snapshot: Vec<JobDescription>) -> Self {
        Self {
            ids: ids.to_vec(),
            snapshot,
            ..Self::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn opens_for(&self, job_id: JobId) -> usize {
        let expected = format!("open job {job_id}");
        self.calls().iter().filter(|call| **call == expected).count()
    }

    fn subscription(&self, label: String) -> Subscription {
        let token = CancellationToken::new();
        self.tokens.lock().unwrap().push(token.clone());
        Subscription::new(label, token)
    }

    fn job_event(&self, job_id: JobId, event: JobEvent) {
        let sink = self.job_sinks.lock().unwrap().get(&job_id).cloned();
        sink.expect("job stream opened").emit(job_id, event);
    }

    fn announce(&self, job: JobDescription) {
        let sink = self.new_job_sink.lock().unwrap().clone();
        sink.expect("new-job stream opened").emit(job);
    }
}

#[async_trait::async_trait]
impl JobService for FakeService {
    async fn fetch_all_jobs(&self) -> Result<Vec<JobDescription>, ServiceError> {
        self.record("fetch jobs".to_string());
        let announced = self.announce_during_jobs.lock().unwrap().take();
        if let Some(job) = announced {
            self.announce(job);
            tokio::task::yield_now().await;
        }
        let progress = self.progress_during_jobs.lock().unwrap().take();
        if let Some((job_id, result)) = progress {
            self.job_event(job_id, JobEvent::Progress(result));
        }
        Ok(self.snapshot.clone())
    }

    async fn fetch_all_job_ids(&self) -> Result<Vec<JobId>, ServiceError> {
        self.record("fetch ids".to_string());
        if self.fail_ids {
            return Err(ServiceError {
                kind: FailureKind::Network,
                message: "connection refused".to_string(),
            });
        }
        let announced = self.announce_during_ids.lock().unwrap().take();
        if let Some(job) = announced {
            self.announce(job);
            tokio::task::yield_now().await;
        }
        Ok(self.ids.clone())
    }

    async fn submit_job(&self, _raw_email: Bytes) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn fetch_raw_email(&self, job_id: JobId) -> Result<String, ServiceError> {
        Ok(format!("Subject: job {job_id}"))
    }

    async fn open_job_events(
        &self,
        job_id: JobId,
        sink: Arc<dyn JobEventSink>,
    ) -> Result<Subscription, ServiceError> {
        self.record(format!("open job {job_id}"));
        if let Some(delay) = self.slow_streams.get(&job_id).copied() {
            tokio::time::sleep(delay).await;
        }
        if self.failing_streams.contains(&job_id) {
            return Err(ServiceError {
                kind: FailureKind::HttpStatus(500),
                message: "stream unavailable".to_string(),
            });
        }
        self.job_sinks.lock().unwrap().insert(job_id, sink);
        Ok(self.subscription(format!("job-{job_id}")))
    }

    async fn open_new_job_events(
        &self,
        sink: Arc<dyn NewJobSink>,
    ) -> Result<Subscription, ServiceError> {
        self.record("open new-jobs".to_string());
        *self.new_job_sink.lock().unwrap() = Some(sink);
        Ok(self.subscription("new-jobs".to_string()))
    }
}

fn description(id: JobId, subject: &str, results: Vec<AnalysisResult>) -> JobDescription {
    JobDescription {
        id,
        subject: subject.to_string(),
        target_result_count: 3,
        error: None,
        results,
    }
}

fn spf(id: u64, outcome: &str) -> AnalysisResult {
    serde_json::from_value(json!({
        "id": id,
        "analysisName": "spf",
        "verdict": { "kind": "auth-spf", "value": { "domain": "a.com", "result": outcome } },
    }))
    .expect("valid analysis result")
}

fn coordinator_for(service: &Arc<FakeService>) -> Coordinator {
    triage_logging::initialize_for_tests();
    let (store, _effects) = StoreHandle::spawn(AppState::new());
    Coordinator::new(service.clone(), store)
}

fn sorted_ids(state: &AppState) -> Vec<JobId> {
    let mut ids: Vec<_> = state.jobs().iter().map(|job| job.id).collect();
    ids.sort_unstable();
    ids
}

async fn wait_for_call(service: &FakeService, call: &str) {
    tokio::time::timeout(WAIT, async {
        while !service.calls().iter().any(|recorded| recorded == call) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("call observed");
}

#[tokio::test]
async fn bootstrap_subscribes_before_fetching_and_ends_with_snapshot() {
    let service = Arc::new(FakeService::new(
        &[3, 5],
        vec![
            description(3, "Invoice", vec![spf(1, "pass")]),
            description(5, "Hello", vec![]),
        ],
    ));
    let coordinator = coordinator_for(&service);

    coordinator.bootstrap().await.expect("bootstrap");

    assert_eq!(
        service.calls(),
        vec![
            "open new-jobs".to_string(),
            "fetch ids".to_string(),
            "open job 3".to_string(),
            "open job 5".to_string(),
            "fetch jobs".to_string(),
        ]
    );
    assert_eq!(coordinator.subscription_count(), 3);

    let state = coordinator
        .store()
        .wait_for(WAIT, |state| {
            state.job(3).is_some_and(|job| job.subject == "Invoice")
        })
        .await
        .expect("snapshot applied");
    assert_eq!(state.jobs().len(), 2);
    assert_eq!(state.job(3).unwrap().results().len(), 1);
    assert!(!state.job(5).unwrap().is_placeholder());
}

#[tokio::test]
async fn job_created_during_bootstrap_is_kept_once() {
    let service = Arc::new(FakeService {
        announce_during_ids: Mutex::new(Some(description(7, "Fresh", vec![]))),
        ..FakeService::new(
            &[3, 5],
            vec![description(3, "Invoice", vec![]), description(5, "Hello", vec![])],
        )
    });
    let coordinator = coordinator_for(&service);

    coordinator.bootstrap().await.expect("bootstrap");
    wait_for_call(&service, "open job 7").await;

    let state = coordinator
        .store()
        .wait_for(WAIT, |state| sorted_ids(state) == vec![3, 5, 7])
        .await
        .expect("all jobs present");
    assert_eq!(state.jobs().len(), 3);
    assert_eq!(service.opens_for(7), 1);

    service.job_event(7, JobEvent::Progress(spf(40, "fail")));
    let state = coordinator
        .store()
        .wait_for(WAIT, |state| {
            state.job(7).is_some_and(|job| job.results().contains(40))
        })
        .await
        .expect("progress for the new job applied");
    assert_eq!(state.job(7).unwrap().subject, "Fresh");
    assert_eq!(state.jobs().len(), 3);
}

#[tokio::test]
async fn progress_for_announced_job_survives_the_snapshot() {
    let service = Arc::new(FakeService {
        announce_during_ids: Mutex::new(Some(description(9, "Fresh", vec![]))),
        progress_during_jobs: Mutex::new(Some((9, spf(40, "fail")))),
        slow_streams: HashMap::from([(3, Duration::from_millis(50))]),
        ..FakeService::new(&[3], vec![description(3, "Invoice", vec![])])
    });
    let coordinator = coordinator_for(&service);

    coordinator.bootstrap().await.expect("bootstrap");
    assert_eq!(
        service.calls(),
        vec![
            "open new-jobs".to_string(),
            "fetch ids".to_string(),
            "open job 3".to_string(),
            "open job 9".to_string(),
            "fetch jobs".to_string(),
        ]
    );

    // Queued behind everything the bootstrap dispatched.
    service.job_event(3, JobEvent::ExpandedResultCount(7));
    let state = coordinator
        .store()
        .wait_for(WAIT, |state| {
            state.job(3).is_some_and(|job| job.target_result_count == 7)
        })
        .await
        .expect("store drained");
    assert_eq!(sorted_ids(&state), vec![3, 9]);
    let fresh = state.job(9).unwrap();
    assert_eq!(fresh.subject, "Fresh");
    assert!(fresh.results().contains(40));
}

#[tokio::test]
async fn job_announced_during_snapshot_fetch_is_kept_once() {
    let service = Arc::new(FakeService {
        announce_during_jobs: Mutex::new(Some(description(9, "Fresh", vec![]))),
        ..FakeService::new(
            &[3, 5],
            vec![description(3, "Invoice", vec![]), description(5, "Hello", vec![])],
        )
    });
    let coordinator = coordinator_for(&service);

    coordinator.bootstrap().await.expect("bootstrap");
    wait_for_call(&service, "open job 9").await;

    let state = coordinator
        .store()
        .wait_for(WAIT, |state| sorted_ids(state) == vec![3, 5, 9])
        .await
        .expect("announced job present");
    assert_eq!(state.job(9).unwrap().subject, "Fresh");
    assert_eq!(service.opens_for(9), 1);
}

#[tokio::test]
async fn job_announced_during_snapshot_fetch_and_listed_in_it_is_opened_once() {
    let service = Arc::new(FakeService {
        announce_during_jobs: Mutex::new(Some(description(9, "Fresh", vec![]))),
        ..FakeService::new(
            &[3, 5],
            vec![
                description(3, "Invoice", vec![]),
                description(5, "Hello", vec![]),
                description(9, "Fresh", vec![spf(1, "pass")]),
            ],
        )
    });
    let coordinator = coordinator_for(&service);

    coordinator.bootstrap().await.expect("bootstrap");
    wait_for_call(&service, "open job 9").await;
    // The announcement is handled after the bootstrap released the ledger; a marker
    // announcement queued behind it shows it was processed.
    service.announce(description(10, "Marker", vec![]));

    let state = coordinator
        .store()
        .wait_for(WAIT, |state| state.job(10).is_some())
        .await
        .expect("marker announced");
    assert_eq!(sorted_ids(&state), vec![3, 5, 9, 10]);
    assert_eq!(state.job(9).unwrap().results().len(), 1);
    assert_eq!(service.opens_for(9), 1);
}

#[tokio::test]
async fn snapshot_job_missing_from_id_list_gets_a_stream() {
    let service = Arc::new(FakeService::new(
        &[3],
        vec![description(3, "Invoice", vec![]), description(11, "Late", vec![])],
    ));
    let coordinator = coordinator_for(&service);

    coordinator.bootstrap().await.expect("bootstrap");

    let calls = service.calls();
    assert_eq!(
        calls[calls.len() - 2..].to_vec(),
        vec!["fetch jobs".to_string(), "open job 11".to_string()]
    );
    assert_eq!(service.opens_for(11), 1);
    assert_eq!(coordinator.subscription_count(), 3);
}

#[tokio::test]
async fn announcement_for_subscribed_job_is_ignored() {
    let service = Arc::new(FakeService::new(&[3], vec![description(3, "Invoice", vec![])]));
    let coordinator = coordinator_for(&service);
    coordinator.bootstrap().await.expect("bootstrap");

    service.announce(description(3, "Invoice again", vec![]));
    service.announce(description(4, "Marker", vec![]));

    let state = coordinator
        .store()
        .wait_for(WAIT, |state| state.job(4).is_some())
        .await
        .expect("marker announced");
    assert_eq!(sorted_ids(&state), vec![3, 4]);
    assert_eq!(state.job(3).unwrap().subject, "Invoice");
    assert_eq!(service.opens_for(3), 1);
}

#[tokio::test]
async fn stream_error_becomes_warning_and_done_changes_nothing() {
    let service = Arc::new(FakeService::new(&[3], vec![description(3, "Invoice", vec![])]));
    let coordinator = coordinator_for(&service);
    coordinator.bootstrap().await.expect("bootstrap");
    coordinator
        .store()
        .wait_for(WAIT, |state| {
            state.job(3).is_some_and(|job| job.subject == "Invoice")
        })
        .await
        .expect("snapshot applied");

    service.job_event(3, JobEvent::Error("whois timed out".to_string()));
    service.job_event(3, JobEvent::Done);
    service.job_event(3, JobEvent::ExpandedResultCount(8));

    let state = coordinator
        .store()
        .wait_for(WAIT, |state| {
            state.job(3).is_some_and(|job| job.target_result_count == 8)
        })
        .await
        .expect("count revised");
    let job = state.job(3).unwrap();
    assert_eq!(job.warnings, vec!["whois timed out".to_string()]);
    assert_eq!(job.error, None);
}

#[tokio::test]
async fn redelivered_snapshot_result_is_idempotent() {
    let service = Arc::new(FakeService::new(
        &[3],
        vec![description(3, "Invoice", vec![spf(1, "pass")])],
    ));
    let coordinator = coordinator_for(&service);
    coordinator.bootstrap().await.expect("bootstrap");
    let before = coordinator
        .store()
        .wait_for(WAIT, |state| {
            state.job(3).is_some_and(|job| job.subject == "Invoice")
        })
        .await
        .expect("snapshot applied");

    service.job_event(3, JobEvent::Progress(spf(1, "pass")));
    service.job_event(3, JobEvent::ExpandedResultCount(5));

    let after = coordinator
        .store()
        .wait_for(WAIT, |state| {
            state.job(3).is_some_and(|job| job.target_result_count == 5)
        })
        .await
        .expect("count revised");
    let (before, after) = (before.job(3).unwrap(), after.job(3).unwrap());
    assert_eq!(after.results(), before.results());
    assert_eq!(after.revision(), before.revision());
}

#[tokio::test]
async fn failing_job_stream_is_skipped() {
    let service = Arc::new(FakeService {
        failing_streams: HashSet::from([5]),
        ..FakeService::new(&[3, 5], vec![])
    });
    let coordinator = coordinator_for(&service);

    coordinator.bootstrap().await.expect("bootstrap");

    assert_eq!(service.opens_for(5), 1);
    assert_eq!(coordinator.subscription_count(), 2);
}

#[tokio::test]
async fn failing_id_fetch_aborts_bootstrap() {
    let service = Arc::new(FakeService {
        fail_ids: true,
        ..FakeService::new(&[], vec![])
    });
    let coordinator = coordinator_for(&service);

    let err = coordinator.bootstrap().await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Network);
    assert!(!service.calls().contains(&"fetch jobs".to_string()));
}

#[tokio::test]
async fn shutdown_closes_every_subscription() {
    let service = Arc::new(FakeService::new(&[3, 5], vec![]));
    let coordinator = coordinator_for(&service);
    coordinator.bootstrap().await.expect("bootstrap");

    assert_eq!(coordinator.shutdown(), 3);

    let tokens = service.tokens.lock().unwrap().clone();
    assert_eq!(tokens.len(), 3);
    assert!(tokens.iter().all(CancellationToken::is_cancelled));
    assert_eq!(coordinator.shutdown(), 0);
}
