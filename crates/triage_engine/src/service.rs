use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use triage_core::{JobDescription, JobEvent, JobId};
use triage_logging::{triage_debug, triage_info, triage_warn, SYNC_TARGET};
use url::Url;

use crate::decode::decode_email_text;
use crate::sse::SseDecoder;
use crate::{FailureKind, ServiceError, Subscription};

const JOB_EVENT_CHANNEL: &str = "result";
const NEW_JOB_CHANNEL: &str = "new_job";

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to plain requests; event streams stay open until closed.
    pub request_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Receives the events of one job's stream, in stream order.
pub trait JobEventSink: Send + Sync {
    fn emit(&self, job_id: JobId, event: JobEvent);
}

/// Receives job announcements.
pub trait NewJobSink: Send + Sync {
    fn emit(&self, job: JobDescription);
}

/// Backend the dashboard talks to.
#[async_trait::async_trait]
pub trait JobService: Send + Sync {
    /// Full snapshot of every job, results included.
    async fn fetch_all_jobs(&self) -> Result<Vec<JobDescription>, ServiceError>;

    async fn fetch_all_job_ids(&self) -> Result<Vec<JobId>, ServiceError>;

    /// Uploads a raw email for analysis.
    async fn submit_job(&self, raw_email: Bytes) -> Result<(), ServiceError>;

    async fn fetch_raw_email(&self, job_id: JobId) -> Result<String, ServiceError>;

    /// Resolves once the stream is active; events emitted after that reach `sink`.
    async fn open_job_events(
        &self,
        job_id: JobId,
        sink: Arc<dyn JobEventSink>,
    ) -> Result<Subscription, ServiceError>;

    /// Resolves once the stream is active; announcements after that reach `sink`.
    async fn open_new_job_events(
        &self,
        sink: Arc<dyn NewJobSink>,
    ) -> Result<Subscription, ServiceError>;
}

#[derive(Deserialize)]
struct JobsEnvelope {
    jobs: Vec<JobDescription>,
}

/// [`JobService`] over HTTP, with server-sent events for the live streams.
#[derive(Debug, Clone)]
pub struct HttpJobService {
    client: reqwest::Client,
    base_url: Url,
    settings: ServiceSettings,
}

impl HttpJobService {
    pub fn new(settings: ServiceSettings) -> Result<Self, ServiceError> {
        let mut base_url = Url::parse(&settings.base_url)
            .map_err(|err| ServiceError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ServiceError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            settings,
        })
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|err| ServiceError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ServiceError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let body = self
            .get(path)
            .await?
            .bytes()
            .await
            .map_err(map_reqwest_error)?;
        serde_json::from_slice(&body)
            .map_err(|err| ServiceError::new(FailureKind::Decode, err.to_string()))
    }

    async fn open_stream(&self, path: &str) -> Result<reqwest::Response, ServiceError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response)
    }
}

#[async_trait::async_trait]
impl JobService for HttpJobService {
    async fn fetch_all_jobs(&self) -> Result<Vec<JobDescription>, ServiceError> {
        let envelope: JobsEnvelope = self.get_json("jobs").await?;
        triage_debug!(target: SYNC_TARGET, "snapshot holds {} jobs", envelope.jobs.len());
        Ok(envelope.jobs)
    }

    async fn fetch_all_job_ids(&self) -> Result<Vec<JobId>, ServiceError> {
        self.get_json("jobs_ids").await
    }

    async fn submit_job(&self, raw_email: Bytes) -> Result<(), ServiceError> {
        let size = raw_email.len();
        let response = self
            .client
            .post(self.endpoint("job")?)
            .timeout(self.settings.request_timeout)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(raw_email)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response)?;
        triage_info!("submitted email of {size} bytes");
        Ok(())
    }

    async fn fetch_raw_email(&self, job_id: JobId) -> Result<String, ServiceError> {
        let response = self.get(&format!("job/{job_id}/email")).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode_email_text(&body, content_type.as_deref())
            .map(|decoded| decoded.text)
            .map_err(|err| ServiceError::new(FailureKind::Decode, err.to_string()))
    }

    async fn open_job_events(
        &self,
        job_id: JobId,
        sink: Arc<dyn JobEventSink>,
    ) -> Result<Subscription, ServiceError> {
        let response = self.open_stream(&format!("job/{job_id}/events")).await?;
        let label = format!("job-{job_id}");
        Ok(spawn_event_pump(
            response,
            JOB_EVENT_CHANNEL,
            label.clone(),
            move |data| match serde_json::from_str::<JobEvent>(data) {
                Ok(event) => sink.emit(job_id, event),
                Err(err) => {
                    triage_warn!(target: SYNC_TARGET, "{label}: skipping undecodable event: {err}")
                }
            },
        ))
    }

    async fn open_new_job_events(
        &self,
        sink: Arc<dyn NewJobSink>,
    ) -> Result<Subscription, ServiceError> {
        let response = self.open_stream("job/events").await?;
        Ok(spawn_event_pump(
            response,
            NEW_JOB_CHANNEL,
            "new-jobs".to_string(),
            move |data| match serde_json::from_str::<JobDescription>(data) {
                Ok(job) => sink.emit(job),
                Err(err) => {
                    triage_warn!(target: SYNC_TARGET, "new-jobs: skipping undecodable announcement: {err}")
                }
            },
        ))
    }
}

/// Reads an event-stream body until the server ends it or the subscription is closed,
/// handing the data of every `channel` frame to `deliver`.
fn spawn_event_pump<F>(
    response: reqwest::Response,
    channel: &'static str,
    label: String,
    mut deliver: F,
) -> Subscription
where
    F: FnMut(&str) + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let task_label = label.clone();
    let task = tokio::spawn(async move {
        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    triage_debug!(target: SYNC_TARGET, "{task_label}: closed");
                    break;
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for frame in decoder.feed(&bytes) {
                            if frame.event == channel {
                                deliver(&frame.data);
                            }
                        }
                    }
                    Some(Err(err)) => {
                        triage_warn!(target: SYNC_TARGET, "{task_label}: stream dropped: {err}");
                        break;
                    }
                    None => {
                        triage_info!(target: SYNC_TARGET, "{task_label}: stream ended by server");
                        break;
                    }
                },
            }
        }
    });
    Subscription::with_task(label, token, task)
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ServiceError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ServiceError::new(FailureKind::InvalidUrl, err.to_string());
    }
    ServiceError::new(FailureKind::Network, err.to_string())
}
