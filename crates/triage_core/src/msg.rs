use crate::{AnalysisResult, Job, JobId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A job was announced live. Id uniqueness is the sender's responsibility.
    AddJob(Job),
    /// Replace every job, e.g. with placeholders or with an authoritative snapshot.
    SetAllJobs(Vec<Job>),
    /// Replace every job like [`Msg::SetAllJobs`], except that a job listed in `keep_live`
    /// keeps what the store holds for it, with the incoming copy merged on top.
    ReconcileJobs { jobs: Vec<Job>, keep_live: Vec<JobId> },
    /// A result streamed in for a job.
    AddJobProgress {
        job_id: JobId,
        result: AnalysisResult,
    },
    /// The backend revised the number of results it expects to produce.
    UpdateExpectedResultCount { job_id: JobId, count: u32 },
    /// User focused a job, or cleared the focus.
    SelectJob(Option<JobId>),
    /// The whole job failed.
    SetJobError { job_id: JobId, message: String },
    /// A single analysis signal failed; the job goes on.
    AddJobWarning { job_id: JobId, message: String },
    /// Raw email text fetched for the detail view.
    EmailLoaded { job_id: JobId, text: String },
    /// Render tick to coalesce rendering.
    Tick,
    NoOp,
}
