//! Triage core: pure job store, result classification and view-model helpers.
mod classify;
mod derived;
mod effect;
mod msg;
mod state;
mod types;
mod update;
mod verdict;
mod view_model;

pub use classify::{
    classify, AnalysisFailure, Bucket, ClassifiedReport, Diagnostic, DomainFinding, Entity,
    Finding, UrlFinding,
};
pub use derived::{JobReport, ReportCache};
pub use effect::Effect;
pub use msg::Msg;
pub use state::AppState;
pub use types::{
    AnalysisResult, Job, JobDescription, JobEvent, JobId, JobResults, ResultId, Revision,
    PLACEHOLDER_SUBJECT,
};
pub use update::update;
pub use verdict::{
    kind, AnalysisStats, CommunityVotes, DkimResult, DkimVerdict, DmarcResult, DnsRecord,
    DomainAttributes, DomainReport, EntityKey, Lookup, LookupError, Reputation, SpfResult,
    UrlAttributes, UrlReport, Verdict,
};
pub use view_model::{
    prepare_email_preview, AppViewModel, AuthLine, AuthSummary, JobDetailView, JobRowView,
    JobStatus, Tone, MAX_EMAIL_PREVIEW,
};
