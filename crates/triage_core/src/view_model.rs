use std::sync::Arc;

use crate::classify::ClassifiedReport;
use crate::derived::JobReport;
use crate::verdict::{DkimResult, DkimVerdict, DmarcResult, SpfResult};
use crate::{Job, JobId};

const TRUNCATED_MARKER: &str = "\n.[truncated]";
pub const MAX_EMAIL_PREVIEW: usize = 40_960;
const PENDING: &str = "analysing...";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub jobs: Vec<JobRowView>,
    pub selected: Option<JobId>,
    pub job_count: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub subject: String,
    pub result_count: usize,
    pub target_result_count: u32,
    pub progress_percent: u8,
    pub status: JobStatus,
    pub error: Option<String>,
    pub warning_count: usize,
}

impl JobRowView {
    pub fn from_job(job: &Job) -> Self {
        let result_count = job.results().len();
        let progress_percent = if job.error.is_some() || job.target_result_count == 0 {
            100
        } else {
            let percent = result_count as u64 * 100 / u64::from(job.target_result_count);
            percent.min(100) as u8
        };
        let status = if job.error.is_some() {
            JobStatus::Failed
        } else if progress_percent == 100 {
            JobStatus::Complete
        } else {
            JobStatus::Running
        };
        Self {
            job_id: job.id,
            subject: job.subject.clone(),
            result_count,
            target_result_count: job.target_result_count,
            progress_percent,
            status,
            error: job.error.clone(),
            warning_count: job.warnings.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Harmless,
    Suspicious,
    Neutral,
}

impl Tone {
    fn of_result(result: &str) -> Self {
        match result.to_ascii_lowercase().as_str() {
            "pass" => Tone::Harmless,
            "fail" => Tone::Suspicious,
            _ => Tone::Neutral,
        }
    }
}

/// One line of the email authentication section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthLine {
    pub text: String,
    pub tone: Tone,
}

impl AuthLine {
    fn pending() -> Self {
        Self {
            text: PENDING.to_string(),
            tone: Tone::Neutral,
        }
    }

    fn dkim(dkim: &DkimResult) -> Self {
        if dkim.values().all(DkimVerdict::is_pass) {
            Self {
                text: "pass".to_string(),
                tone: Tone::Harmless,
            }
        } else {
            Self {
                text: "fails".to_string(),
                tone: Tone::Suspicious,
            }
        }
    }

    fn spf(spf: &SpfResult) -> Self {
        if spf.result == "unknown" {
            return Self {
                text: "unknown".to_string(),
                tone: Tone::Neutral,
            };
        }
        Self {
            text: format!("Domain : {} Verdict : {}", spf.domain, spf.result),
            tone: Tone::of_result(&spf.result),
        }
    }

    fn dmarc(dmarc: &DmarcResult) -> Self {
        let tone = match (Tone::of_result(&dmarc.dkim), Tone::of_result(&dmarc.spf)) {
            (Tone::Suspicious, _) | (_, Tone::Suspicious) => Tone::Suspicious,
            (Tone::Harmless, Tone::Harmless) => Tone::Harmless,
            _ => Tone::Neutral,
        };
        Self {
            text: format!("DKIM : {}, SPF : {}", dmarc.dkim, dmarc.spf),
            tone,
        }
    }

    fn arc_chain(arc: &DkimVerdict) -> Self {
        Self {
            text: arc.label().to_string(),
            tone: Tone::of_result(arc.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSummary {
    pub dkim: AuthLine,
    pub spf: AuthLine,
    pub dmarc: AuthLine,
    pub arc_chain: AuthLine,
}

impl AuthSummary {
    pub fn from_report(report: &ClassifiedReport) -> Self {
        Self {
            dkim: report
                .dkim
                .as_ref()
                .map_or_else(AuthLine::pending, AuthLine::dkim),
            spf: report
                .spf
                .as_ref()
                .map_or_else(AuthLine::pending, AuthLine::spf),
            dmarc: report
                .dmarc
                .as_ref()
                .map_or_else(AuthLine::pending, AuthLine::dmarc),
            arc_chain: report
                .arc_chain
                .as_ref()
                .map_or_else(AuthLine::pending, AuthLine::arc_chain),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobDetailView {
    pub row: JobRowView,
    pub warnings: Vec<String>,
    pub report: Arc<JobReport>,
    pub auth: AuthSummary,
    pub email_preview: Option<String>,
}

impl JobDetailView {
    pub(crate) fn new(job: &Job, report: Arc<JobReport>, email_preview: Option<String>) -> Self {
        let auth = AuthSummary::from_report(&report.report);
        Self {
            row: JobRowView::from_job(job),
            warnings: job.warnings.clone(),
            report,
            auth,
            email_preview,
        }
    }
}

/// Truncates raw email text for display, on a char boundary.
pub fn prepare_email_preview(raw: &str) -> String {
    if raw.len() <= MAX_EMAIL_PREVIEW {
        return raw.to_string();
    }
    let mut end = MAX_EMAIL_PREVIEW;
    while end > 0 && !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATED_MARKER}", &raw[..end])
}
