use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::classify::{classify, ClassifiedReport, Finding};
use crate::verdict::Reputation;
use crate::{AppState, Job, JobId, Revision};

/// Display-ready report of one job.
///
/// URL and domain findings are ordered by ascending reputation with failed lookups last,
/// entities by type then name. Ties keep arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: JobId,
    pub revision: Revision,
    pub report: ClassifiedReport,
}

impl JobReport {
    pub fn build(job: &Job) -> Self {
        let mut report = classify(job.results().iter());
        report.urls.sort_by(by_reputation);
        report.domains.sort_by(by_reputation);
        report
            .entities
            .sort_by(|left, right| left.key.cmp(&right.key));
        Self {
            job_id: job.id,
            revision: job.revision(),
            report,
        }
    }
}

fn by_reputation<T: Reputation>(left: &Finding<T>, right: &Finding<T>) -> Ordering {
    match (left.reputation(), right.reputation()) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Memoizes [`JobReport`]s per job, keyed on the job's revision.
///
/// Revisions are only unique within one store, so use one cache per [`AppState`] lineage.
#[derive(Debug, Default)]
pub struct ReportCache {
    entries: HashMap<JobId, Arc<JobReport>>,
    recomputations: usize,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_for(&mut self, job: &Job) -> Arc<JobReport> {
        if let Some(cached) = self.entries.get(&job.id) {
            if cached.revision == job.revision() {
                return Arc::clone(cached);
            }
        }
        let report = Arc::new(JobReport::build(job));
        self.recomputations += 1;
        self.entries.insert(job.id, Arc::clone(&report));
        report
    }

    /// Drops reports of jobs the state no longer holds.
    pub fn retain_known(&mut self, state: &AppState) {
        self.entries
            .retain(|job_id, _| state.job(*job_id).is_some());
    }

    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
