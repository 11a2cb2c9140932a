use std::collections::HashMap;

use crate::derived::ReportCache;
use crate::view_model::{prepare_email_preview, AppViewModel, JobDetailView, JobRowView};
use crate::{AnalysisResult, Job, JobId, Revision};

/// Every job known to the viewer, in the order they were introduced.
///
/// Only [`crate::update`] mutates it. Lookups that miss leave the state untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    jobs: Vec<Job>,
    selected_job_id: Option<JobId>,
    emails: HashMap<JobId, String>,
    last_revision: u64,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == job_id)
    }

    pub fn selected_job_id(&self) -> Option<JobId> {
        self.selected_job_id
    }

    pub fn selected_job(&self) -> Option<&Job> {
        self.selected_job_id.and_then(|job_id| self.job(job_id))
    }

    pub fn email(&self, job_id: JobId) -> Option<&str> {
        self.emails.get(&job_id).map(String::as_str)
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            jobs: self.jobs.iter().map(JobRowView::from_job).collect(),
            selected: self.selected_job_id,
            job_count: self.jobs.len(),
            dirty: self.dirty,
        }
    }

    /// Detail of the selected job, classified through `cache`.
    pub fn detail(&self, cache: &mut ReportCache) -> Option<JobDetailView> {
        let job = self.selected_job()?;
        let report = cache.report_for(job);
        Some(JobDetailView::new(
            job,
            report,
            self.email(job.id).map(prepare_email_preview),
        ))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn next_revision(&mut self) -> Revision {
        self.last_revision += 1;
        Revision(self.last_revision)
    }

    fn job_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == job_id)
    }

    pub(crate) fn add_job(&mut self, mut job: Job) {
        job.stamp(self.next_revision());
        self.jobs.push(job);
        self.dirty = true;
    }

    pub(crate) fn set_all_jobs(&mut self, jobs: Vec<Job>) {
        let mut stamped = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            job.stamp(self.next_revision());
            stamped.push(job);
        }
        self.jobs = stamped;
        self.dirty = true;
    }

    pub(crate) fn reconcile_jobs(&mut self, jobs: Vec<Job>, keep_live: &[JobId]) {
        let mut merged = Vec::with_capacity(jobs.len());
        for job in jobs {
            let live = keep_live
                .contains(&job.id)
                .then(|| self.job(job.id).cloned())
                .flatten();
            merged.push(match live {
                Some(live) => live.absorb(job),
                None => job,
            });
        }
        self.set_all_jobs(merged);
    }

    pub(crate) fn add_progress(&mut self, job_id: JobId, result: AnalysisResult) -> bool {
        let Some(index) = self.jobs.iter().position(|job| job.id == job_id) else {
            return false;
        };
        if !self.jobs[index].insert_result(result) {
            return false;
        }
        let revision = self.next_revision();
        self.jobs[index].stamp(revision);
        self.dirty = true;
        true
    }

    pub(crate) fn set_expected_result_count(&mut self, job_id: JobId, count: u32) -> bool {
        let changed = match self.job_mut(job_id) {
            Some(job) if job.target_result_count != count => {
                job.target_result_count = count;
                true
            }
            _ => false,
        };
        self.dirty |= changed;
        changed
    }

    pub(crate) fn set_error(&mut self, job_id: JobId, message: String) -> bool {
        let changed = match self.job_mut(job_id) {
            Some(job) if job.error.as_deref() != Some(message.as_str()) => {
                job.error = Some(message);
                true
            }
            _ => false,
        };
        self.dirty |= changed;
        changed
    }

    pub(crate) fn add_warning(&mut self, job_id: JobId, message: String) -> bool {
        let changed = match self.job_mut(job_id) {
            Some(job) => {
                job.warnings.push(message);
                true
            }
            None => false,
        };
        self.dirty |= changed;
        changed
    }

    pub(crate) fn select(&mut self, job_id: Option<JobId>) -> bool {
        if self.selected_job_id == job_id {
            return false;
        }
        self.selected_job_id = job_id;
        self.dirty = true;
        true
    }

    pub(crate) fn needs_email(&self, job_id: JobId) -> bool {
        self.job(job_id).is_some() && !self.emails.contains_key(&job_id)
    }

    pub(crate) fn store_email(&mut self, job_id: JobId, text: String) {
        self.emails.insert(job_id, text);
        if self.selected_job_id == Some(job_id) {
            self.dirty = true;
        }
    }
}
