use std::collections::HashMap;

use serde::Deserialize;

use crate::verdict::Verdict;

pub type JobId = u64;
pub type ResultId = u64;

/// Subject shown for a job whose snapshot has not arrived yet.
pub const PLACEHOLDER_SUBJECT: &str = "Initializing…";

/// Change token of a job's result mapping, assigned by the store.
///
/// Two jobs with the same revision inside one store hold the same result mapping, so
/// derived data keyed on it can be reused without comparing results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Revision(pub(crate) u64);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: ResultId,
    pub analysis_name: String,
    pub verdict: Verdict,
}

impl AnalysisResult {
    pub fn new(id: ResultId, analysis_name: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            id,
            analysis_name: analysis_name.into(),
            verdict,
        }
    }
}

/// Results of one job keyed by id, iterated in first-arrival order.
///
/// Replacing a result keeps the position of the first arrival.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobResults {
    order: Vec<ResultId>,
    by_id: HashMap<ResultId, AnalysisResult>,
}

impl JobResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a result. Returns `false` when an identical result was
    /// already stored under the same id.
    pub fn insert(&mut self, result: AnalysisResult) -> bool {
        match self.by_id.get_mut(&result.id) {
            Some(existing) if *existing == result => false,
            Some(existing) => {
                *existing = result;
                true
            }
            None => {
                self.order.push(result.id);
                self.by_id.insert(result.id, result);
                true
            }
        }
    }

    pub fn get(&self, id: ResultId) -> Option<&AnalysisResult> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: ResultId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[ResultId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisResult> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

impl FromIterator<AnalysisResult> for JobResults {
    fn from_iter<I: IntoIterator<Item = AnalysisResult>>(iter: I) -> Self {
        let mut results = Self::new();
        for result in iter {
            results.insert(result);
        }
        results
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub subject: String,
    pub target_result_count: u32,
    /// Fatal job-level failure.
    pub error: Option<String>,
    /// Non-fatal stream-level errors, in arrival order.
    pub warnings: Vec<String>,
    results: JobResults,
    revision: Revision,
}

impl Job {
    pub fn new(id: JobId, subject: impl Into<String>, target_result_count: u32) -> Self {
        Self {
            id,
            subject: subject.into(),
            target_result_count,
            error: None,
            warnings: Vec::new(),
            results: JobResults::new(),
            revision: Revision::default(),
        }
    }

    /// Stand-in entry for a job known only by id.
    pub fn placeholder(id: JobId) -> Self {
        Self::new(id, PLACEHOLDER_SUBJECT, 1)
    }

    pub fn with_results(mut self, results: impl IntoIterator<Item = AnalysisResult>) -> Self {
        self.results = results.into_iter().collect();
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn results(&self) -> &JobResults {
        &self.results
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn is_placeholder(&self) -> bool {
        self.subject == PLACEHOLDER_SUBJECT && self.results.is_empty()
    }

    pub(crate) fn stamp(&mut self, revision: Revision) {
        self.revision = revision;
    }

    pub(crate) fn insert_result(&mut self, result: AnalysisResult) -> bool {
        self.results.insert(result)
    }

    /// Folds a fetched copy into this live one. Live results are kept and the fetched ones
    /// inserted on top; a placeholder brings nothing.
    pub(crate) fn absorb(mut self, fetched: Job) -> Job {
        if fetched.is_placeholder() {
            return self;
        }
        self.subject = fetched.subject;
        self.target_result_count = self.target_result_count.max(fetched.target_result_count);
        if fetched.error.is_some() {
            self.error = fetched.error;
        }
        for result in fetched.results.iter() {
            self.results.insert(result.clone());
        }
        self
    }
}

/// Job as announced by the backend: results arrive as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    pub id: JobId,
    pub subject: String,
    pub target_result_count: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<AnalysisResult>,
}

impl From<JobDescription> for Job {
    fn from(description: JobDescription) -> Self {
        let mut job = Job::new(
            description.id,
            description.subject,
            description.target_result_count,
        )
        .with_results(description.results);
        job.error = description.error;
        job
    }
}

/// One element of a per-job event stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum JobEvent {
    Progress(AnalysisResult),
    Error(String),
    ExpandedResultCount(u32),
    /// No further events will arrive for the job.
    Done,
}
