use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
///
/// Never panics. Messages about a job the state does not know return the state as is,
/// since progress can legitimately race ahead of job registration.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::AddJob(job) => {
            state.add_job(job);
            Vec::new()
        }
        Msg::SetAllJobs(jobs) => {
            state.set_all_jobs(jobs);
            Vec::new()
        }
        Msg::ReconcileJobs { jobs, keep_live } => {
            state.reconcile_jobs(jobs, &keep_live);
            Vec::new()
        }
        Msg::AddJobProgress { job_id, result } => {
            state.add_progress(job_id, result);
            Vec::new()
        }
        Msg::UpdateExpectedResultCount { job_id, count } => {
            state.set_expected_result_count(job_id, count);
            Vec::new()
        }
        Msg::SelectJob(job_id) => {
            let changed = state.select(job_id);
            match job_id {
                Some(job_id) if changed && state.needs_email(job_id) => {
                    vec![Effect::LoadEmail { job_id }]
                }
                _ => Vec::new(),
            }
        }
        Msg::SetJobError { job_id, message } => {
            state.set_error(job_id, message);
            Vec::new()
        }
        Msg::AddJobWarning { job_id, message } => {
            state.add_warning(job_id, message);
            Vec::new()
        }
        Msg::EmailLoaded { job_id, text } => {
            state.store_email(job_id, text);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
