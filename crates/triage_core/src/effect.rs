use crate::JobId;

/// Work the shell performs on behalf of [`crate::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    LoadEmail { job_id: JobId },
}
