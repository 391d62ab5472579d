use crate::{Job, JobError, JobId, JobResult, JobStatus, MediaKind, Phase, StatsState};

/// Read-only view of the controller handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerSnapshot {
    pub phase: Phase,
    pub job_id: Option<JobId>,
    pub source_filename: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub status: Option<JobStatus>,
    pub result: Option<JobResult>,
    pub stats: StatsState,
    /// Fatal error of the current submission, if any.
    pub error_message: Option<String>,
    /// True strictly while the service reports `pending` or `processing`.
    pub is_computing: bool,
    pub is_submitting: bool,
}

impl ControllerSnapshot {
    pub(crate) fn from_state(
        phase: Phase,
        upload_name: Option<&str>,
        job: Option<&Job>,
        error: Option<&JobError>,
    ) -> Self {
        let status = job.map(|job| job.status);
        let error_message = error
            .filter(|err| err.is_fatal())
            .map(ToString::to_string)
            .or_else(|| job.and_then(|job| job.error_message.clone()));

        Self {
            phase,
            job_id: job.map(|job| job.job_id.clone()),
            source_filename: job
                .map(|job| job.source_filename.clone())
                .or_else(|| upload_name.map(ToOwned::to_owned)),
            media_kind: job.map(|job| job.media_kind),
            status,
            result: job.and_then(|job| job.result.clone()),
            stats: job.map(|job| job.stats.clone()).unwrap_or_default(),
            error_message,
            is_computing: matches!(status, Some(JobStatus::Pending | JobStatus::Processing)),
            is_submitting: phase == Phase::Submitting,
        }
    }

    /// True once stats were requested but could not be loaded.
    pub fn stats_unavailable(&self) -> bool {
        matches!(self.stats, StatsState::Unavailable { .. })
    }
}
