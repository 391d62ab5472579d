use detectrack_logging::{track_debug, track_info, track_warn};

use crate::view_model::ControllerSnapshot;
use crate::{
    Effect, FilterOptions, InitialStatus, JobError, JobId, JobResult, JobStats, JobStatus,
    JobStatusSnapshot, JobSubmission, MediaKind, SubmitRequest, Ticket, TransportError,
    ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Finalizing,
    Settled(Outcome),
}

impl Phase {
    pub fn is_settled(self) -> bool {
        matches!(self, Phase::Settled(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum StatsState {
    #[default]
    NotRequested,
    Loading,
    Ready(JobStats),
    Unavailable { reason: TransportError },
}

/// The job currently tracked by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: JobId,
    pub source_filename: String,
    pub media_kind: MediaKind,
    pub filter_options: Option<FilterOptions>,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
    pub stats: StatsState,
}

/// What is known about a submission before the service assigned a job id.
#[derive(Debug, Clone, PartialEq)]
struct PendingUpload {
    source_filename: String,
    media_kind: MediaKind,
    filter_options: Option<FilterOptions>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerState {
    last_ticket: u64,
    ticket: Option<Ticket>,
    upload: Option<PendingUpload>,
    job: Option<Job>,
    phase: Phase,
    error: Option<JobError>,
    dirty: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ticket(&self) -> Option<Ticket> {
        self.ticket
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn view(&self) -> ControllerSnapshot {
        ControllerSnapshot::from_state(
            self.phase,
            self.upload_name(),
            self.job.as_ref(),
            self.error.as_ref(),
        )
    }

    /// Returns whether anything observable changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn upload_name(&self) -> Option<&str> {
        self.upload.as_ref().map(|upload| upload.source_filename.as_str())
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn is_current(&self, ticket: Ticket, job_id: &JobId) -> bool {
        self.ticket == Some(ticket)
            && self
                .job
                .as_ref()
                .is_some_and(|job| &job.job_id == job_id)
    }

    /// Drops tracking of the current submission, if any.
    fn abandon_current(&mut self) -> Option<Effect> {
        let ticket = self.ticket.take()?;
        self.upload = None;
        self.job = None;
        track_debug!("Abandoning submission {}", ticket);
        Some(Effect::Abandon { ticket })
    }

    pub(crate) fn begin_submission(&mut self, request: SubmitRequest) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(2);
        effects.extend(self.abandon_current());

        self.last_ticket += 1;
        let ticket = Ticket(self.last_ticket);
        track_info!(
            "Submitting {} ({}) as {}",
            request.file_name(),
            request.media_kind().as_str(),
            ticket
        );

        self.ticket = Some(ticket);
        self.upload = Some(PendingUpload {
            source_filename: request.file_name().to_string(),
            media_kind: request.media_kind(),
            filter_options: request.filter().cloned(),
        });
        self.phase = Phase::Submitting;
        self.error = None;
        self.mark_dirty();

        effects.push(Effect::Submit { ticket, request });
        effects
    }

    pub(crate) fn reject_submission(&mut self, err: ValidationError) {
        track_warn!("Submission rejected: {}", err);
        self.error = Some(JobError::Validation(err));
        self.mark_dirty();
    }

    pub(crate) fn reset(&mut self) -> Vec<Effect> {
        let effects: Vec<Effect> = self.abandon_current().into_iter().collect();
        if !effects.is_empty() || self.phase != Phase::Idle || self.error.is_some() {
            self.phase = Phase::Idle;
            self.error = None;
            self.mark_dirty();
        }
        effects
    }

    pub(crate) fn apply_submission(
        &mut self,
        ticket: Ticket,
        result: Result<JobSubmission, TransportError>,
    ) -> Vec<Effect> {
        if self.ticket != Some(ticket) || self.phase != Phase::Submitting {
            track_debug!("Dropping stale submission response for {}", ticket);
            return Vec::new();
        }
        self.clear_rejection();
        let Some(upload) = self.upload.take() else {
            return Vec::new();
        };
        self.mark_dirty();

        let submission = match result {
            Ok(submission) => submission,
            Err(err) => {
                track_warn!("Submission {} failed: {}", upload.source_filename, err);
                self.upload = Some(upload);
                self.phase = Phase::Settled(Outcome::Failed);
                self.error = Some(JobError::Transport(err));
                return Vec::new();
            }
        };

        let job_id = submission.job_id;
        let mut job = Job {
            job_id: job_id.clone(),
            source_filename: upload.source_filename.clone(),
            media_kind: upload.media_kind,
            filter_options: upload.filter_options.clone(),
            status: JobStatus::Pending,
            result: None,
            error_message: None,
            stats: StatsState::NotRequested,
        };
        self.upload = Some(upload);

        let effects = match submission.initial {
            InitialStatus::Pending => self.start_polling(&mut job, JobStatus::Pending, ticket),
            InitialStatus::Processing => {
                self.start_polling(&mut job, JobStatus::Processing, ticket)
            }
            InitialStatus::Completed(result) => {
                track_info!("Job {} completed on submission", job_id);
                job.status = JobStatus::Completed;
                job.result = Some(result);
                job.stats = StatsState::Loading;
                self.phase = Phase::Settled(Outcome::Completed);
                vec![Effect::FetchStats {
                    ticket,
                    job_id: job_id.clone(),
                }]
            }
            InitialStatus::Failed { error } => {
                self.fail_job(&mut job, error);
                Vec::new()
            }
        };
        self.job = Some(job);
        effects
    }

    pub(crate) fn apply_status(
        &mut self,
        ticket: Ticket,
        job_id: JobId,
        result: Result<JobStatusSnapshot, TransportError>,
    ) -> Vec<Effect> {
        if !self.is_current(ticket, &job_id) || self.phase != Phase::Polling {
            track_debug!("Dropping stale status for job {} ({})", job_id, ticket);
            return Vec::new();
        }
        self.clear_rejection();
        let Some(mut job) = self.job.take() else {
            return Vec::new();
        };

        let effects = match result {
            Ok(JobStatusSnapshot::Pending) => {
                self.start_polling(&mut job, JobStatus::Pending, ticket)
            }
            Ok(JobStatusSnapshot::Processing) => {
                self.start_polling(&mut job, JobStatus::Processing, ticket)
            }
            Ok(JobStatusSnapshot::Completed) => {
                job.status = JobStatus::Completed;
                self.phase = Phase::Finalizing;
                self.mark_dirty();
                vec![Effect::FetchResult { ticket, job_id }]
            }
            Ok(JobStatusSnapshot::Failed { error }) => {
                self.fail_job(&mut job, error);
                Vec::new()
            }
            Err(err) => {
                track_warn!("Status poll for job {} failed: {}", job_id, err);
                job.status = JobStatus::Failed;
                job.error_message = Some(err.to_string());
                self.phase = Phase::Settled(Outcome::Failed);
                self.error = Some(JobError::Transport(err));
                self.mark_dirty();
                Vec::new()
            }
        };
        self.job = Some(job);
        effects
    }

    pub(crate) fn apply_result(
        &mut self,
        ticket: Ticket,
        job_id: JobId,
        result: Result<JobResult, TransportError>,
    ) -> Vec<Effect> {
        if !self.is_current(ticket, &job_id) || self.phase != Phase::Finalizing {
            track_debug!("Dropping stale result for job {} ({})", job_id, ticket);
            return Vec::new();
        }
        self.clear_rejection();
        let Some(job) = self.job.as_mut() else {
            return Vec::new();
        };
        self.dirty = true;

        match result {
            Ok(result) => {
                track_info!(
                    "Job {} completed with {} detections",
                    job_id,
                    result.detections.len()
                );
                job.result = Some(result);
                job.stats = StatsState::Loading;
                self.phase = Phase::Settled(Outcome::Completed);
                vec![Effect::FetchStats { ticket, job_id }]
            }
            Err(err) => {
                // Without its result a completed job is reported as failed.
                track_warn!("Result fetch for job {} failed: {}", job_id, err);
                job.status = JobStatus::Failed;
                job.error_message = Some(err.to_string());
                self.phase = Phase::Settled(Outcome::Failed);
                self.error = Some(JobError::Transport(err));
                Vec::new()
            }
        }
    }

    pub(crate) fn apply_stats(
        &mut self,
        ticket: Ticket,
        job_id: JobId,
        result: Result<JobStats, TransportError>,
    ) -> Vec<Effect> {
        if !self.is_current(ticket, &job_id) {
            track_debug!("Dropping stale stats for job {} ({})", job_id, ticket);
            return Vec::new();
        }
        let Some(job) = self.job.as_mut() else {
            return Vec::new();
        };
        if job.stats != StatsState::Loading {
            return Vec::new();
        }
        if matches!(self.error, Some(JobError::Validation(_))) {
            self.error = None;
        }

        job.stats = match result {
            Ok(stats) => StatsState::Ready(stats),
            Err(reason) => {
                track_warn!("Stats for job {} not available: {}", job_id, reason);
                StatsState::Unavailable { reason }
            }
        };
        self.dirty = true;
        Vec::new()
    }

    /// Enters (or stays in) `Polling`; repeated identical statuses are not
    /// reported as changes.
    fn start_polling(&mut self, job: &mut Job, status: JobStatus, ticket: Ticket) -> Vec<Effect> {
        if job.status != status || self.phase != Phase::Polling {
            job.status = status;
            self.phase = Phase::Polling;
            self.mark_dirty();
        }
        vec![Effect::SchedulePoll {
            ticket,
            job_id: job.job_id.clone(),
        }]
    }

    /// A rejected resubmission is shown only until the tracked job moves on.
    fn clear_rejection(&mut self) {
        if matches!(self.error, Some(JobError::Validation(_))) {
            self.error = None;
            self.mark_dirty();
        }
    }

    fn fail_job(&mut self, job: &mut Job, error: String) {
        track_info!("Job {} failed: {}", job.job_id, error);
        job.status = JobStatus::Failed;
        job.error_message = Some(error.clone());
        self.phase = Phase::Settled(Outcome::Failed);
        self.error = Some(JobError::JobFailed { message: error });
        self.mark_dirty();
    }
}
