use crate::{
    JobId, JobResult, JobStats, JobStatusSnapshot, JobSubmission, SubmitRequest, Ticket,
    TransportError, ValidationError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User submitted a validated upload; supersedes any current job.
    SubmitRequested(SubmitRequest),
    /// User input failed local validation; nothing was sent.
    SubmissionRejected(ValidationError),
    /// User asked to drop the current job and return to idle.
    ResetRequested,
    /// Transport answered a submission.
    Submitted {
        ticket: Ticket,
        result: Result<JobSubmission, TransportError>,
    },
    /// Transport answered a status poll.
    StatusReceived {
        ticket: Ticket,
        job_id: JobId,
        result: Result<JobStatusSnapshot, TransportError>,
    },
    /// Transport answered the result fetch.
    ResultReceived {
        ticket: Ticket,
        job_id: JobId,
        result: Result<JobResult, TransportError>,
    },
    /// Transport answered the stats fetch.
    StatsReceived {
        ticket: Ticket,
        job_id: JobId,
        result: Result<JobStats, TransportError>,
    },
    NoOp,
}
