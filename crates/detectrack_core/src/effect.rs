use crate::{JobId, SubmitRequest, Ticket};

/// Work requested by [`crate::update`]; executed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Cancel the poll timer and ignore every in-flight request of `ticket`.
    Abandon { ticket: Ticket },
    Submit { ticket: Ticket, request: SubmitRequest },
    /// Wait one poll interval, then fetch the status once.
    SchedulePoll { ticket: Ticket, job_id: JobId },
    FetchResult { ticket: Ticket, job_id: JobId },
    FetchStats { ticket: Ticket, job_id: JobId },
}

impl Effect {
    pub fn ticket(&self) -> Ticket {
        match self {
            Effect::Abandon { ticket }
            | Effect::Submit { ticket, .. }
            | Effect::SchedulePoll { ticket, .. }
            | Effect::FetchResult { ticket, .. }
            | Effect::FetchStats { ticket, .. } => *ticket,
        }
    }
}
