use crate::{ControllerState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
///
/// Responses are tagged with the [`crate::Ticket`] (and job id) of the request
/// that produced them; a response for anything but the current submission is
/// dropped without touching state.
pub fn update(mut state: ControllerState, msg: Msg) -> (ControllerState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitRequested(request) => state.begin_submission(request),
        Msg::SubmissionRejected(err) => {
            state.reject_submission(err);
            Vec::new()
        }
        Msg::ResetRequested => state.reset(),
        Msg::Submitted { ticket, result } => state.apply_submission(ticket, result),
        Msg::StatusReceived {
            ticket,
            job_id,
            result,
        } => state.apply_status(ticket, job_id, result),
        Msg::ResultReceived {
            ticket,
            job_id,
            result,
        } => state.apply_result(ticket, job_id, result),
        Msg::StatsReceived {
            ticket,
            job_id,
            result,
        } => state.apply_stats(ticket, job_id, result),
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
