use std::sync::Arc;
use std::time::Duration;

use detectrack_core::{JobId, Msg, Ticket};
use detectrack_logging::track_trace;
use tokio_util::sync::CancellationToken;

use crate::JobTransport;

/// The one outstanding status poll of the controller. Dropping the handle
/// cancels the pending timer and any in-flight status request.
pub(crate) struct PollHandle {
    ticket: Ticket,
    cancel: CancellationToken,
}

impl PollHandle {
    /// Waits `interval`, fetches the status once and hands the answer to
    /// `report`, unless cancelled first.
    pub(crate) fn spawn(
        ticket: Ticket,
        job_id: JobId,
        interval: Duration,
        transport: Arc<dyn JobTransport>,
        parent: &CancellationToken,
        report: impl FnOnce(Msg) + Send + 'static,
    ) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();

        tokio::spawn(async move {
            let poll = async move {
                tokio::time::sleep(interval).await;
                let result = transport.fetch_status(&job_id).await;
                (job_id, result)
            };
            tokio::select! {
                _ = token.cancelled() => {
                    track_trace!("Status poll for {} cancelled", ticket);
                }
                (job_id, result) = poll => {
                    report(Msg::StatusReceived { ticket, job_id, result });
                }
            }
        });

        Self { ticket, cancel }
    }

    pub(crate) fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
