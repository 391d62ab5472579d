use std::future::Future;
use std::sync::Arc;

use detectrack_core::{
    update, ControllerSnapshot, ControllerState, Effect, FilterOptions, Msg, SubmitRequest,
    Ticket, ValidationError,
};
use detectrack_logging::{track_debug, track_info};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::poll::PollHandle;
use crate::{ControllerSettings, JobTransport, StateObserver};

enum Command {
    Dispatch(Msg),
    Subscribe(Arc<dyn StateObserver>),
}

/// Handle to the job lifecycle controller.
///
/// All state lives on a driver task spawned onto the current tokio runtime;
/// the handle only sends intents and reads snapshots. Dropping the handle
/// stops the driver and cancels any outstanding requests.
pub struct Controller {
    tx: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<ControllerSnapshot>,
    transport: Arc<dyn JobTransport>,
    shutdown: CancellationToken,
}

impl Controller {
    /// Starts the driver task. Must be called from within a tokio runtime.
    pub fn spawn(transport: Arc<dyn JobTransport>, settings: ControllerSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = ControllerState::new();
        let (snapshot_tx, snapshots) = watch::channel(state.view());
        let shutdown = CancellationToken::new();

        let driver = Driver {
            state,
            transport: transport.clone(),
            settings,
            tx: tx.clone(),
            snapshots: snapshot_tx,
            observers: Vec::new(),
            shutdown: shutdown.clone(),
            scope: None,
            poll: None,
        };
        tokio::spawn(driver.run(rx));

        Self {
            tx,
            snapshots,
            transport,
            shutdown,
        }
    }

    /// Submits a new upload, superseding the current job.
    ///
    /// Invalid input is rejected here, before anything reaches the network;
    /// the error is also recorded as the controller's current error.
    pub fn submit(
        &self,
        file_name: impl Into<String>,
        data: Vec<u8>,
        filter: Option<FilterOptions>,
    ) -> Result<(), ValidationError> {
        match SubmitRequest::new(file_name, data, filter) {
            Ok(request) => {
                self.send(Msg::SubmitRequested(request));
                Ok(())
            }
            Err(err) => {
                self.send(Msg::SubmissionRejected(err.clone()));
                Err(err)
            }
        }
    }

    /// Drops the current job and returns to idle.
    pub fn reset(&self) {
        self.send(Msg::ResetRequested);
    }

    /// Registers an observer; it is called once right away with the current
    /// snapshot and then after every change.
    pub fn subscribe(&self, observer: Arc<dyn StateObserver>) {
        let _ = self.tx.send(Command::Subscribe(observer));
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.clone()
    }

    pub fn download_url_for(&self, processed_filename: &str) -> String {
        self.transport.download_url_for(processed_filename)
    }

    /// Stops the driver; later intents are ignored.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, msg: Msg) {
        let _ = self.tx.send(Command::Dispatch(msg));
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Requests belonging to one submission share a cancellation scope.
struct TicketScope {
    ticket: Ticket,
    cancel: CancellationToken,
}

struct Driver {
    state: ControllerState,
    transport: Arc<dyn JobTransport>,
    settings: ControllerSettings,
    tx: mpsc::UnboundedSender<Command>,
    snapshots: watch::Sender<ControllerSnapshot>,
    observers: Vec<Arc<dyn StateObserver>>,
    shutdown: CancellationToken,
    scope: Option<TicketScope>,
    poll: Option<PollHandle>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = rx.recv() => match command {
                    Some(Command::Dispatch(msg)) => self.dispatch(msg),
                    Some(Command::Subscribe(observer)) => {
                        observer.on_state_changed(&self.state.view());
                        self.observers.push(observer);
                    }
                    None => break,
                },
            }
        }
        self.poll = None;
        if let Some(scope) = self.scope.take() {
            scope.cancel.cancel();
        }
        track_debug!("Controller driver stopped");
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        for effect in effects {
            self.execute(effect);
        }
        if self.state.consume_dirty() {
            self.notify();
        }
    }

    fn notify(&self) {
        let snapshot = self.state.view();
        for observer in &self.observers {
            observer.on_state_changed(&snapshot);
        }
        self.snapshots.send_replace(snapshot);
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Abandon { ticket } => {
                if self.poll.as_ref().is_some_and(|poll| poll.ticket() == ticket) {
                    self.poll = None;
                }
                if let Some(scope) = self.scope.take_if(|scope| scope.ticket == ticket) {
                    scope.cancel.cancel();
                }
            }
            Effect::Submit { ticket, request } => {
                let transport = self.transport.clone();
                self.spawn_request(ticket, async move {
                    let result = transport.submit(&request).await;
                    Msg::Submitted { ticket, result }
                });
            }
            Effect::SchedulePoll { ticket, job_id } => {
                let scope = self.scope_for(ticket);
                let tx = self.tx.clone();
                // Replacing the handle cancels any previous poll.
                self.poll = Some(PollHandle::spawn(
                    ticket,
                    job_id,
                    self.settings.poll_interval,
                    self.transport.clone(),
                    &scope,
                    move |msg| {
                        let _ = tx.send(Command::Dispatch(msg));
                    },
                ));
            }
            Effect::FetchResult { ticket, job_id } => {
                let transport = self.transport.clone();
                self.spawn_request(ticket, async move {
                    let result = transport.fetch_result(&job_id).await;
                    Msg::ResultReceived {
                        ticket,
                        job_id,
                        result,
                    }
                });
            }
            Effect::FetchStats { ticket, job_id } => {
                let transport = self.transport.clone();
                self.spawn_request(ticket, async move {
                    let result = transport.fetch_stats(&job_id).await;
                    Msg::StatsReceived {
                        ticket,
                        job_id,
                        result,
                    }
                });
            }
        }
    }

    /// Cancellation token for `ticket`, opening a new scope (and closing the
    /// previous one) when the ticket changed.
    fn scope_for(&mut self, ticket: Ticket) -> CancellationToken {
        match &self.scope {
            Some(scope) if scope.ticket == ticket => scope.cancel.clone(),
            _ => {
                if let Some(previous) = self.scope.take() {
                    previous.cancel.cancel();
                }
                track_info!("Tracking submission {}", ticket);
                let cancel = self.shutdown.child_token();
                self.scope = Some(TicketScope {
                    ticket,
                    cancel: cancel.clone(),
                });
                cancel
            }
        }
    }

    fn spawn_request<F>(&mut self, ticket: Ticket, request: F)
    where
        F: Future<Output = Msg> + Send + 'static,
    {
        let cancel = self.scope_for(ticket);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    track_debug!("Request for {} abandoned", ticket);
                }
                msg = request => {
                    let _ = tx.send(Command::Dispatch(msg));
                }
            }
        });
    }
}
