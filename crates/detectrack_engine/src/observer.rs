use detectrack_core::ControllerSnapshot;

/// Receives a fresh snapshot after every change of controller state.
///
/// Callbacks run on the controller's driver task and only see a shared
/// reference; intents issued from inside a callback are queued behind the
/// current notification round.
pub trait StateObserver: Send + Sync {
    fn on_state_changed(&self, snapshot: &ControllerSnapshot);
}

impl<F> StateObserver for F
where
    F: Fn(&ControllerSnapshot) + Send + Sync,
{
    fn on_state_changed(&self, snapshot: &ControllerSnapshot) {
        self(snapshot)
    }
}
