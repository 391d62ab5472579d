//! Detectrack core: pure job-lifecycle state machine and snapshot helpers.
mod effect;
mod error;
mod model;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use error::{JobError, TransportError, ValidationError};
pub use model::{
    BoundingBox, Detection, FilterOptions, InitialStatus, JobId, JobResult, JobStats, JobStatus,
    JobStatusSnapshot, JobSubmission, MediaKind, SubmitRequest, Ticket, VehicleClass,
};
pub use msg::Msg;
pub use state::{ControllerState, Job, Outcome, Phase, StatsState};
pub use update::update;
pub use view_model::ControllerSnapshot;
