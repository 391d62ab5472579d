use std::sync::Once;

use detectrack_core::{
    update, BoundingBox, ControllerState, Detection, Effect, FilterOptions, InitialStatus,
    JobError, JobId, JobResult, JobStats, JobStatus, JobStatusSnapshot, JobSubmission, MediaKind,
    Msg, Outcome, Phase, StatsState, SubmitRequest, Ticket, TransportError, ValidationError,
    VehicleClass,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(detectrack_logging::initialize_for_tests);
}

fn submit(state: ControllerState, file_name: &str) -> (ControllerState, Vec<Effect>) {
    let request = SubmitRequest::new(file_name, vec![0xFF, 0xD8], None).expect("valid request");
    update(state, Msg::SubmitRequested(request))
}

fn accepted(
    state: ControllerState,
    ticket: Ticket,
    job_id: &str,
    initial: InitialStatus,
) -> (ControllerState, Vec<Effect>) {
    update(
        state,
        Msg::Submitted {
            ticket,
            result: Ok(JobSubmission {
                job_id: JobId::from(job_id),
                initial,
            }),
        },
    )
}

fn status(
    state: ControllerState,
    ticket: Ticket,
    job_id: &str,
    snapshot: JobStatusSnapshot,
) -> (ControllerState, Vec<Effect>) {
    update(
        state,
        Msg::StatusReceived {
            ticket,
            job_id: JobId::from(job_id),
            result: Ok(snapshot),
        },
    )
}

fn detection(class_name: &str) -> Detection {
    Detection {
        bbox: BoundingBox {
            x1: 1.0,
            y1: 2.0,
            x2: 30.0,
            y2: 40.0,
        },
        confidence: 0.9,
        class_id: 2,
        class_name: class_name.to_string(),
    }
}

fn job_result(job_id: &str, detections: usize) -> JobResult {
    JobResult {
        job_id: JobId::from(job_id),
        source_filename: "car.jpg".to_string(),
        processed_filename: format!("processed_{job_id}.jpg"),
        detections: (0..detections).map(|_| detection("car")).collect(),
        processing_time_secs: 0.4,
        created_at: None,
    }
}

fn stats(total: u32) -> JobStats {
    JobStats {
        total_vehicles: total,
        by_class: [("car".to_string(), total)].into_iter().collect(),
        processing_time_secs: 0.4,
    }
}

#[test]
fn submit_moves_idle_to_submitting() {
    init_logging();
    let filter = FilterOptions::new(0.5).with_classes([VehicleClass::Car, VehicleClass::Car]);
    let request = SubmitRequest::new("clip.MOV", vec![1], Some(filter)).unwrap();
    let (mut state, effects) = update(ControllerState::new(), Msg::SubmitRequested(request.clone()));

    assert_eq!(
        effects,
        vec![Effect::Submit {
            ticket: Ticket(1),
            request
        }]
    );
    let view = state.view();
    assert_eq!(view.phase, Phase::Submitting);
    assert!(view.is_submitting);
    assert!(!view.is_computing);
    assert_eq!(view.source_filename.as_deref(), Some("clip.MOV"));
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn completed_job_is_finalized_then_stats_are_fetched() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, effects) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    assert_eq!(
        effects,
        vec![Effect::SchedulePoll {
            ticket: Ticket(1),
            job_id: JobId::from("t1")
        }]
    );
    let view = state.view();
    assert_eq!(view.phase, Phase::Polling);
    assert_eq!(view.status, Some(JobStatus::Processing));
    assert_eq!(view.media_kind, Some(MediaKind::Image));
    assert!(view.is_computing);

    let (state, effects) = status(state, Ticket(1), "t1", JobStatusSnapshot::Completed);
    assert_eq!(
        effects,
        vec![Effect::FetchResult {
            ticket: Ticket(1),
            job_id: JobId::from("t1")
        }]
    );
    assert_eq!(state.phase(), Phase::Finalizing);
    assert!(!state.view().is_computing);

    let (state, effects) = update(
        state,
        Msg::ResultReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Ok(job_result("t1", 3)),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchStats {
            ticket: Ticket(1),
            job_id: JobId::from("t1")
        }]
    );
    assert_eq!(state.view().stats, StatsState::Loading);

    let (state, effects) = update(
        state,
        Msg::StatsReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Ok(stats(3)),
        },
    );
    assert!(effects.is_empty());

    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Completed));
    assert_eq!(view.status, Some(JobStatus::Completed));
    assert_eq!(view.result.unwrap().detections.len(), 3);
    assert_eq!(view.stats, StatsState::Ready(stats(3)));
    assert_eq!(view.error_message, None);
}

#[test]
fn repeated_processing_polls_again_without_marking_dirty() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (mut state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    assert!(state.consume_dirty());

    let (mut state, effects) = status(state, Ticket(1), "t1", JobStatusSnapshot::Processing);
    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], Effect::SchedulePoll { .. }));
    assert!(!state.consume_dirty());
}

#[test]
fn pending_then_processing_is_reported_as_a_change() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (mut state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Pending);
    assert!(state.consume_dirty());
    assert_eq!(state.view().status, Some(JobStatus::Pending));
    assert!(state.view().is_computing);

    let (mut state, _) = status(state, Ticket(1), "t1", JobStatusSnapshot::Processing);
    assert!(state.consume_dirty());
    assert_eq!(state.view().status, Some(JobStatus::Processing));
}

#[test]
fn failed_status_settles_without_fetching_result() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "clip.mp4");
    let (state, _) = accepted(state, Ticket(1), "v1", InitialStatus::Processing);
    assert_eq!(state.view().media_kind, Some(MediaKind::Video));

    let (state, effects) = status(
        state,
        Ticket(1),
        "v1",
        JobStatusSnapshot::Failed {
            error: "decode error".to_string(),
        },
    );
    assert!(effects.is_empty());

    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Failed));
    assert_eq!(view.status, Some(JobStatus::Failed));
    assert_eq!(view.error_message.as_deref(), Some("decode error"));
    assert_eq!(view.result, None);
    assert_eq!(
        state.error(),
        Some(&JobError::JobFailed {
            message: "decode error".to_string()
        })
    );
}

#[test]
fn status_after_terminal_state_is_ignored() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    let (state, _) = status(
        state,
        Ticket(1),
        "t1",
        JobStatusSnapshot::Failed {
            error: "gpu lost".to_string(),
        },
    );

    let (next, effects) = status(state.clone(), Ticket(1), "t1", JobStatusSnapshot::Processing);
    assert!(effects.is_empty());
    assert_eq!(next, state);
}

#[test]
fn synchronous_completion_skips_polling() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, effects) = accepted(
        state,
        Ticket(1),
        "t1",
        InitialStatus::Completed(job_result("t1", 2)),
    );

    assert_eq!(
        effects,
        vec![Effect::FetchStats {
            ticket: Ticket(1),
            job_id: JobId::from("t1")
        }]
    );
    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Completed));
    assert_eq!(view.result.map(|r| r.detections.len()), Some(2));
}

#[test]
fn synchronous_failure_settles_failed() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, effects) = accepted(
        state,
        Ticket(1),
        "t1",
        InitialStatus::Failed {
            error: "model missing".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.view().error_message.as_deref(), Some("model missing"));
    assert_eq!(state.view().status, Some(JobStatus::Failed));
}

#[test]
fn submission_transport_error_is_surfaced() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, effects) = update(
        state,
        Msg::Submitted {
            ticket: Ticket(1),
            result: Err(TransportError::new(400, "File must be an image")),
        },
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Failed));
    assert_eq!(view.job_id, None);
    assert_eq!(view.source_filename.as_deref(), Some("car.jpg"));
    assert_eq!(view.error_message.as_deref(), Some("File must be an image"));
}

#[test]
fn status_transport_error_is_terminal() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    let (state, effects) = update(
        state,
        Msg::StatusReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Err(TransportError::new(404, "Task not found")),
        },
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Failed));
    assert!(!view.is_computing);
    assert_eq!(view.error_message.as_deref(), Some("Task not found"));
}

#[test]
fn result_fetch_failure_is_terminal_and_not_retried() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    let (state, _) = status(state, Ticket(1), "t1", JobStatusSnapshot::Completed);
    let (state, effects) = update(
        state,
        Msg::ResultReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Err(TransportError::network("Network error")),
        },
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Failed));
    assert_eq!(view.status, Some(JobStatus::Failed));
    assert_eq!(view.result, None);
    assert_eq!(view.error_message.as_deref(), Some("Network error"));
    assert!(!view.is_computing);
}

#[test]
fn stats_failure_keeps_completed_result() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    let (state, _) = status(state, Ticket(1), "t1", JobStatusSnapshot::Completed);
    let (state, _) = update(
        state,
        Msg::ResultReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Ok(job_result("t1", 3)),
        },
    );
    let (state, effects) = update(
        state,
        Msg::StatsReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Err(TransportError::new(500, "stats exploded")),
        },
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Completed));
    assert_eq!(view.status, Some(JobStatus::Completed));
    assert_eq!(view.result.as_ref().map(|r| r.detections.len()), Some(3));
    assert!(view.stats_unavailable());
    assert_eq!(view.error_message, None);
}

#[test]
fn rejected_submission_reports_error_and_keeps_current_job() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);

    let err = SubmitRequest::new("car.jpg", vec![1], Some(FilterOptions::new(1.5))).unwrap_err();
    let (state, effects) = update(state, Msg::SubmissionRejected(err));

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Polling);
    assert_eq!(view.job_id, Some(JobId::from("t1")));
    assert_eq!(
        view.error_message.as_deref(),
        Some("minimum confidence must be within [0, 1], got 1.5")
    );
}

#[test]
fn rejection_is_cleared_once_the_tracked_job_completes() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);

    let err = SubmitRequest::new("car.jpg", vec![1], Some(FilterOptions::new(1.5))).unwrap_err();
    let (mut state, _) = update(state, Msg::SubmissionRejected(err));
    assert!(state.consume_dirty());

    let (mut state, _) = status(state, Ticket(1), "t1", JobStatusSnapshot::Completed);
    assert!(state.consume_dirty());
    assert_eq!(state.view().error_message, None);

    let (state, _) = update(
        state,
        Msg::ResultReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Ok(job_result("t1", 3)),
        },
    );
    let (state, _) = update(
        state,
        Msg::StatsReceived {
            ticket: Ticket(1),
            job_id: JobId::from("t1"),
            result: Ok(stats(3)),
        },
    );

    let view = state.view();
    assert_eq!(view.phase, Phase::Settled(Outcome::Completed));
    assert_eq!(view.status, Some(JobStatus::Completed));
    assert_eq!(view.error_message, None);
    assert_eq!(state.error(), None);
}

#[test]
fn repeated_processing_still_clears_a_rejection() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    let (mut state, _) = update(state, Msg::SubmissionRejected(ValidationError::EmptyFileName));
    state.consume_dirty();

    let (mut state, effects) = status(state, Ticket(1), "t1", JobStatusSnapshot::Processing);

    assert_eq!(effects.len(), 1);
    assert!(state.consume_dirty());
    assert_eq!(state.view().error_message, None);
}

#[test]
fn reset_abandons_polling_job() {
    init_logging();
    let (state, _) = submit(ControllerState::new(), "car.jpg");
    let (state, _) = accepted(state, Ticket(1), "t1", InitialStatus::Processing);
    let (mut state, effects) = update(state, Msg::ResetRequested);

    assert_eq!(effects, vec![Effect::Abandon { ticket: Ticket(1) }]);
    assert_eq!(state.view(), ControllerState::new().view());
    assert!(state.consume_dirty());

    let (state, effects) = status(state, Ticket(1), "t1", JobStatusSnapshot::Completed);
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Idle);
}
