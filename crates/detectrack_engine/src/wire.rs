//! JSON shapes of the detection service and their mapping onto core types.

use std::collections::BTreeMap;

use detectrack_core::{
    BoundingBox, Detection, InitialStatus, JobId, JobResult, JobStats, JobStatusSnapshot,
    JobSubmission,
};
use serde::Deserialize;

const TASK_FAILED: &str = "Task failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum WireStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    class_id: u32,
    class_name: String,
}

impl From<WireDetection> for Detection {
    fn from(wire: WireDetection) -> Self {
        Detection {
            bbox: BoundingBox {
                x1: wire.x1,
                y1: wire.y1,
                x2: wire.x2,
                y2: wire.y2,
            },
            confidence: wire.confidence,
            class_id: wire.class_id,
            class_name: wire.class_name,
        }
    }
}

/// Body of the upload and result endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct WireResult {
    #[serde(alias = "job_id")]
    task_id: String,
    #[serde(default)]
    filename: String,
    processed_filename: Option<String>,
    #[serde(default)]
    detections: Vec<WireDetection>,
    #[serde(default)]
    processing_time: f64,
    created_at: Option<String>,
    status: WireStatus,
    error: Option<String>,
}

impl WireResult {
    /// A result body without a processed file cannot be materialized.
    fn into_result(self) -> Result<JobResult, String> {
        let processed_filename = self
            .processed_filename
            .ok_or_else(|| "missing field `processed_filename`".to_string())?;
        Ok(JobResult {
            job_id: JobId::new(self.task_id),
            source_filename: self.filename,
            processed_filename,
            detections: self.detections.into_iter().map(Detection::from).collect(),
            processing_time_secs: self.processing_time,
            created_at: self.created_at,
        })
    }

    pub(crate) fn into_job_result(self) -> Result<JobResult, String> {
        if self.status != WireStatus::Completed {
            return Err(format!("result has status {:?}", self.status));
        }
        self.into_result()
    }

    pub(crate) fn into_submission(self) -> JobSubmission {
        let job_id = JobId::new(self.task_id.clone());
        let initial = match self.status {
            WireStatus::Pending => InitialStatus::Pending,
            WireStatus::Processing => InitialStatus::Processing,
            WireStatus::Failed => InitialStatus::Failed {
                error: self.error.unwrap_or_else(|| TASK_FAILED.to_string()),
            },
            // A completed answer without its payload is picked up by polling.
            WireStatus::Completed => match self.into_result() {
                Ok(result) => InitialStatus::Completed(result),
                Err(_) => InitialStatus::Processing,
            },
        };
        JobSubmission { job_id, initial }
    }
}

/// Body of the status endpoint. Any inline result is ignored; the result
/// endpoint is authoritative.
#[derive(Debug, Deserialize)]
pub(crate) struct WireTask {
    status: WireStatus,
    error: Option<String>,
}

impl From<WireTask> for JobStatusSnapshot {
    fn from(task: WireTask) -> Self {
        match task.status {
            WireStatus::Pending => JobStatusSnapshot::Pending,
            WireStatus::Processing => JobStatusSnapshot::Processing,
            WireStatus::Completed => JobStatusSnapshot::Completed,
            WireStatus::Failed => JobStatusSnapshot::Failed {
                error: task.error.unwrap_or_else(|| TASK_FAILED.to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireStats {
    total_vehicles: u32,
    #[serde(default)]
    by_class: BTreeMap<String, u32>,
    #[serde(default)]
    processing_time: f64,
}

impl From<WireStats> for JobStats {
    fn from(wire: WireStats) -> Self {
        JobStats {
            total_vehicles: wire.total_vehicles,
            by_class: wire.by_class,
            processing_time_secs: wire.processing_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireErrorEnvelope {
    pub(crate) detail: Option<serde_json::Value>,
}
