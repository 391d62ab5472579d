use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

const VIDEO_EXTENSIONS: [&str; 3] = [".mp4", ".avi", ".mov"];

/// Opaque job identifier assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Locally assigned submission number. Tags every response so that replies
/// for a superseded submission can be recognised, even before a [`JobId`]
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify by filename suffix only, ignoring case. Anything that is not a
    /// known video suffix is an image.
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VehicleClass {
    Bicycle,
    Bus,
    Car,
    Motorcycle,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 5] = [
        VehicleClass::Bicycle,
        VehicleClass::Bus,
        VehicleClass::Car,
        VehicleClass::Motorcycle,
        VehicleClass::Truck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Bicycle => "bicycle",
            VehicleClass::Bus => "bus",
            VehicleClass::Car => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Truck => "truck",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        VehicleClass::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownClass(s.to_string()))
    }
}

/// Optional server-side filtering for a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    /// `None` means no class restriction.
    pub target_classes: Option<BTreeSet<VehicleClass>>,
    pub min_confidence: f64,
}

impl FilterOptions {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            target_classes: None,
            min_confidence,
        }
    }

    /// Restrict detection to the given classes; duplicates collapse.
    pub fn with_classes(mut self, classes: impl IntoIterator<Item = VehicleClass>) -> Self {
        self.target_classes = Some(classes.into_iter().collect());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(self.min_confidence));
        }
        Ok(())
    }
}

/// A validated upload, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    file_name: String,
    media_kind: MediaKind,
    data: Vec<u8>,
    filter: Option<FilterOptions>,
}

impl SubmitRequest {
    pub fn new(
        file_name: impl Into<String>,
        data: Vec<u8>,
        filter: Option<FilterOptions>,
    ) -> Result<Self, ValidationError> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(ValidationError::EmptyFileName);
        }
        if let Some(filter) = &filter {
            filter.validate()?;
        }
        Ok(Self {
            media_kind: MediaKind::from_filename(&file_name),
            file_name,
            data,
            filter,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn filter(&self) -> Option<&FilterOptions> {
        self.filter.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub class_id: u32,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: JobId,
    pub source_filename: String,
    pub processed_filename: String,
    pub detections: Vec<Detection>,
    pub processing_time_secs: f64,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobStats {
    pub total_vehicles: u32,
    pub by_class: BTreeMap<String, u32>,
    pub processing_time_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One answer from the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatusSnapshot {
    Pending,
    Processing,
    Completed,
    Failed { error: String },
}

/// Status carried by the submission response. A job the service finished
/// synchronously arrives with its result inline.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialStatus {
    Pending,
    Processing,
    Completed(JobResult),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    pub job_id: JobId,
    pub initial: InitialStatus,
}
