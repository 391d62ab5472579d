use thiserror::Error;

/// Bad local input, rejected before any network call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("minimum confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("file name must not be empty")]
    EmptyFileName,
    #[error("unknown vehicle class: {0}")]
    UnknownClass(String),
}

/// Normalized failure of a single transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct TransportError {
    /// HTTP status, or one of the sentinels below when no request completed.
    pub status_code: u16,
    pub detail: String,
}

impl TransportError {
    /// Sentinel status code for failures that produced no HTTP response.
    pub const NETWORK_FAILURE: u16 = 0;
    /// Sentinel status code for requests that could not be built locally.
    pub const REQUEST_ENCODING: u16 = 1;

    pub fn new(status_code: u16, detail: impl Into<String>) -> Self {
        Self {
            status_code,
            detail: detail.into(),
        }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(Self::NETWORK_FAILURE, detail)
    }

    pub fn encoding(detail: impl Into<String>) -> Self {
        Self::new(Self::REQUEST_ENCODING, detail)
    }

    pub fn is_network_failure(&self) -> bool {
        self.status_code == Self::NETWORK_FAILURE
    }
}

/// Every failure the controller can record against the current submission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{message}")]
    JobFailed { message: String },
    #[error("stats not available: {0}")]
    StatsUnavailable(TransportError),
}

impl JobError {
    /// Stats failures degrade the display only; everything else ends the submission.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, JobError::StatsUnavailable(_))
    }
}
