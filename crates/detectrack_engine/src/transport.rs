use std::fmt::Write as _;

use detectrack_core::{
    FilterOptions, JobId, JobResult, JobStats, JobStatusSnapshot, JobSubmission, MediaKind,
    SubmitRequest, TransportError,
};
use detectrack_logging::{track_debug, track_warn};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::wire::{WireErrorEnvelope, WireResult, WireStats, WireTask};
use crate::TransportSettings;

const NETWORK_ERROR: &str = "Network error";
const TIMEOUT_ERROR: &str = "Request timed out";
const GENERIC_ERROR: &str = "An error occurred";

/// Typed access to the remote detection service. Implementations never retry;
/// retry policy belongs to the caller.
#[async_trait::async_trait]
pub trait JobTransport: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobSubmission, TransportError>;

    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatusSnapshot, TransportError>;

    async fn fetch_result(&self, job_id: &JobId) -> Result<JobResult, TransportError>;

    async fn fetch_stats(&self, job_id: &JobId) -> Result<JobStats, TransportError>;

    /// Where the processed media can be downloaded. No I/O.
    fn download_url_for(&self, processed_filename: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    settings: TransportSettings,
}

impl HttpTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransportError::network(err.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Reuse an existing [`reqwest::Client`] (and its connection pool).
    pub fn with_client(client: reqwest::Client, settings: TransportSettings) -> Self {
        Self { client, settings }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/detection/{path}", self.settings.base())
    }

    fn job_endpoint(&self, kind: &str, job_id: &JobId) -> String {
        self.endpoint(&format!("{kind}/{}", encode_path_segment(job_id.as_str())))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, TransportError> {
        track_debug!("GET {}", url);
        let response = self.client.get(url).send().await;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl JobTransport for HttpTransport {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobSubmission, TransportError> {
        let url = self.endpoint(request.media_kind().as_str());
        let form = build_form(request)?;
        track_debug!("POST {} ({} bytes)", url, request.data().len());

        let response = self.client.post(url).multipart(form).send().await;
        let wire: WireResult = read_json(response).await?;
        Ok(wire.into_submission())
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatusSnapshot, TransportError> {
        let wire: WireTask = self.get_json(self.job_endpoint("status", job_id)).await?;
        Ok(wire.into())
    }

    async fn fetch_result(&self, job_id: &JobId) -> Result<JobResult, TransportError> {
        let url = self.job_endpoint("result", job_id);
        track_debug!("GET {}", url);
        let response = self.client.get(url).send().await;
        let (status, wire): (_, WireResult) = read_json_with_status(response).await?;
        wire.into_job_result().map_err(|detail| malformed(status, detail))
    }

    async fn fetch_stats(&self, job_id: &JobId) -> Result<JobStats, TransportError> {
        let wire: WireStats = self.get_json(self.job_endpoint("stats", job_id)).await?;
        Ok(wire.into())
    }

    fn download_url_for(&self, processed_filename: &str) -> String {
        download_url(&self.settings, processed_filename)
    }
}

/// `{base}/detection/download/{processed_filename}` with the filename encoded
/// as one path segment, so distinct names always give distinct URLs.
pub fn download_url(settings: &TransportSettings, processed_filename: &str) -> String {
    format!(
        "{}/detection/download/{}",
        settings.base(),
        encode_path_segment(processed_filename)
    )
}

/// Percent-encodes everything outside the RFC 3986 unreserved set. Dot
/// segments are encoded whole so they cannot be collapsed by URL parsers;
/// `url::PathSegmentsMut` would drop them instead.
fn encode_path_segment(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return "%2E".repeat(segment.len());
    }
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(&mut encoded, "%{byte:02X}");
        }
    }
    encoded
}

fn build_form(request: &SubmitRequest) -> Result<Form, TransportError> {
    let part = file_part(
        request.data(),
        request.file_name(),
        content_type_for(request.file_name(), request.media_kind()),
    )?;

    let mut form = Form::new().part("file", part);
    if let Some(filter) = request.filter() {
        if let Some(classes) = encode_target_classes(filter) {
            form = form.text("target_classes", classes);
        }
        form = form.text("min_confidence", filter.min_confidence.to_string());
    }
    Ok(form)
}

fn file_part(data: &[u8], file_name: &str, mime: &str) -> Result<Part, TransportError> {
    Part::bytes(data.to_vec())
        .file_name(file_name.to_string())
        .mime_str(mime)
        .map_err(|err| {
            TransportError::encoding(format!("invalid upload content type {mime:?}: {err}"))
        })
}

/// JSON array of class names in one field; `None` when unrestricted.
fn encode_target_classes(filter: &FilterOptions) -> Option<String> {
    let classes = filter.target_classes.as_ref()?;
    let names: Vec<&str> = classes.iter().map(|class| class.as_str()).collect();
    serde_json::to_string(&names).ok()
}

/// The service checks the declared content type against the endpoint.
fn content_type_for(file_name: &str, kind: MediaKind) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match (kind, extension.as_str()) {
        (MediaKind::Video, "mp4") => "video/mp4",
        (MediaKind::Video, "avi") => "video/x-msvideo",
        (MediaKind::Video, "mov") => "video/quicktime",
        (MediaKind::Video, _) => "video/mp4",
        (MediaKind::Image, "png") => "image/png",
        (MediaKind::Image, "gif") => "image/gif",
        (MediaKind::Image, "bmp") => "image/bmp",
        (MediaKind::Image, "webp") => "image/webp",
        (MediaKind::Image, _) => "image/jpeg",
    }
}

async fn read_json<T: DeserializeOwned>(
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, TransportError> {
    read_json_with_status(response).await.map(|(_, body)| body)
}

/// Like [`read_json`], keeping the status of the successful response.
async fn read_json_with_status<T: DeserializeOwned>(
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<(StatusCode, T), TransportError> {
    let response = response.map_err(map_reqwest_error)?;
    let status = response.status();
    let body = response.bytes().await.map_err(map_reqwest_error)?;

    if !status.is_success() {
        let err = TransportError::new(status.as_u16(), error_detail(&body));
        track_warn!("Service answered {}: {}", err.status_code, err.detail);
        return Err(err);
    }

    let decoded = serde_json::from_slice(&body).map_err(|err| malformed(status, err))?;
    Ok((status, decoded))
}

fn malformed(status: StatusCode, detail: impl std::fmt::Display) -> TransportError {
    TransportError::new(status.as_u16(), format!("malformed response: {detail}"))
}

/// Pulls `detail` out of the service's error envelope.
fn error_detail(body: &[u8]) -> String {
    match serde_json::from_slice::<WireErrorEnvelope>(body) {
        Ok(WireErrorEnvelope {
            detail: Some(serde_json::Value::String(detail)),
        }) if !detail.is_empty() => detail,
        Ok(WireErrorEnvelope {
            detail: Some(detail @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))),
        }) => detail.to_string(),
        _ => GENERIC_ERROR.to_string(),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    track_warn!("Request failed without a response: {}", err);
    if err.is_timeout() {
        TransportError::network(TIMEOUT_ERROR)
    } else {
        TransportError::network(NETWORK_ERROR)
    }
}
