//! HTTP client for the audio processing service.
//!
//! Submits audio files (or media URLs) for summarization and queries the
//! status address of asynchronous jobs.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::status::{string_items, RuntimeStatus, Summary};
use crate::config::ApiConfig;
use crate::validation::AudioFile;

/// Input picked by the user for the next submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedInput {
    File(AudioFile),
    Url(String),
}

impl fmt::Display for SelectedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(file) => write!(f, "{} ({} bytes)", file.file_name, file.size),
            Self::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{}", status_message(.context, .status, .body))]
    Status {
        context: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to parse response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response carried neither a status query address nor a result")]
    EmptyResponse,

    #[error("Failed to read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn status_message(context: &str, status: &StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("{context} ({status})")
    } else {
        format!("{context} ({status}): {body}")
    }
}

/// Interpretation of a submission response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    /// The job runs asynchronously; poll this address for its run-state.
    Accepted { status_query_get_uri: String },
    /// The service answered with the result directly.
    Completed(Summary),
}

#[derive(Debug, Deserialize)]
struct RawSubmitResponse {
    #[serde(rename = "statusQueryGetUri")]
    status_query_get_uri: Option<String>,
    summary: Option<String>,
    #[serde(rename = "actionItems", alias = "action_items")]
    action_items: Option<Value>,
}

impl RawSubmitResponse {
    fn interpret(self) -> Result<SubmitResponse, ApiError> {
        if let Some(uri) = self.status_query_get_uri.filter(|u| !u.trim().is_empty()) {
            return Ok(SubmitResponse::Accepted {
                status_query_get_uri: uri,
            });
        }

        if self.summary.is_none() && self.action_items.is_none() {
            return Err(ApiError::EmptyResponse);
        }

        Ok(SubmitResponse::Completed(Summary {
            summary: self.summary.unwrap_or_default(),
            action_items: self
                .action_items
                .as_ref()
                .map(string_items)
                .unwrap_or_default(),
        }))
    }
}

/// Status-query response of an asynchronous job.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "runtimeStatus")]
    pub runtime_status: RuntimeStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(rename = "instanceId", default)]
    pub instance_id: Option<String>,
    #[serde(rename = "lastUpdatedTime", default)]
    pub last_updated_time: Option<String>,
}

impl StatusResponse {
    /// Server-provided text explaining a failure, if the output is plain text.
    pub fn failure_detail(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct UrlPayload<'a> {
    url: &'a str,
}

/// Remote side of a job: submission and status queries.
#[async_trait]
pub trait SummaryApi: Send + Sync {
    async fn submit(&self, input: &SelectedInput) -> Result<SubmitResponse, ApiError>;

    async fn query_status(&self, status_uri: &str) -> Result<StatusResponse, ApiError>;
}

/// reqwest-backed client for the processing service.
pub struct SummaryClient {
    client: reqwest::Client,
    process_audio_url: String,
}

impl SummaryClient {
    /// Create a client that submits to the given endpoint URL.
    pub fn new(process_audio_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            process_audio_url: process_audio_url.to_string(),
        }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(&api.process_audio_url())
    }

    /// Upload an audio file as multipart form field `file`, streamed from disk.
    pub async fn submit_audio(&self, audio: &AudioFile) -> Result<SubmitResponse, ApiError> {
        let file = File::open(&audio.path).await.map_err(|source| ApiError::File {
            path: audio.path.clone(),
            source,
        })?;
        let length = file
            .metadata()
            .await
            .map(|m| m.len())
            .unwrap_or(audio.size);

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(audio.file_name.clone())
            .mime_str(&audio.content_type)
            .map_err(|source| self.request_error(source))?;
        let form = Form::new().part("file", part);

        debug!(
            "Uploading {} ({} bytes) to {}",
            audio.file_name, length, self.process_audio_url
        );

        let response = self
            .client
            .post(&self.process_audio_url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| self.request_error(source))?;

        self.read_submit_response(response, "Failed to process audio")
            .await
    }

    /// Submit a media URL for processing.
    pub async fn submit_url(&self, url: &str) -> Result<SubmitResponse, ApiError> {
        debug!("Submitting URL {} to {}", url, self.process_audio_url);

        let response = self
            .client
            .post(&self.process_audio_url)
            .json(&UrlPayload { url })
            .send()
            .await
            .map_err(|source| self.request_error(source))?;

        self.read_submit_response(response, "Failed to process video")
            .await
    }

    /// Query the run-state of an asynchronous job.
    pub async fn get_status(&self, status_uri: &str) -> Result<StatusResponse, ApiError> {
        let response = self
            .client
            .get(status_uri)
            .send()
            .await
            .map_err(|source| ApiError::Request {
                url: status_uri.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Request {
            url: status_uri.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                context: "Failed to get job status",
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: status_uri.to_string(),
            source,
        })
    }

    async fn read_submit_response(
        &self,
        response: reqwest::Response,
        context: &'static str,
    ) -> Result<SubmitResponse, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| self.request_error(source))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                context,
                status,
                body,
            });
        }

        let raw: RawSubmitResponse =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                url: self.process_audio_url.clone(),
                source,
            })?;

        raw.interpret()
    }

    fn request_error(&self, source: reqwest::Error) -> ApiError {
        ApiError::Request {
            url: self.process_audio_url.clone(),
            source,
        }
    }
}

#[async_trait]
impl SummaryApi for SummaryClient {
    async fn submit(&self, input: &SelectedInput) -> Result<SubmitResponse, ApiError> {
        match input {
            SelectedInput::File(audio) => self.submit_audio(audio).await,
            SelectedInput::Url(url) => self.submit_url(url).await,
        }
    }

    async fn query_status(&self, status_uri: &str) -> Result<StatusResponse, ApiError> {
        self.get_status(status_uri).await
    }
}
