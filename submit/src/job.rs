//! Job parameters and the retry loop around an opaque submitter.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::session::{Credentials, Session};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FrameRange {
    pub first: i32,
    pub last: i32,
}

impl FrameRange {
    pub fn new(first: i32, last: i32) -> Self {
        debug_assert!(first <= last);
        Self { first, last }
    }

    pub fn count(&self) -> u32 {
        (self.last - self.first + 1) as u32
    }
}

impl std::fmt::Display for FrameRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid frame range: {0}")]
pub struct ParseFrameRangeError(String);

impl FromStr for FrameRange {
    type Err = ParseFrameRangeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseFrameRangeError(value.to_string());

        let (first, last) = match value.split_once('-') {
            Some((first, last)) => (
                first.trim().parse().map_err(|_| invalid())?,
                last.trim().parse().map_err(|_| invalid())?,
            ),
            None => {
                let frame = value.trim().parse().map_err(|_| invalid())?;
                (frame, frame)
            }
        };

        if first > last {
            return Err(invalid());
        }

        Ok(FrameRange { first, last })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    pub frame_range: FrameRange,
    pub frame_step: u32,
    pub chunk_size: u32,
    pub instance_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    pub priority: u32,
    pub upload_only: bool,
    pub skip_check: bool,
    pub notify_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
}

impl Default for JobParams {
    // dialog defaults carried over from the submission UI
    fn default() -> Self {
        JobParams {
            frame_range: FrameRange::new(1, 1),
            frame_step: 1,
            chunk_size: 10,
            instance_count: 1,
            instance_type: None,
            priority: 50,
            upload_only: false,
            skip_check: false,
            notify_complete: false,
            parent_job_id: None,
            tool_version: None,
            plugin_version: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub snapshot_path: PathBuf,
    /// Comma-joined names of the selected output nodes.
    pub outputs: String,
    pub params: JobParams,
}

impl SubmitRequest {
    pub fn new(snapshot_path: PathBuf, output_names: &[String], params: JobParams) -> Self {
        Self {
            snapshot_path,
            outputs: output_names.join(","),
            params,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("no credentials available in the session")]
    MissingCredentials,
    #[error("authentication rejected for {username}")]
    Auth { username: String },
    #[error("transient transport failure: {0}")]
    Transient(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// Opaque remote submission client.
pub trait Submitter {
    fn submit(
        &self,
        credentials: &Credentials,
        request: &SubmitRequest,
    ) -> Result<JobId, SubmitError>;
}

/// Drives the submitter until it succeeds or fails for a non-transient
/// reason. Authentication failures invalidate the session before
/// propagating so the caller can re-prompt.
pub fn drive_submission(
    submitter: &impl Submitter,
    session: &Session,
    request: &SubmitRequest,
) -> Result<JobId, SubmitError> {
    loop {
        let credentials = session.current().ok_or(SubmitError::MissingCredentials)?;

        match submitter.submit(&credentials, request) {
            Ok(job) => return Ok(job),
            Err(SubmitError::Transient(reason)) => {
                warn!(%reason, "transient submission failure, retrying");
            }
            Err(err @ SubmitError::Auth { .. }) => {
                session.invalidate();
                return Err(err);
            }
            Err(err) => return Err(err),
        }
    }
}
