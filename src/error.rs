use crate::transport::{ArtifactKind, TransportError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("input error: {0}")]
    Input(String),

    #[error("submission failed with HTTP {status}: {body}")]
    SubmissionHttp { status: u16, body: String },

    #[error("submission rejected by the service (status {code}){}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    SubmissionRejected { code: i64, message: Option<String> },

    #[error("submission timed out ({cause}); fallback: {fallback}")]
    SubmissionTimedOut { cause: String, fallback: String },

    #[error("unexpected response from {path}: {reason}")]
    Protocol { path: String, reason: String },

    #[error("job {token} reported status Error")]
    JobFailed { token: String },

    #[error("job {token} still '{last_status}' after waiting {waited:?}")]
    PollDeadline {
        token: String,
        last_status: String,
        waited: Duration,
    },

    #[error("status query for job {token} failed {failures} times in a row: {last}")]
    PollFailed {
        token: String,
        failures: u32,
        last: String,
    },

    #[error("download of {kind} for job {token} gave up after {attempts} attempts: {last}")]
    DownloadExhausted {
        token: String,
        kind: ArtifactKind,
        attempts: u32,
        last: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_submission_failure(&self) -> bool {
        matches!(
            self,
            Self::SubmissionHttp { .. }
                | Self::SubmissionRejected { .. }
                | Self::SubmissionTimedOut { .. }
        )
    }
}
