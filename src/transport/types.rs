use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SubmitForm {
    pub format_type: String,
    pub ref_accnum: Option<String>,
    pub genome_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct StreamReply {
    pub status: u16,
    pub body: Box<dyn Read>,
}

impl fmt::Debug for StreamReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReply")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub status: i64,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGenome {
    pub ref_accnum: String,
    pub name: String,
}

/// Job state as reported by the service. Only `Complete` and `Error` are
/// terminal; any other string means the job is still queued or running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Complete,
    Error,
    Pending(String),
}

impl JobStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "Complete" => Self::Complete,
            "Error" => Self::Error,
            other => Self::Pending(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Complete => "Complete",
            Self::Error => "Error",
            Self::Pending(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Genbank,
    Tab,
}

impl ArtifactKind {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Genbank => "genbank",
            Self::Tab => "tab",
        }
    }

    pub fn sample_suffix(self) -> &'static str {
        match self {
            Self::Genbank => "_islandviewer.gbk",
            Self::Tab => "_islandviewer.tbl",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}
