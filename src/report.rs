use crate::client::{Downloaded, Job};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub job_token: String,
    pub input: PathBuf,
    pub reference_accession: Option<String>,
    pub submitted_via: String,
    pub status_calls: u32,
    pub waited_seconds: u64,
    pub started: String,
    pub finished: String,
    pub artifacts: Vec<ArtifactReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub kind: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub attempts: u32,
}

impl From<&Downloaded> for ArtifactReport {
    fn from(d: &Downloaded) -> Self {
        Self {
            kind: d.kind.to_string(),
            path: d.path.clone(),
            bytes: d.bytes,
            sha256: d.sha256.clone(),
            attempts: d.attempts,
        }
    }
}

impl RunReport {
    pub fn for_job(job: &Job, started: String) -> Self {
        Self {
            job_token: job.token.clone(),
            input: job.input.clone(),
            reference_accession: job.reference_accession.clone(),
            submitted_via: job.submitted_via.clone(),
            status_calls: 0,
            waited_seconds: 0,
            started,
            finished: String::new(),
            artifacts: Vec::new(),
        }
    }
}
