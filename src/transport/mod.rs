pub mod curl;
pub mod http;
pub mod types;

use thiserror::Error;

pub use types::{
    ArtifactKind, JobStatus, ReferenceGenome, Reply, StatusResponse, StreamReply, SubmitForm,
    SubmitResponse,
};

pub const SUBMIT_PATH: &str = "/rest/submit/";
pub const GENOMES_PATH: &str = "/rest/genomes/";

pub fn job_path(token: &str) -> String {
    format!("/rest/job/{token}/")
}

pub fn download_path(token: &str, kind: ArtifactKind) -> String {
    format!("/rest/job/{token}/download/{}/", kind.path_segment())
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {path} timed out: {detail}")]
    Timeout { path: String, detail: String },

    #[error("request to {path} failed: {detail}")]
    Request { path: String, detail: String },

    #[error("reading local file {path}: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub trait Transport {
    fn submit(&self, form: &SubmitForm) -> Result<Reply, TransportError>;
    fn post(&self, path: &str) -> Result<Reply, TransportError>;
    fn get_stream(&self, path: &str) -> Result<StreamReply, TransportError>;
}

pub trait SubmitFallback {
    fn name(&self) -> &str;
    fn submit(&self, form: &SubmitForm) -> Result<Reply, TransportError>;
}
