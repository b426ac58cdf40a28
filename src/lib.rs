pub mod choices;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod transport;
pub mod util;

pub use client::{Job, JobClient};
pub use error::ClientError;
