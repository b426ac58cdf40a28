use crate::{
    config::{Config, OnJobError},
    error::ClientError,
    retry::{CancelToken, Clock, RetryPolicy, SystemClock},
    transport::{
        self, ArtifactKind, JobStatus, ReferenceGenome, Reply, StatusResponse, SubmitFallback,
        SubmitForm, SubmitResponse, Transport,
    },
    util::snippet,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub token: String,
    pub input: PathBuf,
    pub reference_accession: Option<String>,
    pub submitted_via: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitOutcome {
    pub status: JobStatus,
    pub status_calls: u32,
    pub waited: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct Downloaded {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub attempts: u32,
}

pub struct JobClient<T: Transport> {
    transport: T,
    fallback: Option<Box<dyn SubmitFallback>>,
    clock: Box<dyn Clock>,
    cancel: CancelToken,
    format_type: String,
    poll_interval: Duration,
    max_wait: Option<Duration>,
    on_error: OnJobError,
    max_consecutive_failures: u32,
    download_retry: RetryPolicy,
    chunk_bytes: usize,
}

impl<T: Transport> JobClient<T> {
    pub fn new(cfg: &Config, transport: T) -> Self {
        Self {
            transport,
            fallback: None,
            clock: Box::new(SystemClock),
            cancel: CancelToken::new(),
            format_type: cfg.submit.format_type.clone(),
            poll_interval: cfg.poll.interval(),
            max_wait: cfg.poll.max_wait(),
            on_error: cfg.poll.on_error,
            max_consecutive_failures: cfg.poll.max_consecutive_failures,
            download_retry: cfg.download.retry.clone(),
            chunk_bytes: cfg.download.chunk_bytes.max(1),
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn SubmitFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn check_cancelled(&self) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        Ok(())
    }

    fn pause(&self, d: Duration) -> Result<(), ClientError> {
        if d.is_zero() {
            return self.check_cancelled();
        }
        if self.clock.sleep(d, &self.cancel) {
            Ok(())
        } else {
            Err(ClientError::Cancelled)
        }
    }

    /// A timed-out upload is retried once through the configured fallback.
    pub fn submit(
        &self,
        input: &Path,
        reference_accession: Option<&str>,
    ) -> Result<Job, ClientError> {
        if !input.is_file() {
            return Err(ClientError::Input(format!(
                "could not find file '{}'",
                input.display()
            )));
        }
        self.check_cancelled()?;

        let form = SubmitForm {
            format_type: self.format_type.clone(),
            ref_accnum: reference_accession.map(str::to_string),
            genome_file: input.to_path_buf(),
        };

        info!(
            "submitting {} (reference={})",
            input.display(),
            reference_accession.unwrap_or("-")
        );

        let (reply, via) = match self.transport.submit(&form) {
            Ok(reply) => (reply, "http".to_string()),
            Err(err) if err.is_timeout() => {
                warn!("submission timed out: {err}");
                let Some(fallback) = &self.fallback else {
                    return Err(ClientError::SubmissionTimedOut {
                        cause: err.to_string(),
                        fallback: "none configured".to_string(),
                    });
                };
                info!("retrying submission once via {}", fallback.name());
                match fallback.submit(&form) {
                    Ok(reply) => (reply, fallback.name().to_string()),
                    Err(fb_err) => {
                        return Err(ClientError::SubmissionTimedOut {
                            cause: err.to_string(),
                            fallback: format!("{} failed: {fb_err}", fallback.name()),
                        });
                    }
                }
            }
            Err(err) => return Err(err.into()),
        };

        let token = accept_submission(&reply)?;
        info!("job accepted token={token} via={via}");

        Ok(Job {
            token,
            input: input.to_path_buf(),
            reference_accession: reference_accession.map(str::to_string),
            submitted_via: via,
        })
    }

    pub fn poll(&self, job: &Job) -> Result<JobStatus, ClientError> {
        self.poll_token(&job.token)
    }

    pub fn poll_token(&self, token: &str) -> Result<JobStatus, ClientError> {
        self.check_cancelled()?;
        let path = transport::job_path(token);
        let reply = self.transport.post(&path)?;
        if !reply.is_success() {
            return Err(ClientError::Protocol {
                path,
                reason: format!("HTTP {}: {}", reply.status, snippet(&reply.body, 200)),
            });
        }
        let decoded: StatusResponse = parse_json(&path, &reply)?;
        Ok(JobStatus::from_wire(&decoded.status))
    }

    pub fn wait_for_completion(&self, job: &Job) -> Result<WaitOutcome, ClientError> {
        let started = self.clock.now();
        let mut calls = 0u32;
        let mut failures = 0u32;
        let mut last_status = String::from("unknown");

        loop {
            calls += 1;
            match self.poll(job) {
                Ok(status) => {
                    failures = 0;
                    last_status = status.to_string();
                    info!("job {} status={}", job.token, status);
                    match status {
                        JobStatus::Complete => {
                            return Ok(WaitOutcome {
                                status,
                                status_calls: calls,
                                waited: self.clock.now().saturating_duration_since(started),
                            });
                        }
                        JobStatus::Error => match self.on_error {
                            OnJobError::Fail => {
                                return Err(ClientError::JobFailed {
                                    token: job.token.clone(),
                                });
                            }
                            OnJobError::KeepPolling => {
                                warn!("job {} reported Error; polling continues", job.token);
                            }
                        },
                        JobStatus::Pending(_) => {}
                    }
                }
                Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
                Err(err @ (ClientError::Transport(_) | ClientError::Protocol { .. })) => {
                    failures += 1;
                    warn!(
                        "status query {} for job {} failed ({}/{}): {err}",
                        calls, job.token, failures, self.max_consecutive_failures
                    );
                    if failures > self.max_consecutive_failures {
                        return Err(ClientError::PollFailed {
                            token: job.token.clone(),
                            failures,
                            last: err.to_string(),
                        });
                    }
                }
                Err(err) => return Err(err),
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if let Some(max) = self.max_wait {
                if waited + self.poll_interval > max {
                    return Err(ClientError::PollDeadline {
                        token: job.token.clone(),
                        last_status,
                        waited,
                    });
                }
            }
            self.pause(self.poll_interval)?;
        }
    }

    /// The body is streamed to `<dest>.part` and renamed once complete.
    pub fn download(
        &self,
        job: &Job,
        kind: ArtifactKind,
        dest: &Path,
    ) -> Result<Downloaded, ClientError> {
        let path = transport::download_path(&job.token, kind);
        let started = self.clock.now();
        let mut attempt = 0u32;

        loop {
            self.check_cancelled()?;
            attempt += 1;

            let last = match self.try_download(&path, dest) {
                Ok(Attempt::Done { bytes, sha256 }) => {
                    info!(
                        "downloaded {} for job {} -> {} ({} bytes, attempt {})",
                        kind,
                        job.token,
                        dest.display(),
                        bytes,
                        attempt
                    );
                    return Ok(Downloaded {
                        kind,
                        path: dest.to_path_buf(),
                        bytes,
                        sha256,
                        attempts: attempt,
                    });
                }
                Ok(Attempt::Status(status, body)) => format!("HTTP {status}: {body}"),
                Ok(Attempt::Interrupted(e)) => format!("body interrupted: {e}"),
                Err(ClientError::Transport(e)) => e.to_string(),
                Err(other) => return Err(other),
            };

            let elapsed = self.clock.now().saturating_duration_since(started);
            if !self.download_retry.allows_another(attempt, elapsed) {
                return Err(ClientError::DownloadExhausted {
                    token: job.token.clone(),
                    kind,
                    attempts: attempt,
                    last,
                });
            }

            let delay = self.download_retry.delay_after(attempt);
            if self.download_retry.is_unbounded() && delay.is_zero() {
                debug!("download {kind} attempt {attempt} failed ({last}); retrying now");
            } else {
                warn!("download {kind} attempt {attempt} failed ({last}); retrying in {delay:?}");
            }
            self.pause(delay)?;
        }
    }

    fn try_download(&self, path: &str, dest: &Path) -> Result<Attempt, ClientError> {
        let mut reply = self.transport.get_stream(path)?;
        if reply.status != 200 {
            let mut head = Vec::new();
            let _ = (&mut reply.body).take(512).read_to_end(&mut head);
            return Ok(Attempt::Status(reply.status, snippet(&head, 200)));
        }

        let part = part_path(dest);
        let result = self
            .stream_to(&mut reply.body, &part)
            .and_then(|attempt| match attempt {
                Attempt::Done { .. } => std::fs::rename(&part, dest)
                    .map(|()| attempt)
                    .map_err(|e| ClientError::io(dest, e)),
                other => Ok(other),
            });
        if !matches!(result, Ok(Attempt::Done { .. })) {
            let _ = std::fs::remove_file(&part);
        }
        result
    }

    fn stream_to(&self, body: &mut dyn Read, part: &Path) -> Result<Attempt, ClientError> {
        let mut file = File::create(part).map_err(|e| ClientError::io(part, e))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_bytes];
        let mut total = 0u64;

        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Ok(Attempt::Interrupted(e)),
            };
            file.write_all(&buf[..n]).map_err(|e| ClientError::io(part, e))?;
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        file.flush().map_err(|e| ClientError::io(part, e))?;
        Ok(Attempt::Done {
            bytes: total,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }

    pub fn list_genomes(&self) -> Result<Vec<ReferenceGenome>, ClientError> {
        self.check_cancelled()?;
        let reply = self.transport.post(transport::GENOMES_PATH)?;
        if !reply.is_success() {
            return Err(ClientError::Protocol {
                path: transport::GENOMES_PATH.to_string(),
                reason: format!("HTTP {}: {}", reply.status, snippet(&reply.body, 200)),
            });
        }
        parse_json(transport::GENOMES_PATH, &reply)
    }
}

enum Attempt {
    Done { bytes: u64, sha256: String },
    Status(u16, String),
    Interrupted(std::io::Error),
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn accept_submission(reply: &Reply) -> Result<String, ClientError> {
    if !reply.is_success() {
        return Err(ClientError::SubmissionHttp {
            status: reply.status,
            body: snippet(&reply.body, 300),
        });
    }
    let decoded: SubmitResponse = parse_json(transport::SUBMIT_PATH, reply)?;
    if decoded.status != 200 {
        return Err(ClientError::SubmissionRejected {
            code: decoded.status,
            message: decoded.message,
        });
    }
    match decoded.token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(ClientError::Protocol {
            path: transport::SUBMIT_PATH.to_string(),
            reason: "accepted submission carried no token".to_string(),
        }),
    }
}

fn parse_json<O: for<'de> serde::Deserialize<'de>>(
    path: &str,
    reply: &Reply,
) -> Result<O, ClientError> {
    serde_json::from_slice(&reply.body).map_err(|e| ClientError::Protocol {
        path: path.to_string(),
        reason: format!("invalid JSON ({e}): {}", snippet(&reply.body, 200)),
    })
}
