use super::{http::AUTH_HEADER, types::*, SubmitFallback, TransportError, SUBMIT_PATH};
use crate::config::Config;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const STATUS_MARKER: &str = "\n__ivc_http_status__:";
const WATCHDOG_MARGIN: Duration = Duration::from_secs(2);

pub struct CurlSubmitter {
    curl_exe: PathBuf,
    base_url: String,
    auth_token: String,
    timeout: Duration,
}

impl CurlSubmitter {
    pub fn new(cfg: &Config, auth_token: &str) -> Self {
        Self {
            curl_exe: PathBuf::from(&cfg.submit.curl_exe),
            base_url: cfg.service.base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
            timeout: Duration::from_secs(cfg.submit.fallback_timeout_seconds),
        }
    }

    pub fn version(&self) -> Result<String, TransportError> {
        let out = Command::new(&self.curl_exe)
            .arg("--version")
            .output()
            .map_err(|e| self.failed(format!("spawning {}: {e}", self.curl_exe.display())))?;
        if !out.status.success() {
            return Err(self.failed(format!("curl --version exited with {}", out.status)));
        }
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    fn failed(&self, detail: String) -> TransportError {
        TransportError::Request {
            path: SUBMIT_PATH.to_string(),
            detail,
        }
    }
}

impl SubmitFallback for CurlSubmitter {
    fn name(&self) -> &str {
        "curl"
    }

    fn submit(&self, form: &SubmitForm) -> Result<Reply, TransportError> {
        if !form.genome_file.is_file() {
            return Err(TransportError::LocalFile {
                path: form.genome_file.display().to_string(),
                source: std::io::Error::new(ErrorKind::NotFound, "not a file"),
            });
        }

        let args = build_args(&self.base_url, form, self.timeout);
        debug!("curl fallback {} args={}", self.curl_exe.display(), args.len());

        let mut child = Command::new(&self.curl_exe)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failed(format!("spawning {}: {e}", self.curl_exe.display())))?;

        // The token travels on stdin (`--header @-`) so it never shows up in argv.
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| self.failed("no stdin for curl".to_string()))?;
            let header = format!("{AUTH_HEADER}: {}\n", self.auth_token);
            match stdin.write_all(header.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.failed(format!("writing curl stdin: {e}")));
                }
            }
        }

        // curl enforces --max-time itself; the margin catches a hung process.
        let output = wait_with_timeout(&mut child, self.timeout + WATCHDOG_MARGIN)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Exit code 28 is curl's own "operation timed out".
            if output.status.code() == Some(28) {
                return Err(TransportError::Timeout {
                    path: SUBMIT_PATH.to_string(),
                    detail: format!("curl: {}", stderr.trim()),
                });
            }
            return Err(self.failed(format!(
                "curl exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_output(&output.stdout).ok_or_else(|| {
            self.failed("curl output did not include an HTTP status".to_string())
        })
    }
}

pub fn build_args(base_url: &str, form: &SubmitForm, timeout: Duration) -> Vec<String> {
    let mut args = vec![
        "--silent".to_string(),
        "--show-error".to_string(),
        "--max-time".to_string(),
        timeout.as_secs().max(1).to_string(),
        "--request".to_string(),
        "POST".to_string(),
        "--header".to_string(),
        "@-".to_string(),
        "--form-string".to_string(),
        format!("format_type={}", form.format_type),
    ];
    if let Some(acc) = &form.ref_accnum {
        args.push("--form-string".to_string());
        args.push(format!("ref_accnum={acc}"));
    }
    args.push("--form".to_string());
    args.push(format!(
        "genome_file=@{};filename=filename;type=text/plain",
        quote_form_value(&form.genome_file.display().to_string())
    ));
    args.push("--write-out".to_string());
    args.push(format!("{STATUS_MARKER}%{{http_code}}"));
    args.push(format!("{base_url}{SUBMIT_PATH}"));
    args
}

// `-F` splits on `;` and `,` unless the value is double-quoted.
fn quote_form_value(raw: &str) -> String {
    let escaped = raw.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

pub fn parse_output(stdout: &[u8]) -> Option<Reply> {
    let text = String::from_utf8_lossy(stdout);
    let idx = text.rfind(STATUS_MARKER)?;
    let status: u16 = text[idx + STATUS_MARKER.len()..].trim().parse().ok()?;
    Some(Reply::new(status, text[..idx].as_bytes().to_vec()))
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output, TransportError> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let io_err = |e: std::io::Error| TransportError::Request {
        path: SUBMIT_PATH.to_string(),
        detail: format!("curl process: {e}"),
    };
    let join = |h: std::thread::JoinHandle<std::io::Result<Vec<u8>>>| {
        h.join()
            .map_err(|_| TransportError::Request {
                path: SUBMIT_PATH.to_string(),
                detail: "curl reader thread panicked".to_string(),
            })?
            .map_err(io_err)
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            return Ok(Output {
                status,
                stdout: join(stdout_thread)?,
                stderr: join(stderr_thread)?,
            });
        }

        if start.elapsed() > timeout {
            warn!("curl process timed out after {:?}", timeout);
            let _ = child.kill();
            let _ = child.wait();
            let stderr = join(stderr_thread).unwrap_or_default();
            let _ = join(stdout_thread);
            return Err(TransportError::Timeout {
                path: SUBMIT_PATH.to_string(),
                detail: format!(
                    "curl exceeded {:?}; stderr: {}",
                    timeout,
                    String::from_utf8_lossy(&stderr).trim()
                ),
            });
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
