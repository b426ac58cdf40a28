use super::{types::*, Transport, TransportError, SUBMIT_PATH};
use crate::config::Config;
use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

pub const AUTH_HEADER: &str = "x-authtoken";

pub struct HttpTransport {
    client: Client,
    base_url: String,
    submit_timeout: Duration,
    request_timeout: Duration,
    download_timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(cfg: &Config, auth_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(auth_token)
            .context("authentication token contains characters not allowed in a header")?;
        auth.set_sensitive(true);
        headers.insert(AUTH_HEADER, auth);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(cfg.service.user_agent.clone())
            .connect_timeout(Duration::from_secs(cfg.service.connect_timeout_seconds))
            .timeout(None::<Duration>)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: cfg.service.base_url.trim_end_matches('/').to_string(),
            submit_timeout: Duration::from_secs(cfg.submit.timeout_seconds),
            request_timeout: Duration::from_secs(cfg.service.request_timeout_seconds),
            download_timeout: (cfg.download.timeout_seconds > 0)
                .then(|| Duration::from_secs(cfg.download.timeout_seconds)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, path: &str, req: RequestBuilder) -> Result<Response, TransportError> {
        debug!("http {}", path);
        req.send().map_err(|e| classify(path, e))
    }

    fn buffer(&self, path: &str, resp: Response) -> Result<Reply, TransportError> {
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| classify(path, e))?;
        Ok(Reply::new(status, body.to_vec()))
    }
}

impl Transport for HttpTransport {
    fn submit(&self, form: &SubmitForm) -> Result<Reply, TransportError> {
        let file_part = multipart::Part::file(&form.genome_file)
            .map_err(|source| TransportError::LocalFile {
                path: form.genome_file.display().to_string(),
                source,
            })?
            .file_name("filename")
            .mime_str("text/plain")
            .map_err(|e| classify(SUBMIT_PATH, e))?;

        let mut body = multipart::Form::new().text("format_type", form.format_type.clone());
        if let Some(acc) = &form.ref_accnum {
            body = body.text("ref_accnum", acc.clone());
        }
        let body = body.part("genome_file", file_part);

        let req = self
            .client
            .post(self.url(SUBMIT_PATH))
            .timeout(self.submit_timeout)
            .multipart(body);
        let resp = self.send(SUBMIT_PATH, req)?;
        self.buffer(SUBMIT_PATH, resp)
    }

    fn post(&self, path: &str) -> Result<Reply, TransportError> {
        let req = self
            .client
            .post(self.url(path))
            .header(CONTENT_TYPE, "text/plain")
            .timeout(self.request_timeout);
        let resp = self.send(path, req)?;
        self.buffer(path, resp)
    }

    fn get_stream(&self, path: &str) -> Result<StreamReply, TransportError> {
        let mut req = self
            .client
            .get(self.url(path))
            .header(CONTENT_TYPE, "text/plain");
        if let Some(t) = self.download_timeout {
            req = req.timeout(t);
        }
        let resp = self.send(path, req)?;
        Ok(StreamReply {
            status: resp.status().as_u16(),
            body: Box::new(resp),
        })
    }
}

fn classify(path: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            path: path.to_string(),
            detail: err.to_string(),
        }
    } else {
        TransportError::Request {
            path: path.to_string(),
            detail: err.to_string(),
        }
    }
}
