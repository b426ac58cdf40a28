use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: Service,
    #[serde(default)]
    pub submit: Submit,
    #[serde(default)]
    pub poll: Poll,
    #[serde(default)]
    pub download: Download,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub choices: Choices,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub base_url: String,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}
impl Default for Service {
    fn default() -> Self {
        Self {
            base_url: "http://www.pathogenomics.sfu.ca/islandviewer".into(),
            connect_timeout_seconds: 30,
            request_timeout_seconds: 120,
            user_agent: concat!("islandviewer-client/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitFallback {
    Curl,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Submit {
    pub format_type: String,
    pub timeout_seconds: u64,
    pub fallback: SubmitFallback,
    pub curl_exe: String,
    pub fallback_timeout_seconds: u64,
}
impl Default for Submit {
    fn default() -> Self {
        Self {
            format_type: "GENBANK".into(),
            timeout_seconds: 300,
            fallback: SubmitFallback::Curl,
            curl_exe: "curl".into(),
            fallback_timeout_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnJobError {
    Fail,
    KeepPolling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Poll {
    pub interval_seconds: u64,
    /// 0 waits forever.
    pub max_wait_seconds: u64,
    pub on_error: OnJobError,
    pub max_consecutive_failures: u32,
}
impl Default for Poll {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            max_wait_seconds: 86_400,
            on_error: OnJobError::Fail,
            max_consecutive_failures: 3,
        }
    }
}
impl Poll {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        (self.max_wait_seconds > 0).then(|| Duration::from_secs(self.max_wait_seconds))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Download {
    pub chunk_bytes: usize,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}
impl Default for Download {
    fn default() -> Self {
        Self {
            chunk_bytes: 8192,
            timeout_seconds: 0,
            retry: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub print_summary: bool,
    pub write_report_json: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            print_summary: true,
            write_report_json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Choices {
    pub choices_filename: String,
    pub properties_filename: String,
}
impl Default for Choices {
    fn default() -> Self {
        Self {
            choices_filename: "choices.txt".into(),
            properties_filename: "islandviewer_messages_en.properties".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
