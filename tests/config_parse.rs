use islandviewer_client::config::{Config, OnJobError, SubmitFallback};

#[test]
fn parse_example_config() {
    let raw = include_str!("../islandviewer-client.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.poll.interval_seconds, 30);
    assert_eq!(cfg.submit.fallback, SubmitFallback::Curl);
    assert_eq!(cfg.download.retry, Config::default().download.retry);
    assert!(cfg.service.base_url.ends_with("/islandviewer"));
}

#[test]
fn partial_sections_fall_back_to_defaults() {
    let raw = r#"
        [poll]
        on_error = "keep_polling"
        max_wait_seconds = 0

        [download.retry]
        max_attempts = 0
        initial_delay_ms = 0
        max_delay_ms = 0
    "#;
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.poll.on_error, OnJobError::KeepPolling);
    assert_eq!(cfg.poll.interval_seconds, 30);
    assert!(cfg.poll.max_wait().is_none());
    assert!(cfg.download.retry.is_unbounded());
    assert_eq!(cfg.download.chunk_bytes, 8192);
    assert_eq!(cfg.submit.format_type, "GENBANK");
}
