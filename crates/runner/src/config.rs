use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    ferry_pipeline::PipelineConfig,
    ferry_platform::PlatformConfig,
    ferry_responder::ResponderConfig,
    serde::Deserialize,
};

fn default_db_path() -> PathBuf {
    PathBuf::from("ferry.db")
}

/// Top-level TOML config for the `ferry` binary.
#[derive(Debug, Deserialize)]
pub struct RunnerConfig {
    /// SQLite database file; created on first run.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    pub platform: PlatformConfig,

    pub responder: ResponderConfig,
}

impl RunnerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: RunnerConfig = toml::from_str(
            r#"
            [platform]
            base_url      = "https://api.example.com"
            client_id     = "id"
            client_secret = "secret"
            account_id    = "12345"

            [responder]
            endpoint = "http://127.0.0.1:10002"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("ferry.db"));
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.pipeline.poll_interval_secs, 30);
        assert_eq!(config.responder.timeout_secs, 60);
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let config: RunnerConfig = toml::from_str(
            r#"
            db_path = "/var/lib/ferry/ferry.db"

            [pipeline]
            workers            = 8
            poll_interval_secs = 5

            [platform]
            base_url      = "https://api.example.com"
            client_id     = "id"
            client_secret = "secret"
            account_id    = "12345"

            [responder]
            endpoint       = "http://127.0.0.1:10002"
            fallback_reply = "try again later"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/ferry/ferry.db"));
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.poll_interval_secs, 5);
        assert_eq!(config.responder.fallback_reply, "try again later");
    }

    #[test]
    fn test_missing_platform_section_is_an_error() {
        let result: Result<RunnerConfig, _> = toml::from_str(
            r#"
            [responder]
            endpoint = "http://127.0.0.1:10002"
            "#,
        );
        assert!(result.is_err());
    }
}
