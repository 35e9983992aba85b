use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use converter_engine::{ClientSettings, SyncStrategy, SESSION_FILENAME};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{ConvertArgs, ServerArgs};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Settings read from `converter.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub output_dir: PathBuf,
    pub strategy: SyncStrategy,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub session_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            server_url: client.base_url,
            output_dir: PathBuf::from("converted"),
            strategy: SyncStrategy::default(),
            poll_interval_ms: client.poll_interval.as_millis() as u64,
            max_poll_attempts: client.max_poll_attempts,
            request_timeout_secs: client.request_timeout.map(|t| t.as_secs()),
            connect_timeout_secs: client.connect_timeout.map(|t| t.as_secs()),
            session_file: PathBuf::from(SESSION_FILENAME),
            log_file: PathBuf::from("converter.log"),
        }
    }
}

impl AppConfig {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.server_url.clone(),
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_poll_attempts: self.max_poll_attempts,
        }
    }

    pub fn apply_server(&mut self, args: &ServerArgs) {
        if let Some(server) = &args.server {
            self.server_url = server.clone();
        }
    }

    pub fn apply_convert(&mut self, args: &ConvertArgs) {
        self.apply_server(&args.server);
        if args.push {
            self.strategy = SyncStrategy::Push;
        }
        if let Some(out) = &args.out {
            self.output_dir = out.clone();
        }
    }
}

/// Reads the config file. `Ok(None)` when it does not exist.
pub fn load_config(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    ron::from_str(&content)
        .map(Some)
        .map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_config(&dir.path().join("converter.ron")).unwrap(), None);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("converter.ron");
        fs::write(
            &path,
            r#"(server_url: "http://convert.local:9000", strategy: Push, max_poll_attempts: Some(30))"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap().unwrap();
        assert_eq!(
            config,
            AppConfig {
                server_url: "http://convert.local:9000".to_string(),
                strategy: SyncStrategy::Push,
                max_poll_attempts: Some(30),
                ..AppConfig::default()
            }
        );
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("converter.ron");
        fs::write(&path, "(server_url: 42").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn defaults_match_client_defaults() {
        let settings = AppConfig::default().client_settings();
        assert_eq!(settings.base_url, "http://localhost:8000");
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(settings.request_timeout, None);
        assert_eq!(settings.max_poll_attempts, None);
    }

    #[test]
    fn command_line_overrides_file() {
        let mut config = AppConfig::default();
        config.apply_convert(&ConvertArgs {
            server: ServerArgs {
                server: Some("https://img.example.com".to_string()),
            },
            format: converter_core::OutputFormat::Gif,
            push: true,
            out: Some(PathBuf::from("/tmp/out")),
            download: true,
            files: vec![PathBuf::from("a.png")],
        });
        assert_eq!(config.server_url, "https://img.example.com");
        assert_eq!(config.strategy, SyncStrategy::Push);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }
}
