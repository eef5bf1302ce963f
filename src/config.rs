//! Settings from `config.toml` in the platform config directory, with
//! environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.toml";
const DEFAULT_API_URL: &str = "http://localhost:8000/v1";
const DEBOUNCE_MIN_MS: u64 = 1000;
const DEBOUNCE_MAX_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub page_size: usize,
    pub sync_debounce_ms: u64,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_size: 10,
            sync_debounce_ms: 1500,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms.clamp(DEBOUNCE_MIN_MS, DEBOUNCE_MAX_MS))
    }

    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "elevate")
}

pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

/// Settings plus the reason the file was ignored, if it was. This runs before
/// the log subscriber exists, so the caller reports `warning`.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub warning: Option<String>,
}

pub fn load() -> Loaded {
    load_from(config_path().as_deref(), |key| std::env::var(key).ok())
}

/// Missing or unreadable files fall back to defaults; env wins over the file.
pub fn load_from(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Loaded {
    let mut warning = None;
    let mut config = match path {
        Some(path) if path.exists() => match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warning = Some(format!("Failed to parse {}: {}", path.display(), e));
                    Config::default()
                }
            },
            Err(e) => {
                warning = Some(format!("Failed to read {}: {}", path.display(), e));
                Config::default()
            }
        },
        _ => Config::default(),
    };

    if let Some(url) = env("ELEVATE_API_URL").filter(|v| !v.trim().is_empty()) {
        config.api_url = url;
    }
    if let Some(dir) = env("ELEVATE_DATA_DIR").filter(|v| !v.trim().is_empty()) {
        config.data_dir = Some(PathBuf::from(dir));
    }
    Loaded { config, warning }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = tempdir().unwrap();
        let loaded = load_from(Some(&temp.path().join("config.toml")), no_env);
        assert!(loaded.warning.is_none());
        let config = loaded.config;
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce_window(), Duration::from_millis(1500));
    }

    #[test]
    fn test_partial_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "api_url = \"https://api.example.org/v1\"\npage_size = 25\n").unwrap();

        let config = load_from(Some(&path), no_env).config;
        assert_eq!(config.api_url, "https://api.example.org/v1");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.sync_debounce_ms, 1500);
    }

    #[test]
    fn test_invalid_toml_uses_defaults_and_reports() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "page_size = [").unwrap();
        let loaded = load_from(Some(&path), no_env);
        assert_eq!(loaded.config, Config::default());
        let warning = loaded.warning.unwrap();
        assert!(warning.starts_with("Failed to parse"), "{}", warning);
        assert!(warning.contains("config.toml"));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "api_url = \"https://file.example\"\n").unwrap();

        let config = load_from(Some(&path), |key| match key {
            "ELEVATE_API_URL" => Some("https://env.example".to_string()),
            "ELEVATE_DATA_DIR" => Some("/tmp/elevate".to_string()),
            _ => None,
        })
        .config;
        assert_eq!(config.api_url, "https://env.example");
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/elevate"));
    }

    #[test]
    fn test_debounce_window_is_clamped() {
        let fast = Config { sync_debounce_ms: 10, ..Config::default() };
        assert_eq!(fast.debounce_window(), Duration::from_millis(1000));
        let slow = Config { sync_debounce_ms: 60_000, ..Config::default() };
        assert_eq!(slow.debounce_window(), Duration::from_millis(2000));
    }
}
