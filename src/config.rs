use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "REELS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("reels-tui/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    crate::feed::PAGE_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_mpv_path")]
    pub mpv_path: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub fullscreen: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mpv_path: default_mpv_path(),
            extra_args: Vec::new(),
            fullscreen: false,
        }
    }
}

fn default_mpv_path() -> String {
    "mpv".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    #[serde(default = "default_auth_path")]
    pub auth_path: String,
    #[serde(default = "default_upload_timeout", with = "humantime_serde")]
    pub upload_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_url: default_upload_url(),
            auth_path: default_auth_path(),
            upload_timeout: default_upload_timeout(),
        }
    }
}

fn default_upload_url() -> String {
    crate::upload::DEFAULT_UPLOAD_URL.to_string()
}

fn default_auth_path() -> String {
    "/api/imagekit-auth".into()
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    let path = options.config_file.or_else(default_config_path);
    if let Some(path) = path {
        if path.exists() {
            let from_file = read_config_file(&path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Fields in `other` that differ from their defaults replace those in `base`.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if other.server.base_url != defaults.server.base_url && !other.server.base_url.is_empty() {
        base.server.base_url = other.server.base_url;
    }
    if other.server.user_agent != defaults.server.user_agent && !other.server.user_agent.is_empty()
    {
        base.server.user_agent = other.server.user_agent;
    }
    if other.server.timeout != defaults.server.timeout {
        base.server.timeout = other.server.timeout;
    }

    if other.feed.page_size != defaults.feed.page_size && other.feed.page_size != 0 {
        base.feed.page_size = other.feed.page_size;
    }

    if other.player.mpv_path != defaults.player.mpv_path && !other.player.mpv_path.is_empty() {
        base.player.mpv_path = other.player.mpv_path;
    }
    if !other.player.extra_args.is_empty() {
        base.player.extra_args = other.player.extra_args;
    }
    if other.player.fullscreen != defaults.player.fullscreen {
        base.player.fullscreen = other.player.fullscreen;
    }

    if other.media.upload_url != defaults.media.upload_url && !other.media.upload_url.is_empty() {
        base.media.upload_url = other.media.upload_url;
    }
    if other.media.auth_path != defaults.media.auth_path && !other.media.auth_path.is_empty() {
        base.media.auth_path = other.media.auth_path;
    }
    if other.media.upload_timeout != defaults.media.upload_timeout {
        base.media.upload_timeout = other.media.upload_timeout;
    }

    if other.log.level != defaults.log.level && !other.log.level.is_empty() {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    let map: HashMap<String, String> = env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(&upper_prefix)
                .map(|stripped| (stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();

    let mut cfg = Config::default();
    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }
    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "server.base_url" => cfg.server.base_url = value,
        "server.user_agent" => cfg.server.user_agent = value,
        "server.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.server.timeout = duration;
            }
        }
        "feed.page_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.page_size = parsed;
            }
        }
        "player.mpv_path" => cfg.player.mpv_path = value,
        "player.extra_args" => {
            cfg.player.extra_args = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "player.fullscreen" => cfg.player.fullscreen = parse_bool(&value),
        "media.upload_url" => cfg.media.upload_url = value,
        "media.auth_path" => cfg.media.auth_path = value,
        "media.upload_timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.media.upload_timeout = duration;
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reels-tui").join("config.yaml"))
}

/// Persists the service base URL, keeping whatever else the file holds.
pub fn save_base_url(path: Option<PathBuf>, base_url: &str) -> Result<PathBuf> {
    let base_url = base_url.trim();
    anyhow::ensure!(!base_url.is_empty(), "config: server.base_url is required");
    url::Url::parse(base_url)
        .with_context(|| format!("config: invalid server.base_url {base_url}"))?;

    let path = match path {
        Some(path) => path,
        None => default_config_path().context("config: unable to determine default config path")?,
    };

    let mut cfg = if path.exists() {
        read_config_file(&path)?
    } else {
        Config::default()
    };
    cfg.server.base_url = base_url.to_string();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }
    let contents = serde_yaml::to_string(&cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated() -> LoadOptions {
        LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/reels-tui/config.yaml")),
            env_prefix: Some("REELS_TEST_NONE".into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(isolated()).unwrap();
        assert_eq!(cfg.feed.page_size, 10);
        assert_eq!(cfg.server.base_url, "http://localhost:3000/");
        assert_eq!(cfg.media.auth_path, "/api/imagekit-auth");
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "server:\n  base_url: https://reels.example.com\n  timeout: 5s\nplayer:\n  fullscreen: true\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("REELS_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.server.base_url, "https://reels.example.com");
        assert_eq!(cfg.server.timeout, Duration::from_secs(5));
        assert!(cfg.player.fullscreen);
        assert_eq!(cfg.player.mpv_path, "mpv");
    }

    #[test]
    fn save_base_url_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        save_base_url(Some(path.clone()), "https://reels.example.com").unwrap();
        let saved = read_config_file(&path).unwrap();
        assert_eq!(saved.server.base_url, "https://reels.example.com");
        assert!(save_base_url(Some(path), "not a url").is_err());
    }

    #[test]
    fn env_overrides() {
        env::set_var("REELS_TEST_ENV_FEED__PAGE_SIZE", "4");
        env::set_var("REELS_TEST_ENV_SERVER__TIMEOUT", "90s");
        env::set_var("REELS_TEST_ENV_PLAYER__EXTRA_ARGS", "--mute=yes, --volume=30");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: Some("REELS_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.feed.page_size, 4);
        assert_eq!(cfg.server.timeout, Duration::from_secs(90));
        assert_eq!(cfg.player.extra_args, vec!["--mute=yes", "--volume=30"]);
        env::remove_var("REELS_TEST_ENV_FEED__PAGE_SIZE");
        env::remove_var("REELS_TEST_ENV_SERVER__TIMEOUT");
        env::remove_var("REELS_TEST_ENV_PLAYER__EXTRA_ARGS");
    }
}
