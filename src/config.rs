use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "FORUM_TUI";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    /// Query endpoint of the forum backend. Empty means offline mode with
    /// canned panel data.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("forum-tui/{} (+https://github.com/forum-tui/forum-tui)", crate::VERSION)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Layout width at or below which the panel collapses.
    #[serde(default = "default_compact_breakpoint")]
    pub compact_breakpoint: u16,
    /// Category slugs offered in the navigation list.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            compact_breakpoint: default_compact_breakpoint(),
            categories: default_categories(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

fn default_compact_breakpoint() -> u16 {
    crate::viewport::DEFAULT_BREAKPOINT
}

fn default_categories() -> Vec<String> {
    vec!["music".into(), "movies".into(), "sports".into()]
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    if let Some(from_env) = load_env(prefix)? {
        cfg = merge_config(cfg, from_env);
    }

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.remote.endpoint.is_empty() {
        base.remote.endpoint = other.remote.endpoint;
    }
    if !other.remote.user_agent.is_empty() {
        base.remote.user_agent = other.remote.user_agent;
    }
    base.remote.request_timeout = other.remote.request_timeout;

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }
    if other.ui.compact_breakpoint != 0 {
        base.ui.compact_breakpoint = other.ui.compact_breakpoint;
    }
    if !other.ui.categories.is_empty() {
        base.ui.categories = other.ui.categories;
    }

    base
}

fn load_env(prefix: &str) -> Result<Option<Config>> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(None);
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(Some(cfg))
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "remote.endpoint" => cfg.remote.endpoint = value,
        "remote.user_agent" => cfg.remote.user_agent = value,
        "remote.request_timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.remote.request_timeout = duration;
            }
        }
        "ui.theme" => cfg.ui.theme = value,
        "ui.compact_breakpoint" => {
            if let Ok(parsed) = value.parse::<u16>() {
                cfg.ui.compact_breakpoint = parsed;
            }
        }
        "ui.categories" => {
            cfg.ui.categories = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("forum-tui").join("config.yaml"))
}
