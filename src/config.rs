use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Login reported to the backend when no acting user is configured
pub const ANONYMOUS_LOGIN: &str = "_nobody_";

const DEFAULT_BACKEND_URL: &str = "http://localhost:5352";
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration read from `~/.stager/rc`
///
/// The rc file holds `key=value` lines. Unknown keys are ignored, blank lines
/// and lines starting with `#` are skipped.
///
/// | key                    | meaning                                      |
/// |------------------------|----------------------------------------------|
/// | `data.location`        | SQLite database path (relative to rc dir)    |
/// | `global_write_through` | mirror workflow state to the backend         |
/// | `backend.url`          | base URL of the source backend               |
/// | `backend.timeout`      | backend request timeout in seconds           |
/// | `user.login`           | acting user reported on backend writes       |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_location: PathBuf,
    pub global_write_through: bool,
    pub backend_url: String,
    pub backend_timeout: Duration,
    pub user_login: Option<String>,
}

impl Config {
    /// Directory holding the rc file and the default database
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(".stager"))
    }

    /// Path of the rc file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("rc"))
    }

    /// Defaults rooted at the given config directory
    pub fn defaults_in(config_dir: &Path) -> Self {
        Self {
            data_location: config_dir.join("stager.db"),
            global_write_through: false,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            user_login: None,
        }
    }

    /// Load configuration from the rc file, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let config_dir = Self::config_dir()?;

        if !config_path.exists() {
            return Ok(Self::defaults_in(&config_dir));
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        Self::parse(&content, &config_dir)
    }

    /// Parse rc file content; relative paths resolve against `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config = Self::defaults_in(base_dir);

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                anyhow::bail!("Invalid config line {}: '{}' (expected key=value)", lineno + 1, line);
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "data.location" => {
                    let path = PathBuf::from(value);
                    config.data_location = if path.is_relative() {
                        base_dir.join(path)
                    } else {
                        path
                    };
                }
                "global_write_through" => {
                    config.global_write_through = parse_bool(value)
                        .with_context(|| format!("Invalid value for global_write_through: '{}'", value))?;
                }
                "backend.url" => {
                    config.backend_url = value.trim_end_matches('/').to_string();
                }
                "backend.timeout" => {
                    let secs: u64 = value
                        .parse()
                        .with_context(|| format!("Invalid value for backend.timeout: '{}'", value))?;
                    config.backend_timeout = Duration::from_secs(secs);
                }
                "user.login" => {
                    config.user_login = if value.is_empty() { None } else { Some(value.to_string()) };
                }
                other => log::debug!("Ignoring unknown config key '{}'", other),
            }
        }

        Ok(config)
    }

    /// Login of the acting user, or the anonymous login
    pub fn current_login(&self) -> &str {
        self.user_login.as_deref().unwrap_or(ANONYMOUS_LOGIN)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}
