use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::rundeck::JobOptions;

const CANDIDATES: [&str; 4] = [
    "rundeck-job.toml",
    "rundeck-job.json",
    "rundeck-job.yaml",
    "rundeck-job.yml",
];

/// Configuration file structure.
///
/// Lets users keep connection details and run defaults out of the command
/// line. Every value can still be overridden by a flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Server and credentials
    #[serde(default)]
    pub rundeck: RundeckConfig,

    /// Defaults for `run`
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RundeckConfig {
    /// Server URL including port, e.g. `http://rundeck:4440`
    pub url: Option<String>,

    /// API token; excludes user/password
    pub token: Option<String>,

    /// Login user; requires password
    pub user: Option<String>,

    /// Password for the login user
    pub password: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Accept invalid TLS certificates
    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// Only search this project for the job
    pub project: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Stop waiting after this many status checks
    pub max_polls: Option<u32>,

    /// Options sent with every run, below those given on the command line
    #[serde(default)]
    pub options: JobOptions,
}

impl Default for RundeckConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            user: None,
            password: None,
            api_version: default_api_version(),
            insecure: false,
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            project: None,
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: None,
            options: JobOptions::new(),
        }
    }
}

fn default_api_version() -> u32 {
    18
}

fn default_login_timeout_secs() -> u64 {
    3
}

fn default_poll_interval_secs() -> u64 {
    3
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./rundeck-job.toml, .json, .yaml, .yml
    /// 3. `<user config dir>/rundeck-job/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("rundeck-job").join("config.toml"));
        Self::load_from_candidates(Path::new("."), user_config)
    }

    fn load_from_candidates(dir: &Path, user_config: Option<PathBuf>) -> Result<Self> {
        let found = CANDIDATES
            .iter()
            .map(|candidate| dir.join(candidate))
            .chain(user_config)
            .find(|path| path.exists());

        match found {
            Some(path) => {
                log::debug!("Using config file {}", path.display());
                Self::load_from_path(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}
