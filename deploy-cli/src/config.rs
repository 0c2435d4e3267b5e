//! Configuration management for the deploy CLI.
//!
//! Loads `deploy.toml`, then applies environment overrides (a `.env` file in
//! the working directory is read first). The resulting [`Config`] is passed
//! explicitly to every step; nothing is cached process-wide.

use crate::utils::{DeployError, Result};
use deploy_churn::RemoteTarget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "deploy.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Deploy targets by name
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory the test and build commands run in
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    /// Build output, relative to `project_dir`
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Client asset directory, relative to `build_dir`
    #[serde(default = "default_asset_subdir")]
    pub asset_subdir: PathBuf,

    #[serde(default = "default_test_command")]
    pub test_command: Vec<String>,

    #[serde(default = "default_build_command")]
    pub build_command: Vec<String>,

    /// Profile used when none is given on the command line
    #[serde(default = "default_profile")]
    pub default_profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// ssh destination, `user@host`
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// Application root on the remote host
    pub remote_dir: String,

    /// Where the build output is mirrored, relative to `remote_dir`
    #[serde(default = "default_remote_output_subdir")]
    pub remote_output_subdir: String,

    /// pm2 process name
    pub pm2_app: String,

    /// pm2 ecosystem file, relative to `remote_dir`
    #[serde(default = "default_ecosystem_file")]
    pub ecosystem_file: String,

    #[serde(default = "default_health_attempts")]
    pub health_attempts: u32,

    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

// Default values
fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from(".output")
}

fn default_asset_subdir() -> PathBuf {
    PathBuf::from("public/_nuxt")
}

fn default_test_command() -> Vec<String> {
    vec!["npm".to_string(), "test".to_string()]
}

fn default_build_command() -> Vec<String> {
    vec!["npm".to_string(), "run".to_string(), "build".to_string()]
}

fn default_profile() -> String {
    "production".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_remote_output_subdir() -> String {
    ".output".to_string()
}

fn default_ecosystem_file() -> String {
    "ecosystem.config.cjs".to_string()
}

fn default_health_attempts() -> u32 {
    5
}

fn default_health_interval_secs() -> u64 {
    2
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            build_dir: default_build_dir(),
            asset_subdir: default_asset_subdir(),
            test_command: default_test_command(),
            build_command: default_build_command(),
            default_profile: default_profile(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn build_path(&self) -> PathBuf {
        self.project_dir.join(&self.build_dir)
    }

    pub fn asset_root(&self) -> PathBuf {
        self.build_path().join(&self.asset_subdir)
    }
}

impl ProfileConfig {
    pub fn remote_target(&self) -> RemoteTarget {
        RemoteTarget {
            destination: self.host.clone(),
            port: self.port,
            identity_file: self.identity_file.clone(),
        }
    }

    pub fn remote_output_dir(&self) -> String {
        format!(
            "{}/{}",
            self.remote_dir.trim_end_matches('/'),
            self.remote_output_subdir.trim_matches('/')
        )
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| DeployError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `path` if given; otherwise `deploy.toml` when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    /// Pick a profile (argument, then `DEPLOY_PROFILE`, then the configured
    /// default) and apply `DEPLOY_HOST` / `DEPLOY_REMOTE_DIR` overrides.
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<(String, ProfileConfig)> {
        self.resolve_profile_with(name, |key| std::env::var(key).ok())
    }

    pub fn resolve_profile_with<F>(
        &self,
        name: Option<&str>,
        env: F,
    ) -> Result<(String, ProfileConfig)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = name
            .map(str::to_string)
            .or_else(|| env("DEPLOY_PROFILE"))
            .unwrap_or_else(|| self.app.default_profile.clone());

        let mut profile = self.profiles.get(&name).cloned().ok_or_else(|| {
            DeployError::Config(format!("unknown profile '{}'", name))
        })?;

        if let Some(host) = env("DEPLOY_HOST") {
            profile.host = host;
        }
        if let Some(remote_dir) = env("DEPLOY_REMOTE_DIR") {
            profile.remote_dir = remote_dir;
        }

        if profile.host.trim().is_empty() {
            return Err(DeployError::Config(format!("profile '{}' has an empty host", name)));
        }
        if profile.remote_dir.trim().is_empty() {
            return Err(DeployError::Config(format!(
                "profile '{}' has an empty remote_dir",
                name
            )));
        }

        Ok((name, profile))
    }
}
