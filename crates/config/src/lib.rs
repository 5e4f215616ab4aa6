//! Configuration loading and validation.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. built-in defaults,
//! 2. a YAML, TOML or JSON file (format chosen by extension),
//! 3. environment variables prefixed with `CHBACKUP_`, using `__` to
//!    separate nested keys (`CHBACKUP_GENERAL__ALLOW_EMPTY_BACKUPS=true`).
//!
//! ```yaml
//! general:
//!   allow_empty_backups: false
//!   backups_to_keep_local: 7
//!   backups_max_age: 604800
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CHBACKUP_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Let a backup succeed when no table is selected.
    pub allow_empty_backups: bool,
    /// Number of local backups kept after a successful run; `0` keeps all.
    pub backups_to_keep_local: usize,
    /// Local backups older than this many seconds are removed after a
    /// successful run.
    pub backups_max_age: Option<u64>,
}
impl GeneralConfig {
    pub fn max_age(&self) -> Option<Duration> {
        self.backups_max_age.map(Duration::from_secs)
    }
}

impl Config {
    /// Default location of the configuration file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "chbackup").map(|dirs| dirs.config_dir().join("config.yml"))
    }

    /// Load from `path`, or from [`default_path()`](Self::default_path) when
    /// it exists, then apply environment overrides.
    ///
    /// An explicit `path` that doesn't exist is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };
        tracing::debug!(file = ?file, "loading configuration");
        let figment = Self::figment(file.as_deref())?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Defaults merged with `file`, without environment overrides.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        let Some(file) = file else {
            return Ok(figment);
        };
        let extension = file.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("yml" | "yaml") => figment.merge(Yaml::file(file)),
            Some("toml") => figment.merge(Toml::file(file)),
            Some("json") => figment.merge(Json::file(file)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
        })
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.general.backups_max_age == Some(0) {
            exn::bail!(ErrorKind::InvalidValue {
                field: "general.backups_max_age",
                reason: "must be positive, or unset to disable",
            });
        }
        Ok(())
    }
}
