//! On-disk storage for [`Configuration`]
//!
//! The store only needs two operations: load (which may find nothing) and
//! save. Failures are returned; callers decide whether they are fatal.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Configuration;
use crate::constants;

pub trait Persistence: Send {
    /// `Ok(None)` when nothing has been saved yet; `Err` when the stored
    /// data exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<Configuration>>;

    fn save(&self, config: &Configuration) -> Result<()>;
}

/// Pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `$GLIMMR_CONFIG`, else `<config dir>/glimmr/config.json`
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(constants::config::PATH_ENV) {
            return PathBuf::from(path);
        }
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::FILENAME);
        path
    }
}

impl Persistence for JsonFile {
    fn load(&self) -> Result<Option<Configuration>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;
        let config = serde_json::from_str::<Configuration>(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", self.path))?;
        Ok(Some(config))
    }

    fn save(&self, config: &Configuration) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(config)
            .context("Failed to serialize config to JSON")?;

        // Write to a sibling temp file first so a crash never leaves half a config
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write config to {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {:?} into place at {:?}", tmp, self.path))?;

        info!(path = %self.path.display(), "Saved config");
        Ok(())
    }
}
