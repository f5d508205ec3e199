//! In-memory configuration with write-through persistence

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::Configuration;
use crate::persistence::Persistence;
use crate::types::SavedPlacement;

/// Owns the live [`Configuration`]; every mutation is saved immediately.
///
/// Save failures are logged and otherwise ignored: the in-memory state still
/// changes and the next successful save catches the file up.
pub struct ConfigStore {
    config: Configuration,
    backend: Box<dyn Persistence>,
}

impl ConfigStore {
    pub fn open(backend: Box<dyn Persistence>) -> Self {
        Self::open_with_defaults(backend, Configuration::default)
    }

    /// Load from `backend`. A missing file is synthesized from `defaults` and
    /// saved; a malformed one degrades to defaults without being overwritten.
    pub fn open_with_defaults(
        backend: Box<dyn Persistence>,
        defaults: impl FnOnce() -> Configuration,
    ) -> Self {
        match backend.load() {
            Ok(Some(mut config)) => {
                config.validate_and_clamp();
                info!(
                    images = config.image_paths.len(),
                    saved_positions = config.custom_positions.len(),
                    "Loaded config"
                );
                let store = Self { config, backend };
                // Re-save the reconciled result so defaults for new keys land on disk
                store.persist();
                store
            }
            Ok(None) => {
                info!("No config file found, creating default config");
                let store = Self { config: defaults(), backend };
                store.persist();
                store
            }
            Err(e) => {
                error!(error = ?e, "Failed to load config, using defaults");
                Self { config: defaults(), backend }
            }
        }
    }

    /// Current snapshot
    pub fn get(&self) -> &Configuration {
        &self.config
    }

    /// Library paths that still exist on disk.
    ///
    /// Paths that vanished are pruned from the config (and persisted) as a
    /// side effect.
    pub fn existing_image_paths(&mut self) -> Vec<PathBuf> {
        let (existing, missing): (Vec<PathBuf>, Vec<PathBuf>) = self
            .config
            .image_paths
            .iter()
            .cloned()
            .partition(|path| path.exists());

        if !missing.is_empty() {
            for path in &missing {
                debug!(path = %path.display(), "Pruning missing image");
                self.config.image_paths.remove(path);
            }
            info!(pruned = missing.len(), "Removed missing images from library");
            self.persist();
        }

        existing
    }

    /// Returns false if the path was already present
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let added = self.config.image_paths.insert(path.clone());
        if added {
            info!(path = %path.display(), "Added image to library");
        }
        self.persist();
        added
    }

    /// Returns false if the path was not present
    pub fn remove_path(&mut self, path: &Path) -> bool {
        let removed = self.config.image_paths.remove(path);
        if removed {
            info!(path = %path.display(), "Removed image from library");
        }
        self.persist();
        removed
    }

    /// Upsert the saved placement for `filename` (bare name, not full path)
    pub fn set_custom_position(&mut self, filename: &str, placement: SavedPlacement) {
        info!(
            file = %filename,
            x = placement.x,
            y = placement.y,
            width = ?placement.width,
            height = ?placement.height,
            "Saving custom position"
        );
        self.config.custom_positions.insert(filename.to_string(), placement);
        self.persist();
    }

    pub fn set_gif_size(&mut self, size: u32) {
        self.update(|config| config.gif_size = size);
    }

    /// Apply an arbitrary edit (settings UI), then re-validate and persist
    pub fn update(&mut self, edit: impl FnOnce(&mut Configuration)) {
        edit(&mut self.config);
        self.config.validate_and_clamp();
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.backend.save(&self.config) {
            warn!(error = ?e, "Failed to persist config, keeping in-memory state");
        }
    }
}
