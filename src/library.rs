//! Image library helpers: what may be added, and first-run discovery

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::constants;

/// True for paths ending in `.gif` (any case)
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(constants::library::IMAGE_EXTENSION))
}

/// Resolve and check a path before it is added to the library
pub fn validate_new_image(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        bail!("Image not found: {}", path.display());
    }
    if !is_supported(path) {
        bail!("Not a .gif file: {}", path.display());
    }
    fs::canonicalize(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

/// All supported images below `dir`, recursively, in sorted order
pub fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current)
            .with_context(|| format!("Failed to read directory {}", current.display()))?;
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(dir = %current.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if path.is_dir() {
                pending.push(path);
            } else if is_supported(&path) {
                debug!(path = %path.display(), "Found image");
                found.push(fs::canonicalize(&path).unwrap_or(path));
            }
        }
    }

    found.sort();
    info!(dir = %dir.display(), count = found.len(), "Scanned directory for images");
    Ok(found)
}

/// `<pictures dir>/glimmr`, where a first run looks for images
pub fn default_library_dir() -> Option<PathBuf> {
    dirs::picture_dir().map(|dir| dir.join(constants::config::DEFAULT_LIBRARY_DIR))
}

/// Defaults for a brand-new config: seeded with whatever the default
/// library folder already holds
pub fn first_run_defaults() -> Configuration {
    let mut config = Configuration::default();
    if let Some(dir) = default_library_dir().filter(|dir| dir.is_dir()) {
        match scan_dir(&dir) {
            Ok(paths) => config.image_paths.extend(paths),
            Err(e) => warn!(dir = %dir.display(), error = ?e, "Failed to scan default library"),
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("/a/b/cat.gif")));
        assert!(is_supported(Path::new("DOG.GIF")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("gif")));
    }

    #[test]
    fn test_validate_new_image() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("ok.gif");
        let txt = dir.path().join("nope.txt");
        fs::write(&gif, b"GIF89a").unwrap();
        fs::write(&txt, b"hi").unwrap();

        assert!(validate_new_image(&gif).unwrap().is_absolute());
        assert!(validate_new_image(&txt).is_err());
        assert!(validate_new_image(&dir.path().join("missing.gif")).is_err());
    }

    #[test]
    fn test_scan_dir_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("more").join("deeper");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a.gif"), b"GIF89a").unwrap();
        fs::write(nested.join("b.GIF"), b"GIF89a").unwrap();
        fs::write(nested.join("c.png"), b"png").unwrap();

        let found = scan_dir(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| is_supported(p)));
    }
}
