use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sdkpack_core::ReleaseCatalog;

/// Source of the already-materialised release catalog.
pub trait CatalogProvider {
    fn load_catalog(&self) -> Result<ReleaseCatalog>;
}

impl CatalogProvider for ReleaseCatalog {
    fn load_catalog(&self) -> Result<ReleaseCatalog> {
        Ok(self.clone())
    }
}

/// Catalog JSON written to disk by whatever refreshes it. A missing file
/// reads as an empty catalog.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogProvider for FileCatalog {
    fn load_catalog(&self) -> Result<ReleaseCatalog> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(ReleaseCatalog::default());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read release catalog: {}", self.path.display())
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(ReleaseCatalog::default());
        }

        ReleaseCatalog::from_json_str(&raw)
            .with_context(|| format!("failed to load release catalog: {}", self.path.display()))
    }
}
