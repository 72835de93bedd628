use anyhow::{anyhow, Context, Result};
use sdkpack_core::{Cpu, Platform};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixLayout {
    prefix: PathBuf,
}

impl PrefixLayout {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.prefix.join("cache")
    }

    pub fn bundles_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("jdks")
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.prefix.join("catalog")
    }

    pub fn default_catalog_path(&self) -> PathBuf {
        self.catalog_dir().join("jdk.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.prefix.join("config.toml")
    }

    pub fn bundle_cache_path(
        &self,
        platform: Platform,
        cpu: Cpu,
        release_id: &str,
    ) -> Result<PathBuf> {
        validate_release_id(release_id)?;
        Ok(self
            .bundles_cache_dir()
            .join(platform.as_str())
            .join(cpu.as_str())
            .join(release_id))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.cache_dir(), self.bundles_cache_dir(), self.catalog_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

fn validate_release_id(release_id: &str) -> Result<()> {
    if release_id.trim().is_empty() {
        return Err(anyhow!("release id must not be empty"));
    }
    if release_id.contains('/') || release_id.contains('\\') {
        return Err(anyhow!(
            "release id must not contain path separators: {release_id}"
        ));
    }
    let mut components = Path::new(release_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(anyhow!("release id is not a valid cache key: {release_id}")),
    }
}

pub fn default_user_prefix() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user prefix")?;
        return Ok(PathBuf::from(app_data).join("Sdkpack"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user prefix")?;
    Ok(PathBuf::from(home).join(".sdkpack"))
}
