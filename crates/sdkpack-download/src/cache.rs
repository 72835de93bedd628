use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context, Result};
use sdkpack_core::{Cpu, Platform};
use tracing::{info, warn};

use crate::layout::PrefixLayout;

static PART_FILE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleKey {
    pub platform: Platform,
    pub cpu: Cpu,
    pub release_id: String,
}

impl BundleKey {
    pub fn new(platform: Platform, cpu: Cpu, release_id: impl Into<String>) -> Self {
        Self {
            platform,
            cpu,
            release_id: release_id.into(),
        }
    }
}

/// Where bundle bytes come from on a cache miss.
pub trait BundleSource {
    fn open_bundle(&self, key: &BundleKey, out: &mut dyn Write) -> Result<Box<dyn Read>>;
}

/// Controller-side bundle cache. A file at the canonical path is trusted as
/// complete; it is never revalidated or expired.
#[derive(Debug, Clone)]
pub struct LocalCache {
    layout: PrefixLayout,
}

impl LocalCache {
    pub fn new(layout: PrefixLayout) -> Self {
        Self { layout }
    }

    pub fn cache_path(&self, key: &BundleKey) -> Result<PathBuf> {
        self.layout
            .bundle_cache_path(key.platform, key.cpu, &key.release_id)
    }

    pub fn fetch_or_download(
        &self,
        key: &BundleKey,
        source: &dyn BundleSource,
        out: &mut dyn Write,
    ) -> Result<PathBuf> {
        let cache_path = self.cache_path(key)?;
        if cache_path.is_file() {
            info!(path = %cache_path.display(), "bundle cache hit");
            return Ok(cache_path);
        }

        writeln!(out, "Installing JDK {}", key.release_id)?;
        let parent = cache_path
            .parent()
            .ok_or_else(|| anyhow!("cache path has no parent: {}", cache_path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache dir: {}", parent.display()))?;

        let part_path = part_path_for(&cache_path);
        let result = download_to(&part_path, key, source, out).and_then(|bytes| {
            fs::rename(&part_path, &cache_path).with_context(|| {
                format!(
                    "failed to move downloaded bundle into cache: {}",
                    cache_path.display()
                )
            })?;
            Ok(bytes)
        });

        match result {
            Ok(bytes) => {
                info!(path = %cache_path.display(), bytes, "bundle cached");
                Ok(cache_path)
            }
            Err(err) => {
                if let Err(cleanup) = remove_file_if_exists(&part_path) {
                    warn!(path = %part_path.display(), error = %cleanup, "failed to remove partial download");
                }
                Err(err)
            }
        }
    }
}

fn download_to(
    part_path: &Path,
    key: &BundleKey,
    source: &dyn BundleSource,
    out: &mut dyn Write,
) -> Result<u64> {
    let mut reader = source.open_bundle(key, out)?;
    let file = File::create(part_path)
        .with_context(|| format!("failed to create {}", part_path.display()))?;
    let mut writer = BufWriter::new(file);
    let bytes = io::copy(&mut reader, &mut writer)
        .with_context(|| format!("failed to download bundle into {}", part_path.display()))?;
    let file = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .with_context(|| format!("failed to flush {}", part_path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", part_path.display()))?;
    Ok(bytes)
}

fn part_path_for(cache_path: &Path) -> PathBuf {
    let file_name = cache_path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("bundle");
    cache_path.with_file_name(format!(
        "{file_name}.{}-{}.part",
        std::process::id(),
        PART_FILE_SEQ.fetch_add(1, Ordering::Relaxed)
    ))
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}
