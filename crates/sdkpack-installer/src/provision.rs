use std::io::Write;

use anyhow::Result;
use sdkpack_core::{detect_cpu, detect_platform, find_install_error};
use sdkpack_download::{BundleKey, BundleSource, LocalCache};
use tracing::{info, warn};

use crate::executor::install_bundle;
use crate::marker::{is_installed, write_install_marker};
use crate::remote::{child_path, TargetNode};

/// What `perform_installation` did with the target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { location: String },
    /// The install marker already named this release.
    AlreadyInstalled { location: String },
    /// Nothing was installed; `reason` has already been written to the sink.
    Skipped { location: String, reason: String },
}

impl InstallOutcome {
    pub fn location(&self) -> &str {
        match self {
            Self::Installed { location }
            | Self::AlreadyInstalled { location }
            | Self::Skipped { location, .. } => location,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// One JDK release to provision, plus the license decision that gates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkInstaller {
    release_id: String,
    accept_license: bool,
}

impl SdkInstaller {
    pub fn new(release_id: impl Into<String>, accept_license: bool) -> Self {
        Self {
            release_id: release_id.into(),
            accept_license,
        }
    }

    pub fn release_id(&self) -> &str {
        &self.release_id
    }

    pub fn accept_license(&self) -> bool {
        self.accept_license
    }

    /// Installs the release into `expected_location` on `node`. Declined
    /// licenses and undetectable targets are reported to `out` and come back
    /// as [`InstallOutcome::Skipped`] rather than as errors.
    pub fn perform_installation(
        &self,
        node: &dyn TargetNode,
        expected_location: &str,
        cache: &LocalCache,
        source: &dyn BundleSource,
        out: &mut dyn Write,
    ) -> Result<InstallOutcome> {
        let location = expected_location.to_string();
        if !self.accept_license {
            let reason = "Unable to install JDK unless the license is accepted.".to_string();
            writeln!(out, "{reason}")?;
            return Ok(InstallOutcome::Skipped { location, reason });
        }

        match self.install(node, expected_location, cache, source, out) {
            Ok(true) => Ok(InstallOutcome::Installed { location }),
            Ok(false) => Ok(InstallOutcome::AlreadyInstalled { location }),
            Err(err) => match find_install_error(&err) {
                Some(skip) if skip.is_soft_skip() => {
                    warn!(error = %skip, "skipping JDK installation");
                    let reason = format!("JDK installation skipped: {skip}");
                    writeln!(out, "{reason}")?;
                    Ok(InstallOutcome::Skipped { location, reason })
                }
                _ => Err(err),
            },
        }
    }

    /// False when the marker showed the release was already in place.
    fn install(
        &self,
        node: &dyn TargetNode,
        expected_location: &str,
        cache: &LocalCache,
        source: &dyn BundleSource,
        out: &mut dyn Write,
    ) -> Result<bool> {
        let directory = node.directory();
        if is_installed(directory, expected_location, &self.release_id)? {
            info!(release = %self.release_id, location = expected_location, "already installed");
            return Ok(false);
        }

        directory.delete_recursive(expected_location)?;
        directory.create_dir_all(expected_location)?;

        let platform = detect_platform(node.probe())?;
        let cpu = detect_cpu(node.probe())?;
        let key = BundleKey::new(platform, cpu, self.release_id.as_str());
        let bundle = cache.fetch_or_download(&key, source, out)?;

        let location = directory.absolutize(expected_location)?;
        let staged = child_path(&location, platform.bundle_file_name());
        directory.upload(&bundle, &staged)?;

        install_bundle(
            platform,
            node.file_system(),
            node.launcher(),
            out,
            &location,
            &staged,
        )?;

        write_install_marker(directory, expected_location, &self.release_id)?;
        node.file_system().delete(&staged)?;
        info!(release = %self.release_id, location = %location, "JDK installed");
        Ok(true)
    }
}
