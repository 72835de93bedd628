use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use sdkpack_download::{Credentials, DownloadSettings, PrefixLayout};
use sdkpack_installer::DEFAULT_PROCESS_TIMEOUT;
use serde::Deserialize;

/// Contents of `config.toml`. Every key is optional; a missing file is the
/// same as an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SdkpackConfig {
    pub(crate) catalog: Option<PathBuf>,
    pub(crate) credentials: CredentialsConfig,
    pub(crate) download: DownloadConfig,
    pub(crate) install: InstallConfig,
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CredentialsConfig {
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DownloadConfig {
    pub(crate) sso_host: Option<String>,
    pub(crate) credential_url: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) connect_timeout_secs: Option<u64>,
    pub(crate) user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct InstallConfig {
    pub(crate) process_timeout_secs: Option<u64>,
}

impl SdkpackConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config: {}", path.display()));
            }
        };
        Self::from_toml_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    pub(crate) fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid sdkpack config")
    }

    pub(crate) fn catalog_path(&self, layout: &PrefixLayout) -> PathBuf {
        self.catalog
            .clone()
            .unwrap_or_else(|| layout.default_catalog_path())
    }

    pub(crate) fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(
            self.credentials.username.clone(),
            self.credentials.password.clone(),
        )
    }

    pub(crate) fn download_settings(&self) -> DownloadSettings {
        let defaults = DownloadSettings::default();
        let download = &self.download;
        DownloadSettings {
            sso_host: download.sso_host.clone().unwrap_or(defaults.sso_host),
            credential_url: download
                .credential_url
                .clone()
                .unwrap_or(defaults.credential_url),
            timeout: download
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: download
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            user_agent: download.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    pub(crate) fn process_timeout(&self) -> Duration {
        self.install
            .process_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROCESS_TIMEOUT)
    }
}
