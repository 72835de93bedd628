use std::io::{Read, Write};

use anyhow::{Context, Result};
use reqwest::Url;
use sdkpack_core::{
    ArtifactFile, ArtifactMatcher, Cpu, InstallError, NameHeuristicMatcher, Platform,
};
use tracing::info;

use crate::cache::{BundleKey, BundleSource};
use crate::catalog::CatalogProvider;
use crate::credentials::Credentials;
use crate::login::follow_login_flow;
use crate::session::{HttpSession, WebSession};
use crate::settings::DownloadSettings;

/// Turns a release id plus a platform/CPU pair into the bytes of the
/// matching bundle.
pub struct DownloadEngine<C> {
    catalog: C,
    matcher: Box<dyn ArtifactMatcher>,
    settings: DownloadSettings,
}

impl<C: CatalogProvider> DownloadEngine<C> {
    pub fn new(catalog: C, settings: DownloadSettings) -> Self {
        Self {
            catalog,
            matcher: Box::new(NameHeuristicMatcher),
            settings,
        }
    }

    pub fn with_matcher(mut self, matcher: impl ArtifactMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    pub fn choose_artifact(
        &self,
        release_id: &str,
        platform: Platform,
        cpu: Cpu,
    ) -> Result<ArtifactFile> {
        let catalog = self.catalog.load_catalog()?;
        if catalog.is_empty() {
            return Err(InstallError::NotFound("JDK data is empty.".to_string()).into());
        }

        let release = catalog.release(release_id).ok_or_else(|| {
            InstallError::NotFound(format!("Unable to find JDK with ID={release_id}"))
        })?;

        self.matcher
            .select(&release.files, platform, cpu)
            .cloned()
            .ok_or_else(|| InstallError::NoCompatibleArtifact { platform, cpu }.into())
    }

    pub fn resolve(
        &self,
        release_id: &str,
        platform: Platform,
        cpu: Cpu,
        credentials: Option<&Credentials>,
        out: &mut dyn Write,
    ) -> Result<Box<dyn Read>> {
        let artifact = self.choose_artifact(release_id, platform, cpu)?;
        let mut session = HttpSession::new(&self.settings)?;
        self.download_artifact(&mut session, &artifact, credentials, out)
    }

    pub fn resolve_with_session(
        &self,
        session: &mut dyn WebSession,
        release_id: &str,
        platform: Platform,
        cpu: Cpu,
        credentials: Option<&Credentials>,
        out: &mut dyn Write,
    ) -> Result<Box<dyn Read>> {
        let artifact = self.choose_artifact(release_id, platform, cpu)?;
        self.download_artifact(session, &artifact, credentials, out)
    }

    pub fn with_credentials<'a>(
        &'a self,
        credentials: Option<&'a Credentials>,
    ) -> AuthenticatedSource<'a, C> {
        AuthenticatedSource {
            engine: self,
            credentials,
        }
    }

    fn download_artifact(
        &self,
        session: &mut dyn WebSession,
        artifact: &ArtifactFile,
        credentials: Option<&Credentials>,
        out: &mut dyn Write,
    ) -> Result<Box<dyn Read>> {
        writeln!(out, "Downloading JDK from {}", artifact.download_path)?;
        let url = Url::parse(&artifact.download_path).with_context(|| {
            format!(
                "artifact '{}' has an invalid download path: {}",
                artifact.name, artifact.download_path
            )
        })?;

        let first = session
            .get(&url)
            .with_context(|| format!("failed to fetch {url}"))?;
        let binary = follow_login_flow(session, first, &self.settings, credentials, out)?;
        info!(artifact = %artifact.name, url = %binary.url, "download stream opened");
        Ok(binary.body)
    }
}

/// Engine bound to the credentials of one install request.
pub struct AuthenticatedSource<'a, C> {
    engine: &'a DownloadEngine<C>,
    credentials: Option<&'a Credentials>,
}

impl<C: CatalogProvider> BundleSource for AuthenticatedSource<'_, C> {
    fn open_bundle(&self, key: &BundleKey, out: &mut dyn Write) -> Result<Box<dyn Read>> {
        self.engine.resolve(
            &key.release_id,
            key.platform,
            key.cpu,
            self.credentials,
            out,
        )
    }
}
