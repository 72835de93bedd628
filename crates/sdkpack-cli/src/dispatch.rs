use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use sdkpack_core::{detect_cpu, detect_platform, Cpu, LocalProbe, Platform, SystemProbe};
use sdkpack_download::{
    default_user_prefix, BundleKey, CatalogProvider, DownloadEngine, DownloadSettings,
    FileCatalog, LocalCache, PrefixLayout,
};
use sdkpack_installer::{InstallOutcome, LocalLauncher, LocalNode, SdkInstaller};
use tracing::debug;

use crate::completion::write_completions_script;
use crate::config::SdkpackConfig;
use crate::render::{current_output_style, render_release_line, render_status_line, OutputStyle};
use crate::{Cli, Commands};

/// Prefix layout plus the config file that lives in (or beside) it.
pub(crate) struct Workspace {
    pub(crate) layout: PrefixLayout,
    pub(crate) config_path: PathBuf,
    pub(crate) config: SdkpackConfig,
}

impl Workspace {
    pub(crate) fn open(prefix: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let prefix = match prefix {
            Some(prefix) => prefix,
            None => default_user_prefix()?,
        };
        let layout = PrefixLayout::new(prefix);
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| layout.config_path());
        debug!(config = %config_path.display(), prefix = %layout.prefix().display(), "opening workspace");
        let config = SdkpackConfig::load(&config_path)?;
        Ok(Self {
            layout,
            config_path,
            config,
        })
    }

    fn catalog(&self) -> FileCatalog {
        FileCatalog::new(self.config.catalog_path(&self.layout))
    }

    /// Download settings whose credential hint names the config file
    /// actually in use, unless the config overrides it.
    pub(crate) fn download_settings(&self) -> DownloadSettings {
        let mut settings = self.config.download_settings();
        if self.config.download.credential_url.is_none() {
            settings.credential_url = format!("{} [credentials]", self.config_path.display());
        }
        settings
    }

    fn engine(&self) -> DownloadEngine<FileCatalog> {
        DownloadEngine::new(self.catalog(), self.download_settings())
    }
}

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Install {
            release_id,
            dir,
            accept_license,
        } => {
            let workspace = Workspace::open(cli.prefix, cli.config.as_deref())?;
            let outcome = run_install(&workspace, &release_id, &dir, accept_license, &mut out)?;
            writeln!(out, "{}", render_install_outcome(style, &release_id, &outcome))?;
        }
        Commands::Detect => {
            run_detect(&LocalProbe, style, &mut out)?;
        }
        Commands::List => {
            let workspace = Workspace::open(cli.prefix, cli.config.as_deref())?;
            run_list(&workspace.catalog(), style, &mut out)?;
        }
        Commands::Locate {
            release_id,
            platform,
            cpu,
        } => {
            let workspace = Workspace::open(cli.prefix, cli.config.as_deref())?;
            let path = run_locate(&workspace, &LocalProbe, &release_id, platform, cpu, &mut out)?;
            writeln!(
                out,
                "{}",
                render_status_line(style, "cached", &path.display().to_string())
            )?;
        }
        Commands::Completions { shell } => {
            write_completions_script(shell, &mut out)?;
        }
    }

    Ok(())
}

pub(crate) fn run_install(
    workspace: &Workspace,
    release_id: &str,
    dir: &Path,
    accept_license: bool,
    out: &mut dyn Write,
) -> Result<InstallOutcome> {
    let expected_location = dir
        .to_str()
        .ok_or_else(|| anyhow!("install directory is not valid UTF-8: {}", dir.display()))?;
    workspace.layout.ensure_base_dirs()?;

    let engine = workspace.engine();
    let credentials = workspace.config.credentials();
    let source = engine.with_credentials(credentials.as_ref());
    let cache = LocalCache::new(workspace.layout.clone());
    let node = LocalNode::new(LocalLauncher::new(workspace.config.process_timeout()));

    SdkInstaller::new(release_id, accept_license).perform_installation(
        &node,
        expected_location,
        &cache,
        &source,
        out,
    )
}

pub(crate) fn render_install_outcome(
    style: OutputStyle,
    release_id: &str,
    outcome: &InstallOutcome,
) -> String {
    match outcome {
        InstallOutcome::Installed { location } => {
            render_status_line(style, "installed", &format!("{release_id} at {location}"))
        }
        InstallOutcome::AlreadyInstalled { location } => render_status_line(
            style,
            "installed",
            &format!("{release_id} already present at {location}"),
        ),
        InstallOutcome::Skipped { location, .. } => render_status_line(
            style,
            "skipped",
            &format!("{release_id}; nothing was installed at {location}"),
        ),
    }
}

pub(crate) fn run_detect(
    probe: &dyn SystemProbe,
    style: OutputStyle,
    out: &mut dyn Write,
) -> Result<(Platform, Cpu)> {
    let platform = detect_platform(probe)?;
    let cpu = detect_cpu(probe)?;
    writeln!(
        out,
        "{}",
        render_status_line(style, "detected", &format!("{platform} {cpu}"))
    )?;
    Ok((platform, cpu))
}

pub(crate) fn run_list(
    catalog: &dyn CatalogProvider,
    style: OutputStyle,
    out: &mut dyn Write,
) -> Result<usize> {
    let catalog = catalog.load_catalog()?;
    if catalog.is_empty() {
        writeln!(out, "No JDK releases available")?;
        return Ok(0);
    }

    let mut count = 0;
    for (family, release) in catalog.releases() {
        writeln!(
            out,
            "{}",
            render_release_line(style, &family.name, &release.id, &release.title)
        )?;
        count += 1;
    }
    Ok(count)
}

/// Resolves and caches the bundle for a release without installing it.
pub(crate) fn run_locate(
    workspace: &Workspace,
    probe: &dyn SystemProbe,
    release_id: &str,
    platform: Option<Platform>,
    cpu: Option<Cpu>,
    out: &mut dyn Write,
) -> Result<PathBuf> {
    let platform = match platform {
        Some(platform) => platform,
        None => detect_platform(probe)?,
    };
    let cpu = match cpu {
        Some(cpu) => cpu,
        None => detect_cpu(probe)?,
    };
    workspace.layout.ensure_base_dirs()?;

    let engine = workspace.engine();
    let credentials = workspace.config.credentials();
    let source = engine.with_credentials(credentials.as_ref());
    LocalCache::new(workspace.layout.clone()).fetch_or_download(
        &BundleKey::new(platform, cpu, release_id),
        &source,
        out,
    )
}
