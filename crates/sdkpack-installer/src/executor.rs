use std::io::{Read, Write};

use anyhow::{Context, Result};
use regex::Regex;
use sdkpack_core::{InstallError, Platform};
use tracing::{debug, info};

use crate::remote::{child_path, LaunchRequest, ProcessLauncher, RemoteFileSystem};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const EXTRACTED_JDK_DIR: &str = "^j(2s)?dk.*$";
const INSTALLER_INPUT: &[u8] = b"yes\n";

/// How a staged bundle is turned into an installed JDK on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallProcedure {
    /// Self-extracting script or gzip tarball, then flatten the single
    /// top-level JDK directory.
    Unix,
    /// Silent native installer with a UTF-16 log.
    Windows,
}

impl InstallProcedure {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Linux | Platform::Solaris => Self::Unix,
            Platform::Windows => Self::Windows,
        }
    }

    pub fn install(
        self,
        fs: &dyn RemoteFileSystem,
        launcher: &dyn ProcessLauncher,
        out: &mut dyn Write,
        target_dir: &str,
        bundle: &str,
    ) -> Result<()> {
        match self {
            Self::Unix => install_unix(fs, launcher, out, target_dir, bundle),
            Self::Windows => install_windows(fs, launcher, out, target_dir, bundle),
        }
    }
}

pub fn install_bundle(
    platform: Platform,
    fs: &dyn RemoteFileSystem,
    launcher: &dyn ProcessLauncher,
    out: &mut dyn Write,
    target_dir: &str,
    bundle: &str,
) -> Result<()> {
    writeln!(out, "Installing {bundle}")?;
    let procedure = InstallProcedure::for_platform(platform);
    debug!(?procedure, target_dir, bundle, "running install procedure");
    procedure.install(fs, launcher, out, target_dir, bundle)
}

fn install_unix(
    fs: &dyn RemoteFileSystem,
    launcher: &dyn ProcessLauncher,
    out: &mut dyn Write,
    target_dir: &str,
    bundle: &str,
) -> Result<()> {
    let request = if is_gzip(fs, bundle)? {
        LaunchRequest::new("tar").arg("xvzf").arg(bundle)
    } else {
        fs.chmod(bundle, 0o755)?;
        LaunchRequest::new(bundle).arg("-noregister")
    };
    let request = request.stdin(INSTALLER_INPUT).current_dir(target_dir);

    let exit_code = launcher.launch(&request, out)?;
    if exit_code != 0 {
        return Err(execution_failed(exit_code, None));
    }

    let pattern = Regex::new(EXTRACTED_JDK_DIR).context("invalid JDK directory pattern")?;
    let found: Vec<String> = fs
        .list_subdirectories(target_dir)?
        .into_iter()
        .filter(|name| pattern.is_match(name))
        .collect();

    match found.as_slice() {
        [single] => {
            info!(dir = %single, "flattening extracted JDK");
            fs.move_all_children(&child_path(target_dir, single), target_dir)
        }
        _ => Err(InstallError::UnexpectedLayout { found }.into()),
    }
}

fn execution_failed(exit_code: i32, log: Option<String>) -> anyhow::Error {
    InstallError::InstallExecutionFailed { exit_code, log }.into()
}

fn is_gzip(fs: &dyn RemoteFileSystem, bundle: &str) -> Result<bool> {
    let mut header = [0_u8; 2];
    fs.open_read(bundle)?
        .read_exact(&mut header)
        .with_context(|| format!("failed to read header of {bundle}"))?;
    Ok(header == GZIP_MAGIC)
}

fn install_windows(
    fs: &dyn RemoteFileSystem,
    launcher: &dyn ProcessLauncher,
    out: &mut dyn Write,
    target_dir: &str,
    bundle: &str,
) -> Result<()> {
    let log_file = format!("{bundle}.install.log");
    let request = LaunchRequest::new(bundle)
        .arg("/s")
        .verbatim(windows_installer_options(target_dir, &log_file))
        .current_dir(target_dir);

    let exit_code = launcher.launch(&request, out)?;
    if exit_code == 0 {
        return fs.delete(&log_file);
    }

    writeln!(out, "Failed to install JDK. exit code={exit_code}")?;
    let log = match read_installer_log(fs, &log_file) {
        Ok(text) => {
            out.write_all(text.as_bytes())?;
            Some(text)
        }
        Err(err) => {
            writeln!(out, "Unable to read installer log {log_file}: {err:#}")?;
            None
        }
    };
    Err(execution_failed(exit_code, log))
}

/// Options passed through to the embedded MSI. The installer parses its own
/// command line, so these must reach it without re-quoting.
pub fn windows_installer_options(target_dir: &str, log_file: &str) -> String {
    format!(r#"/v/qn REBOOT=Suppress INSTALLDIR=\"{target_dir}\" /L \"{log_file}\""#)
}

fn read_installer_log(fs: &dyn RemoteFileSystem, log_file: &str) -> Result<String> {
    let mut raw = Vec::new();
    fs.open_read(log_file)?
        .read_to_end(&mut raw)
        .with_context(|| format!("failed to read {log_file}"))?;
    Ok(decode_utf16_log(&raw))
}

/// Decodes an installer log written as UTF-16. A byte-order mark selects the
/// endianness; without one the log is little-endian.
pub fn decode_utf16_log(raw: &[u8]) -> String {
    let (big_endian, body) = match raw {
        [0xfe, 0xff, rest @ ..] => (true, rest),
        [0xff, 0xfe, rest @ ..] => (false, rest),
        _ => (false, raw),
    };
    let units = body.chunks_exact(2).map(|pair| {
        if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
