use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use sdkpack_core::{InstallError, LocalProbe, SystemProbe};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::remote::{LaunchRequest, ProcessLauncher, RemoteFileSystem, TargetDirectory, TargetNode};

pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(3600);

/// The machine sdkpack itself runs on.
#[derive(Debug, Clone, Default)]
pub struct LocalNode {
    probe: LocalProbe,
    file_system: LocalFileSystem,
    launcher: LocalLauncher,
}

impl LocalNode {
    pub fn new(launcher: LocalLauncher) -> Self {
        Self {
            probe: LocalProbe,
            file_system: LocalFileSystem,
            launcher,
        }
    }
}

impl TargetNode for LocalNode {
    fn probe(&self) -> &dyn SystemProbe {
        &self.probe
    }

    fn file_system(&self) -> &dyn RemoteFileSystem {
        &self.file_system
    }

    fn directory(&self) -> &dyn TargetDirectory {
        &self.file_system
    }

    fn launcher(&self) -> &dyn ProcessLauncher {
        &self.launcher
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl RemoteFileSystem for LocalFileSystem {
    fn delete(&self, path: &str) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("failed to delete {path}"))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut permissions = fs::metadata(path)
                .with_context(|| format!("failed to stat {path}"))?
                .permissions();
            permissions.set_mode(mode);
            fs::set_permissions(path, permissions)
                .with_context(|| format!("failed to set mode {mode:o} on {path}"))?;
        }
        #[cfg(not(unix))]
        let _ = (path, mode);

        Ok(())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read>> {
        let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
        Ok(Box::new(file))
    }

    fn list_subdirectories(&self, dir: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("failed to read {dir}"))? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn move_all_children(&self, from: &str, to: &str) -> Result<()> {
        let target = Path::new(to);
        for entry in fs::read_dir(from).with_context(|| format!("failed to read {from}"))? {
            let entry = entry?;
            let destination = target.join(entry.file_name());
            fs::rename(entry.path(), &destination).with_context(|| {
                format!(
                    "failed to move {} to {}",
                    entry.path().display(),
                    destination.display()
                )
            })?;
        }
        fs::remove_dir(from).with_context(|| format!("failed to remove emptied {from}"))
    }
}

impl TargetDirectory for LocalFileSystem {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).exists())
    }

    fn read_to_string(&self, path: &str) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
    }

    fn write_string(&self, path: &str, content: &str) -> Result<()> {
        fs::write(path, content).with_context(|| format!("failed to write {path}"))
    }

    fn delete_recursive(&self, path: &str) -> Result<()> {
        let path = Path::new(path);
        if path.is_dir() {
            fs::remove_dir_all(path)
                .with_context(|| format!("failed to delete {}", path.display()))?;
        } else if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("failed to delete {}", path.display()))?;
        }
        Ok(())
    }

    fn create_dir_all(&self, path: &str) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("failed to create {path}"))
    }

    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        fs::copy(local, remote)
            .with_context(|| format!("failed to copy {} to {remote}", local.display()))?;
        Ok(())
    }

    fn absolutize(&self, path: &str) -> Result<String> {
        let absolute: PathBuf = std::path::absolute(path)
            .with_context(|| format!("failed to resolve absolute path of {path}"))?;
        absolute
            .into_os_string()
            .into_string()
            .map_err(|raw| anyhow!("path is not valid UTF-8: {}", raw.to_string_lossy()))
    }
}

/// Runs installers as child processes of sdkpack.
#[derive(Debug, Clone)]
pub struct LocalLauncher {
    timeout: Duration,
}

impl LocalLauncher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl LocalLauncher {
    /// Kills a child that outlived the timeout, flushing whatever output
    /// already arrived so the sink shows how far it got.
    fn abandon(
        &self,
        child: &mut Child,
        chunks: &Receiver<Vec<u8>>,
        program: &str,
        out: &mut dyn Write,
    ) -> anyhow::Error {
        let _ = child.kill();
        let _ = child.wait();
        for chunk in chunks.try_iter() {
            let _ = out.write_all(&chunk);
        }
        warn!(program, seconds = self.timeout.as_secs(), "installer timed out");
        InstallError::Timeout {
            operation: program.to_string(),
            seconds: self.timeout.as_secs(),
        }
        .into()
    }
}

impl Default for LocalLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESS_TIMEOUT)
    }
}

impl ProcessLauncher for LocalLauncher {
    fn launch(&self, request: &LaunchRequest, out: &mut dyn Write) -> Result<i32> {
        let mut command = build_command(request);
        command
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %request.program, args = ?request.args, "launching");
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {}", request.program))?;

        let (sender, chunks) = mpsc::channel();
        let readers: Vec<_> = [
            child.stdout.take().map(|pipe| spawn_reader(pipe, sender.clone())),
            child.stderr.take().map(|pipe| spawn_reader(pipe, sender.clone())),
        ]
        .into_iter()
        .flatten()
        .collect();
        drop(sender);

        if let (Some(input), Some(mut stdin)) = (&request.stdin, child.stdin.take()) {
            if let Err(err) = stdin.write_all(input) {
                // Installers that never read stdin close it early.
                if err.kind() != io::ErrorKind::BrokenPipe {
                    return Err(err).context("failed to write installer input");
                }
            }
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            match chunks.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(chunk) => out.write_all(&chunk)?,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(self.abandon(&mut child, &chunks, &request.program, out));
                }
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let status = match child.wait_timeout(remaining)? {
            Some(status) => status,
            None => return Err(self.abandon(&mut child, &chunks, &request.program, out)),
        };

        for reader in readers {
            reader
                .join()
                .map_err(|_| anyhow!("output reader for {} panicked", request.program))?
                .with_context(|| format!("failed to read output of {}", request.program))?;
        }

        // Signal termination carries no exit code.
        Ok(status.code().unwrap_or(-1))
    }
}

fn build_command(request: &LaunchRequest) -> Command {
    let mut command = Command::new(&request.program);
    command.args(&request.args);
    if let Some(dir) = &request.working_dir {
        command.current_dir(dir);
    }
    if let Some(tail) = &request.verbatim_args {
        append_verbatim(&mut command, tail);
    }
    command
}

#[cfg(windows)]
fn append_verbatim(command: &mut Command, tail: &str) {
    use std::os::windows::process::CommandExt;

    command.raw_arg(tail);
}

#[cfg(not(windows))]
fn append_verbatim(command: &mut Command, tail: &str) {
    command.args(tail.split_whitespace());
}

fn spawn_reader<R: Read + Send + 'static>(
    mut pipe: R,
    sender: Sender<Vec<u8>>,
) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match pipe.read(&mut buffer) {
                Ok(0) => return Ok(()),
                Ok(read) => {
                    // The launcher stopped listening; drain the pipe anyway.
                    let _ = sender.send(buffer[..read].to_vec());
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    })
}
