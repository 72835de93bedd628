use std::io::{Read, Write};
use std::path::Path;

use anyhow::Result;
use sdkpack_core::SystemProbe;

/// File operations the install procedures need on the target machine.
/// Paths are in the target's native notation.
pub trait RemoteFileSystem {
    fn delete(&self, path: &str) -> Result<()>;
    fn chmod(&self, path: &str, mode: u32) -> Result<()>;
    fn open_read(&self, path: &str) -> Result<Box<dyn Read>>;
    /// Names (not paths) of the immediate subdirectories of `dir`.
    fn list_subdirectories(&self, dir: &str) -> Result<Vec<String>>;
    /// Moves every child of `from` into `to`, then removes the emptied `from`.
    fn move_all_children(&self, from: &str, to: &str) -> Result<()>;
}

/// Directory bookkeeping done around an install: markers, wiping, staging.
pub trait TargetDirectory {
    fn exists(&self, path: &str) -> Result<bool>;
    fn read_to_string(&self, path: &str) -> Result<String>;
    fn write_string(&self, path: &str, content: &str) -> Result<()>;
    fn delete_recursive(&self, path: &str) -> Result<()>;
    fn create_dir_all(&self, path: &str) -> Result<()>;
    /// Copies a controller-side file onto the target.
    fn upload(&self, local: &Path, remote: &str) -> Result<()>;
    fn absolutize(&self, path: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Appended to the command line exactly as given, after `args`.
    pub verbatim_args: Option<String>,
    pub stdin: Option<Vec<u8>>,
    pub working_dir: Option<String>,
}

impl LaunchRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            verbatim_args: None,
            stdin: None,
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn verbatim(mut self, args: impl Into<String>) -> Self {
        self.verbatim_args = Some(args.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

pub trait ProcessLauncher {
    /// Runs the request to completion, copying its output to `out`, and
    /// returns the exit status.
    fn launch(&self, request: &LaunchRequest, out: &mut dyn Write) -> Result<i32>;
}

/// A machine that can be provisioned.
pub trait TargetNode {
    fn probe(&self) -> &dyn SystemProbe;
    fn file_system(&self) -> &dyn RemoteFileSystem;
    fn directory(&self) -> &dyn TargetDirectory;
    fn launcher(&self) -> &dyn ProcessLauncher;
}

/// Joins a child name onto a target path using the separator the path
/// already uses.
pub fn child_path(dir: &str, name: &str) -> String {
    let separator = if dir.contains('\\') && !dir.contains('/') {
        '\\'
    } else {
        '/'
    };
    let trimmed = dir.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() && dir.starts_with('/') {
        return format!("/{name}");
    }
    format!("{trimmed}{separator}{name}")
}
