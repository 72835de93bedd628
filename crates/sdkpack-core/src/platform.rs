use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::error::InstallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Solaris,
    Windows,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "LINUX",
            Self::Solaris => "SOLARIS",
            Self::Windows => "WINDOWS",
        }
    }

    /// File name the downloaded bundle is staged under on the target.
    pub fn bundle_file_name(self) -> &'static str {
        match self {
            Self::Linux | Self::Solaris => "jdk.sh",
            Self::Windows => "jdk.exe",
        }
    }

    /// `line` is expected to be upper-cased already.
    pub fn is(self, line: &str) -> bool {
        line.contains(self.as_str())
    }

    pub fn from_os_name(raw: &str) -> Result<Self, InstallError> {
        let name = raw.to_lowercase();
        if name.contains("linux") {
            return Ok(Self::Linux);
        }
        if name.contains("windows") {
            return Ok(Self::Windows);
        }
        if name.contains("sun") || name.contains("solaris") {
            return Ok(Self::Solaris);
        }
        Err(InstallError::DetectionFailed(format!("Unknown OS name: {raw}")))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "LINUX" => Ok(Self::Linux),
            "SOLARIS" => Ok(Self::Solaris),
            "WINDOWS" => Ok(Self::Windows),
            _ => Err(anyhow!(
                "unsupported platform '{input}'; supported: linux, solaris, windows"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cpu {
    X86_32,
    X86_64,
    Sparc,
    Itanium,
}

impl Cpu {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_32 => "X86_32",
            Self::X86_64 => "X86_64",
            Self::Sparc => "SPARC",
            Self::Itanium => "ITANIUM",
        }
    }

    pub fn from_os_arch(raw: &str) -> Result<Self, InstallError> {
        let arch = raw.to_lowercase();
        if arch.contains("sparc") {
            return Ok(Self::Sparc);
        }
        if arch.contains("ia64") {
            return Ok(Self::Itanium);
        }
        if arch.contains("amd64") || arch.contains("86_64") {
            return Ok(Self::X86_64);
        }
        if arch.contains("86") {
            return Ok(Self::X86_32);
        }
        Err(InstallError::DetectionFailed(format!("Unknown CPU architecture: {raw}")))
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cpu {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "X86_32" | "I386" => Ok(Self::X86_32),
            "X86_64" | "AMD64" => Ok(Self::X86_64),
            "SPARC" => Ok(Self::Sparc),
            "ITANIUM" | "IA64" => Ok(Self::Itanium),
            _ => Err(anyhow!(
                "unsupported cpu '{input}'; supported: x86_32, x86_64, sparc, itanium"
            )),
        }
    }
}

/// Reads the OS facts of a machine. Implementations must evaluate both
/// properties on the machine being provisioned, not on the controller.
pub trait SystemProbe {
    fn os_name(&self) -> Result<String>;
    fn os_arch(&self) -> Result<String>;
}

/// Probe for the machine this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProbe;

impl SystemProbe for LocalProbe {
    fn os_name(&self) -> Result<String> {
        Ok(match std::env::consts::OS {
            "solaris" | "illumos" => "SunOS".to_string(),
            other => other.to_string(),
        })
    }

    fn os_arch(&self) -> Result<String> {
        Ok(std::env::consts::ARCH.to_string())
    }
}

pub fn detect_platform(probe: &dyn SystemProbe) -> Result<Platform> {
    let raw = probe
        .os_name()
        .context("failed to read the OS name of the target")?;
    Ok(Platform::from_os_name(&raw)?)
}

pub fn detect_cpu(probe: &dyn SystemProbe) -> Result<Cpu> {
    let raw = probe
        .os_arch()
        .context("failed to read the CPU architecture of the target")?;
    Ok(Cpu::from_os_arch(&raw)?)
}
