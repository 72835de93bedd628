use thiserror::Error;

use crate::platform::{Cpu, Platform};

/// Failure categories surfaced by detection, resolution and installation.
///
/// Functions across the workspace return `anyhow::Result`; these values ride
/// inside the `anyhow::Error` so callers can classify a failure with
/// [`find_install_error`] regardless of how much context was attached on the
/// way up.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{0}")]
    DetectionFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("couldn't find the right download for {platform} and {cpu} combination")]
    NoCompatibleArtifact { platform: Platform, cpu: Cpu },

    #[error("unable to install JDK unless a valid username/password is provided; enter credentials at {credential_url}")]
    AuthenticationRequired { credential_url: String },

    #[error("unable to install JDK unless a valid username/password is provided; the account was rejected {attempts} times, enter valid credentials at {credential_url}")]
    AuthenticationFailed {
        credential_url: String,
        attempts: u32,
    },

    #[error("{0}")]
    ProtocolViolation(String),

    #[error("failed to install JDK. exit code={exit_code}")]
    InstallExecutionFailed {
        exit_code: i32,
        log: Option<String>,
    },

    #[error("failed to find the extracted JDKs: {found:?}")]
    UnexpectedLayout { found: Vec<String> },

    #[error("{operation} timed out after {seconds} seconds")]
    Timeout { operation: String, seconds: u64 },
}

impl InstallError {
    /// Detection failures skip the install instead of aborting the caller.
    pub fn is_soft_skip(&self) -> bool {
        matches!(self, Self::DetectionFailed(_))
    }
}

pub fn find_install_error(err: &anyhow::Error) -> Option<&InstallError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<InstallError>())
}
