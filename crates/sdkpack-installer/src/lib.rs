mod executor;
mod local;
mod marker;
mod provision;
mod remote;

pub use executor::{decode_utf16_log, install_bundle, windows_installer_options, InstallProcedure};
pub use local::{LocalFileSystem, LocalLauncher, LocalNode, DEFAULT_PROCESS_TIMEOUT};
pub use marker::{read_install_marker, write_install_marker, INSTALL_MARKER};
pub use provision::{InstallOutcome, SdkInstaller};
pub use remote::{
    child_path, LaunchRequest, ProcessLauncher, RemoteFileSystem, TargetDirectory, TargetNode,
};
