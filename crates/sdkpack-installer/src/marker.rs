use anyhow::Result;
use tracing::debug;

use crate::remote::{child_path, TargetDirectory};

/// Records which release was installed into a directory.
pub const INSTALL_MARKER: &str = ".installedBySdkpack";

pub fn read_install_marker(target: &dyn TargetDirectory, dir: &str) -> Result<Option<String>> {
    let path = child_path(dir, INSTALL_MARKER);
    if !target.exists(&path)? {
        return Ok(None);
    }
    target.read_to_string(&path).map(Some)
}

pub fn write_install_marker(target: &dyn TargetDirectory, dir: &str, release_id: &str) -> Result<()> {
    let path = child_path(dir, INSTALL_MARKER);
    debug!(%path, release_id, "writing install marker");
    target.write_string(&path, release_id)
}

pub(crate) fn is_installed(target: &dyn TargetDirectory, dir: &str, release_id: &str) -> Result<bool> {
    Ok(read_install_marker(target, dir)?.as_deref() == Some(release_id))
}
