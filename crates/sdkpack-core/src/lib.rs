mod catalog;
mod error;
mod matcher;
mod platform;

pub use catalog::{ArtifactFile, Family, Release, ReleaseCatalog};
pub use error::{find_install_error, InstallError};
pub use matcher::{select_best, ArtifactMatcher, NameHeuristicMatcher, Preference};
pub use platform::{detect_cpu, detect_platform, Cpu, LocalProbe, Platform, SystemProbe};
