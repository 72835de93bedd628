use tracing::debug;

use crate::catalog::ArtifactFile;
use crate::platform::{Cpu, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Preference {
    Unacceptable,
    Secondary,
    Primary,
}

impl Preference {
    fn must(accepted: bool) -> Self {
        if accepted {
            Self::Primary
        } else {
            Self::Unacceptable
        }
    }
}

impl Cpu {
    /// Classifies an upper-cased artifact name for this CPU.
    ///
    /// Older bundles say "AMD64" and newer ones "x64", so 64-bit bits are
    /// located by the bare "64" token.
    pub fn accept(self, line: &str) -> Preference {
        let sparc = line.contains("SPARC");
        let itanium = line.contains("IA64");
        match self {
            // no fallback for these two
            Self::Sparc => Preference::must(sparc),
            Self::Itanium => Preference::must(itanium),
            Self::X86_64 => {
                if sparc || itanium {
                    Preference::Unacceptable
                } else if line.contains("64") {
                    Preference::Primary
                } else {
                    Preference::Secondary
                }
            }
            Self::X86_32 => Preference::must(!(line.contains("64") || sparc || itanium)),
        }
    }
}

/// Picks the artifact of a release that fits a platform/CPU pair.
pub trait ArtifactMatcher {
    fn select<'a>(
        &self,
        files: &'a [ArtifactFile],
        platform: Platform,
        cpu: Cpu,
    ) -> Option<&'a ArtifactFile>;
}

/// Substring heuristics over free-form artifact names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameHeuristicMatcher;

impl ArtifactMatcher for NameHeuristicMatcher {
    fn select<'a>(
        &self,
        files: &'a [ArtifactFile],
        platform: Platform,
        cpu: Cpu,
    ) -> Option<&'a ArtifactFile> {
        select_best(files, platform, cpu)
    }
}

pub fn select_best(files: &[ArtifactFile], platform: Platform, cpu: Cpu) -> Option<&ArtifactFile> {
    let mut primary = None;
    let mut secondary = None;

    for file in files {
        let upper = file.name.to_uppercase();
        if !platform.is(&upper) {
            continue;
        }

        match cpu.accept(&upper) {
            Preference::Primary if primary.is_none() => primary = Some(file),
            Preference::Secondary if secondary.is_none() => secondary = Some(file),
            _ => {}
        }
    }

    let choice = primary.or(secondary);
    if let Some(file) = choice {
        debug!(platform = %platform, cpu = %cpu, artifact = %file.name, "platform choice");
    }
    choice
}
