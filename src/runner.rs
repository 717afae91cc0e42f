use crate::{options::OptionKey, policy::Reconstruction};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerFamily {
    Stock,
    GloriousEggroll,
    Em,
    CachyOs,
}

/// What a compatibility runner build is, judged from its directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInfo {
    pub family: RunnerFamily,
    pub version: Option<u32>,
    pub sub_version: Option<u32>,
}

const UNIVERSAL_OPTIONS: &[OptionKey] = &[
    OptionKey::UseWayland,
    OptionKey::UseHdr,
    OptionKey::ImageReconstructionUpgrade,
];
const GE_OPTIONS: &[OptionKey] = &[OptionKey::SteamInputDisabled, OptionKey::UseNoDecorations];
const CACHYOS_OPTIONS: &[OptionKey] = &[
    OptionKey::UseNvidiaLibs,
    OptionKey::ImageReconstructionIndicator,
    OptionKey::UseLocalShaderCache,
    OptionKey::SteamInputDisabled,
    OptionKey::UseNoDecorations,
];

impl RunnerInfo {
    pub fn classify(name: &str) -> Self {
        let family = if name.contains("EM-") {
            RunnerFamily::Em
        } else if name.contains("GE-") || name.contains("-GE") {
            RunnerFamily::GloriousEggroll
        } else if name.to_ascii_lowercase().contains("cachy") {
            RunnerFamily::CachyOs
        } else {
            RunnerFamily::Stock
        };
        let numbers = version_numbers(name);
        Self {
            family,
            version: numbers.first().copied(),
            sub_version: numbers.get(1).copied(),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.family != RunnerFamily::Stock
    }

    /// Wayland passthrough needs a Proton 10 base.
    pub fn is_proton10_or_later(&self) -> bool {
        match self.family {
            RunnerFamily::Stock => false,
            RunnerFamily::CachyOs => self.version.map_or(true, |version| version >= 10),
            RunnerFamily::GloriousEggroll | RunnerFamily::Em => {
                self.version.is_some_and(|version| version >= 10)
            }
        }
    }

    /// GE gained ntsync in 10-9.
    pub fn supports_ntsync(&self) -> bool {
        match self.family {
            RunnerFamily::Stock => false,
            RunnerFamily::CachyOs => true,
            RunnerFamily::Em => self.is_proton10_or_later(),
            RunnerFamily::GloriousEggroll => match (self.version, self.sub_version) {
                (Some(version), _) if version > 10 => true,
                (Some(10), Some(sub)) => sub >= 9,
                _ => false,
            },
        }
    }

    pub fn reconstruction_upgrades(&self) -> &'static [Reconstruction] {
        match self.family {
            RunnerFamily::Stock => &[],
            RunnerFamily::GloriousEggroll | RunnerFamily::Em => {
                &[Reconstruction::Fsr4, Reconstruction::Fsr4Rdna3]
            }
            RunnerFamily::CachyOs => &[
                Reconstruction::Dlss,
                Reconstruction::Xess,
                Reconstruction::Fsr4,
                Reconstruction::Fsr4Rdna3,
            ],
        }
    }

    pub fn supports_reconstruction(&self, tech: Reconstruction) -> bool {
        self.reconstruction_upgrades().contains(&tech)
    }

    /// Runner-specific options a front end should offer for this build.
    pub fn valid_options(&self) -> Vec<OptionKey> {
        let extra: &[OptionKey] = match self.family {
            RunnerFamily::Stock => return Vec::new(),
            RunnerFamily::GloriousEggroll => GE_OPTIONS,
            RunnerFamily::Em => &[],
            RunnerFamily::CachyOs => CACHYOS_OPTIONS,
        };
        UNIVERSAL_OPTIONS.iter().chain(extra).copied().collect()
    }

    /// False only for runner-specific options this build does not offer.
    pub fn supports(&self, key: OptionKey) -> bool {
        let runner_specific = UNIVERSAL_OPTIONS
            .iter()
            .chain(GE_OPTIONS)
            .chain(CACHYOS_OPTIONS)
            .any(|option| *option == key);
        !runner_specific || self.valid_options().contains(&key)
    }

    pub fn label(&self) -> String {
        let family = match self.family {
            RunnerFamily::Stock => "stock",
            RunnerFamily::GloriousEggroll => "GE",
            RunnerFamily::Em => "EM",
            RunnerFamily::CachyOs => "CachyOS",
        };
        match (self.version, self.sub_version) {
            (Some(version), Some(sub)) => format!("{family} {version}-{sub}"),
            (Some(version), None) => format!("{family} {version}"),
            _ => family.to_string(),
        }
    }
}

fn version_numbers(name: &str) -> Vec<u32> {
    name.split(|ch: char| !ch.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Sorted names of the runner directories installed under `root`.
pub fn available_runners(root: &Path) -> Vec<String> {
    let mut runners: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    runners.sort();
    runners
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSelection {
    pub name: String,
    pub path: PathBuf,
    /// Set when the configured runner was missing and another was picked.
    pub replaced: Option<String>,
}

/// Uses the configured runner when it exists on disk, otherwise the first
/// installed one.
pub fn select_runner(root: &Path, configured: &str) -> RunnerSelection {
    let path = root.join(configured);
    if !configured.is_empty() && path.exists() {
        return RunnerSelection {
            name: configured.to_string(),
            path,
            replaced: None,
        };
    }
    match available_runners(root).into_iter().next() {
        Some(fallback) => RunnerSelection {
            path: root.join(&fallback),
            name: fallback,
            replaced: Some(configured.to_string()),
        },
        None => RunnerSelection {
            name: configured.to_string(),
            path,
            replaced: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classifies_ge_builds() {
        let info = RunnerInfo::classify("GE-Proton10-9");
        assert_eq!(info.family, RunnerFamily::GloriousEggroll);
        assert_eq!(info.version, Some(10));
        assert_eq!(info.sub_version, Some(9));
        assert!(info.is_proton10_or_later());
        assert!(info.supports_ntsync());
        assert!(!RunnerInfo::classify("GE-Proton10-4").supports_ntsync());
        assert!(!RunnerInfo::classify("GE-Proton9-27").is_proton10_or_later());
    }

    #[test]
    fn classifies_other_families() {
        let cachy = RunnerInfo::classify("proton-cachyos-10.0-20250714-slr");
        assert_eq!(cachy.family, RunnerFamily::CachyOs);
        assert!(cachy.supports_reconstruction(Reconstruction::Dlss));
        assert!(cachy.supports(OptionKey::UseNvidiaLibs));

        let em = RunnerInfo::classify("proton-EM-10.0-13");
        assert_eq!(em.family, RunnerFamily::Em);
        assert!(em.is_proton10_or_later());
        assert!(!em.supports_reconstruction(Reconstruction::Dlss));

        let stock = RunnerInfo::classify("Proton 9.0");
        assert!(!stock.is_custom());
        assert!(!stock.supports_ntsync());
        assert!(!stock.supports(OptionKey::UseWayland));
        assert!(stock.supports(OptionKey::Gamemode));
    }

    #[test]
    fn missing_runner_is_replaced_by_first_installed() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("GE-Proton9-27")).unwrap();
        fs::create_dir(root.path().join("GE-Proton10-9")).unwrap();

        let selected = select_runner(root.path(), "GE-Proton9-27");
        assert_eq!(selected.name, "GE-Proton9-27");
        assert!(selected.replaced.is_none());

        let selected = select_runner(root.path(), "GE-Proton8-1");
        assert_eq!(selected.name, "GE-Proton10-9");
        assert_eq!(selected.path, root.path().join("GE-Proton10-9"));
        assert_eq!(selected.replaced.as_deref(), Some("GE-Proton8-1"));
    }
}
