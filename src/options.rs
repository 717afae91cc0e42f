use anyhow::{bail, Result};
use std::{collections::HashSet, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Text,
    List,
}

impl OptionKind {
    pub fn label(self) -> &'static str {
        match self {
            OptionKind::Bool => "bool",
            OptionKind::Int => "int",
            OptionKind::Text => "text",
            OptionKind::List => "list",
        }
    }
}

/// Which settings groups an option may be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionScope {
    Any,
    PrefixOnly,
    ShortcutOnly,
}

macro_rules! option_keys {
    ($($variant:ident => $key:literal, $kind:ident, $scope:ident;)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OptionKey {
            $($variant,)+
        }

        impl OptionKey {
            pub const ALL: &'static [OptionKey] = &[$(OptionKey::$variant,)+];

            pub fn key(self) -> &'static str {
                match self {
                    $(OptionKey::$variant => $key,)+
                }
            }

            pub fn kind(self) -> OptionKind {
                match self {
                    $(OptionKey::$variant => OptionKind::$kind,)+
                }
            }

            pub fn scope(self) -> OptionScope {
                match self {
                    $(OptionKey::$variant => OptionScope::$scope,)+
                }
            }
        }
    };
}

option_keys! {
    Name => "Name", Text, ShortcutOnly;
    Path => "Path", Text, ShortcutOnly;
    Args => "Args", Text, ShortcutOnly;
    IgnoreGlobalDlls => "IgnoreGlobalDLLs", Bool, ShortcutOnly;
    PreRunScript => "PreRunScript", Text, Any;
    PostRunScript => "PostRunScript", Text, Any;

    CurrentRunner => "CurrentRunner", Text, PrefixOnly;
    RuntimeUpdateOnLaunch => "RuntimeUpdateOnLaunch", Bool, PrefixOnly;

    DllOverrides => "DLLoverrides", List, Any;
    ForceWineD3D => "ForceWineD3D", Bool, Any;
    NoD8vk => "NoD8VK", Bool, Any;
    EnableNvapi => "EnableNVAPI", Bool, Any;
    LimitGlExtensions => "LimitGLextensions", Bool, Any;
    VkCapture => "VKcapture", Bool, Any;
    ForceIgpu => "ForceiGPU", Bool, Any;
    LimitFps => "LimitFPS", Int, Any;
    FileSyncMode => "FileSyncMode", Int, Any;
    DebugOutput => "DebugOutput", Int, Any;
    AllowHidraw => "AllowHidraw", Bool, Any;
    UseXalia => "UseXalia", Bool, Any;
    UseWayland => "UseWayland", Bool, Any;
    UseHdr => "UseHDR", Bool, Any;

    Gamemode => "Gamemode", Bool, Any;
    Mangohud => "Mangohud", Bool, Any;
    UseZink => "UseZink", Bool, Any;

    ScalingMode => "ScalingMode", Int, Any;
    FsrCustomResW => "FSRcustomResW", Int, Any;
    FsrCustomResH => "FSRcustomResH", Int, Any;
    GamescopeOutResW => "GamescopeOutResW", Int, Any;
    GamescopeOutResH => "GamescopeOutResH", Int, Any;
    GamescopeWinResW => "GamescopeWinResW", Int, Any;
    GamescopeWinResH => "GamescopeWinResH", Int, Any;
    GamescopeFilter => "GamescopeFilter", Int, Any;
    GamescopeScaler => "GamescopeScaler", Int, Any;

    ImageReconstructionUpgrade => "ImageReconstructionUpgrade", Int, Any;
    ImageReconstructionIndicator => "ImageReconstructionIndicator", Int, Any;
    UseNvidiaLibs => "UseNvidiaLibs", Bool, Any;
    UseLocalShaderCache => "UseLocalShaderCache", Bool, Any;
    UseNoDecorations => "UseNoDecorations", Bool, Any;
    SteamInputDisabled => "SteamInputDisabled", Bool, Any;
    WineCpuTopology => "WineCpuTopology", Bool, Any;
    CpuCores => "CpuCores", List, Any;
}

impl OptionKey {
    pub fn allowed_in_prefix(self) -> bool {
        self.scope() != OptionScope::ShortcutOnly
    }

    pub fn allowed_in_shortcut(self) -> bool {
        self.scope() != OptionScope::PrefixOnly
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown option key: {0}")]
pub struct UnknownOption(pub String);

impl FromStr for OptionKey {
    type Err = UnknownOption;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        OptionKey::ALL
            .iter()
            .copied()
            .find(|key| key.key() == value)
            .ok_or_else(|| UnknownOption(value.to_string()))
    }
}

/// Startup check for the option table: keys must be unique and parse back to
/// the same variant.
pub fn validate_registry() -> Result<()> {
    let mut seen = HashSet::new();
    for key in OptionKey::ALL {
        if !seen.insert(key.key()) {
            bail!("duplicate option key in registry: {}", key.key());
        }
        if key.key().is_empty() || key.key().contains('/') {
            bail!("invalid option key in registry: {:?}", key.key());
        }
        match key.key().parse::<OptionKey>() {
            Ok(parsed) if parsed == *key => {}
            _ => bail!("option key does not round-trip: {}", key.key()),
        }
    }
    Ok(())
}
