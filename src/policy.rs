//! Closed decision tables mapping stored option ordinals onto Proton/Wine
//! environment variables and gamescope flags.

pub const ENV_FSR: &str = "WINE_FULLSCREEN_FSR";
pub const ENV_FSR_STRENGTH: &str = "WINE_FULLSCREEN_FSR_STRENGTH";
pub const ENV_FSR_CUSTOM: &str = "WINE_FULLSCREEN_FSR_CUSTOM_MODE";
pub const ENV_INTEGER_SCALING: &str = "WINE_FULLSCREEN_INTEGER_SCALING";

pub const ENV_USE_NTSYNC: &str = "PROTON_USE_NTSYNC";
pub const ENV_USE_WOW64: &str = "PROTON_USE_WOW64";
pub const ENV_NO_NTSYNC: &str = "PROTON_NO_NTSYNC";
pub const ENV_NO_ESYNC: &str = "PROTON_NO_ESYNC";
pub const ENV_NO_FSYNC: &str = "PROTON_NO_FSYNC";

pub const ENV_WINEDEBUG: &str = "WINEDEBUG";

const ON: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    Normal,
    IntegerScale,
    FsrPerformance,
    FsrBalanced,
    FsrQuality,
    FsrHighQuality,
    FsrHigherQuality,
    FsrHighestQuality,
    FsrCustom,
    GamescopeFullscreen,
    GamescopeBorderless,
    GamescopeWindowed,
}

impl ScalingMode {
    const ORDER: [ScalingMode; 12] = [
        ScalingMode::Normal,
        ScalingMode::IntegerScale,
        ScalingMode::FsrPerformance,
        ScalingMode::FsrBalanced,
        ScalingMode::FsrQuality,
        ScalingMode::FsrHighQuality,
        ScalingMode::FsrHigherQuality,
        ScalingMode::FsrHighestQuality,
        ScalingMode::FsrCustom,
        ScalingMode::GamescopeFullscreen,
        ScalingMode::GamescopeBorderless,
        ScalingMode::GamescopeWindowed,
    ];

    /// Unknown ordinals fall back to `Normal`.
    pub fn from_index(index: i64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|index| Self::ORDER.get(index).copied())
            .unwrap_or(ScalingMode::Normal)
    }

    /// Position on Wine's 0-5 FSR strength scale for the fixed FSR tiers.
    pub fn fsr_strength(self) -> Option<u8> {
        match self {
            ScalingMode::FsrPerformance => Some(0),
            ScalingMode::FsrBalanced => Some(1),
            ScalingMode::FsrQuality => Some(2),
            ScalingMode::FsrHighQuality => Some(3),
            ScalingMode::FsrHigherQuality => Some(4),
            ScalingMode::FsrHighestQuality => Some(5),
            _ => None,
        }
    }

    pub fn is_gamescope(self) -> bool {
        matches!(
            self,
            ScalingMode::GamescopeFullscreen
                | ScalingMode::GamescopeBorderless
                | ScalingMode::GamescopeWindowed
        )
    }

    /// Environment produced by the non-gamescope tiers. `custom` is the
    /// resolved `(width, height)` pair used by `FsrCustom`.
    pub fn environment(self, custom: (i64, i64)) -> Vec<(&'static str, String)> {
        match self {
            ScalingMode::Normal
            | ScalingMode::GamescopeFullscreen
            | ScalingMode::GamescopeBorderless
            | ScalingMode::GamescopeWindowed => Vec::new(),
            ScalingMode::IntegerScale => vec![
                (ENV_FSR, ON.to_string()),
                (ENV_INTEGER_SCALING, ON.to_string()),
            ],
            ScalingMode::FsrCustom => vec![
                (ENV_FSR, ON.to_string()),
                (ENV_FSR_CUSTOM, format!("{}x{}", custom.0, custom.1)),
            ],
            tier => match tier.fsr_strength() {
                Some(strength) => vec![
                    (ENV_FSR, ON.to_string()),
                    (ENV_FSR_STRENGTH, strength.to_string()),
                ],
                None => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Normal,
    Ntsync,
    Fsync,
    Esync,
    NoSync,
}

impl SyncMode {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => SyncMode::Ntsync,
            2 => SyncMode::Fsync,
            3 => SyncMode::Esync,
            4 => SyncMode::NoSync,
            _ => SyncMode::Normal,
        }
    }

    /// NTsync only applies to runners that understand it; other runners keep
    /// their own default. `NoSync` disables everything `Esync` disables plus
    /// esync itself.
    pub fn environment(self, ntsync_capable: bool) -> Vec<(&'static str, &'static str)> {
        match self {
            SyncMode::Normal => Vec::new(),
            SyncMode::Ntsync if ntsync_capable => {
                vec![(ENV_USE_NTSYNC, ON), (ENV_USE_WOW64, ON)]
            }
            SyncMode::Ntsync => Vec::new(),
            SyncMode::Fsync => vec![(ENV_NO_NTSYNC, ON)],
            SyncMode::Esync => vec![(ENV_NO_NTSYNC, ON), (ENV_NO_FSYNC, ON)],
            SyncMode::NoSync => {
                let mut vars = vec![(ENV_NO_ESYNC, ON)];
                vars.extend(SyncMode::Esync.environment(ntsync_capable));
                vars
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugOutput {
    Disabled,
    Full,
    LoadDll,
}

impl DebugOutput {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => DebugOutput::Full,
            2 => DebugOutput::LoadDll,
            _ => DebugOutput::Disabled,
        }
    }

    pub fn winedebug(self) -> Option<&'static str> {
        match self {
            DebugOutput::Disabled => None,
            DebugOutput::Full => Some("+loaddll,debugstr,mscoree,seh"),
            DebugOutput::LoadDll => Some("+loaddll"),
        }
    }

    pub fn enables_logging(self) -> bool {
        self != DebugOutput::Disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamescopeFilter {
    Default,
    Nearest,
    Fsr,
    Nis,
    Pixel,
}

impl GamescopeFilter {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => GamescopeFilter::Nearest,
            2 => GamescopeFilter::Fsr,
            3 => GamescopeFilter::Nis,
            4 => GamescopeFilter::Pixel,
            _ => GamescopeFilter::Default,
        }
    }

    pub fn token(self) -> Option<&'static str> {
        match self {
            GamescopeFilter::Default => None,
            GamescopeFilter::Nearest => Some("nearest"),
            GamescopeFilter::Fsr => Some("fsr"),
            GamescopeFilter::Nis => Some("nis"),
            GamescopeFilter::Pixel => Some("pixel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamescopeScaler {
    Default,
    Auto,
    Integer,
    Fit,
    Fill,
    Stretch,
}

impl GamescopeScaler {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => GamescopeScaler::Auto,
            2 => GamescopeScaler::Integer,
            3 => GamescopeScaler::Fit,
            4 => GamescopeScaler::Fill,
            5 => GamescopeScaler::Stretch,
            _ => GamescopeScaler::Default,
        }
    }

    pub fn token(self) -> Option<&'static str> {
        match self {
            GamescopeScaler::Default => None,
            GamescopeScaler::Auto => Some("auto"),
            GamescopeScaler::Integer => Some("integer"),
            GamescopeScaler::Fit => Some("fit"),
            GamescopeScaler::Fill => Some("fill"),
            GamescopeScaler::Stretch => Some("stretch"),
        }
    }
}

/// Vendor upscalers a runner can swap in or watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconstruction {
    Dlss,
    Xess,
    Fsr4,
    Fsr4Rdna3,
}

impl Reconstruction {
    pub fn upgrade_from_index(index: i64) -> Option<Self> {
        match index {
            1 => Some(Reconstruction::Dlss),
            2 => Some(Reconstruction::Xess),
            3 => Some(Reconstruction::Fsr4),
            4 => Some(Reconstruction::Fsr4Rdna3),
            _ => None,
        }
    }

    pub fn indicator_from_index(index: i64) -> Option<Self> {
        match index {
            1 => Some(Reconstruction::Dlss),
            2 => Some(Reconstruction::Fsr4),
            _ => None,
        }
    }

    pub fn upgrade_var(self) -> &'static str {
        match self {
            Reconstruction::Dlss => "PROTON_DLSS_UPGRADE",
            Reconstruction::Xess => "PROTON_XESS_UPGRADE",
            Reconstruction::Fsr4 => "PROTON_FSR4_UPGRADE",
            Reconstruction::Fsr4Rdna3 => "PROTON_FSR4_RDNA3_UPGRADE",
        }
    }

    pub fn indicator_var(self) -> Option<&'static str> {
        match self {
            Reconstruction::Dlss => Some("PROTON_DLSS_INDICATOR"),
            Reconstruction::Fsr4 | Reconstruction::Fsr4Rdna3 => Some("PROTON_FSR4_INDICATOR"),
            Reconstruction::Xess => None,
        }
    }
}
