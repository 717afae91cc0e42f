use crate::{
    options::OptionKey,
    policy::{DebugOutput, Reconstruction, ScalingMode, SyncMode, ENV_WINEDEBUG},
    resolve::{merge_dll_overrides, Resolver, ScopeMode},
    runner::{RunnerInfo, RunnerSelection},
};
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};

pub const ENV_WINEPREFIX: &str = "WINEPREFIX";
pub const ENV_GAMEID: &str = "GAMEID";
pub const ENV_PROTONPATH: &str = "PROTONPATH";
pub const ENV_PROTON_VERB: &str = "PROTON_VERB";
pub const ENV_RUNTIME_UPDATE: &str = "UMU_RUNTIME_UPDATE";
pub const ENV_NO_PROTON: &str = "UMU_NO_PROTON";
pub const ENV_BUTTON_LABELS: &str = "SDL_GAMECONTROLLER_USE_BUTTON_LABELS";
pub const ENV_DLL_OVERRIDES: &str = "WINEDLLOVERRIDES";
pub const ENV_USE_WINED3D: &str = "PROTON_USE_WINED3D";
pub const ENV_DXVK_D3D8: &str = "PROTON_DXVK_D3D8";
pub const ENV_FRAME_RATE: &str = "DXVK_FRAME_RATE";
pub const ENV_HIDRAW: &str = "PROTON_ENABLE_HIDRAW";
pub const ENV_PREFER_SDL: &str = "PROTON_PREFER_SDL";
pub const ENV_XALIA: &str = "PROTON_USE_XALIA";
pub const ENV_WAYLAND_DISPLAY: &str = "WAYLAND_DISPLAY";
pub const ENV_ENABLE_WAYLAND: &str = "PROTON_ENABLE_WAYLAND";
pub const ENV_ENABLE_HDR: &str = "PROTON_ENABLE_HDR";
pub const ENV_CPU_TOPOLOGY: &str = "WINE_CPU_TOPOLOGY";
pub const ENV_DXVK_CACHE: &str = "DXVK_STATE_CACHE_PATH";
pub const ENV_VKD3D_CACHE: &str = "VKD3D_SHADER_CACHE_PATH";
pub const ENV_MANGOHUD: &str = "MANGOHUD";

pub const VERB_RUN: &str = "run";
pub const VERB_WAIT_AND_RUN: &str = "waitforexitandrun";

const TRUE: &str = "1";
const FALSE: &str = "0";

/// Options that map 1:1 onto a variable set to `1` when enabled.
const SIMPLE_FLAGS: &[(OptionKey, &str)] = &[
    (OptionKey::EnableNvapi, "PROTON_FORCE_NVAPI"),
    (OptionKey::LimitGlExtensions, "PROTON_OLD_GL_STRING"),
    (OptionKey::VkCapture, "OBS_VKCAPTURE"),
    (OptionKey::ForceIgpu, "MESA_VK_DEVICE_SELECT_FORCE_DEFAULT_DEVICE"),
    (OptionKey::UseNvidiaLibs, "PROTON_NVIDIA_LIBS"),
    (OptionKey::UseLocalShaderCache, "PROTON_LOCAL_SHADER_CACHE"),
    (OptionKey::UseNoDecorations, "PROTON_NO_WM_DECORATION"),
    (OptionKey::SteamInputDisabled, "PROTON_NO_STEAMINPUT"),
];

/// Child process environment, kept sorted so logs and plans are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvMap(BTreeMap<String, String>);

impl EnvMap {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ambient() -> Self {
        std::env::vars_os()
            .map(|(key, value)| {
                (
                    key.to_string_lossy().into_owned(),
                    value.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Sets `key` only when nothing (ambient or earlier) defined it.
    pub fn insert_default(&mut self, key: &str, value: &str) {
        if !self.contains(key) {
            self.insert(key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn lines(&self) -> Vec<String> {
        self.iter().map(|(key, value)| format!("{key}={value}")).collect()
    }
}

impl FromIterator<(String, String)> for EnvMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        EnvMap(iter.into_iter().collect())
    }
}

/// Per-launch facts the environment depends on besides the settings.
#[derive(Debug, Clone, Copy)]
pub struct EnvInputs<'a> {
    pub prefix_dir: &'a Path,
    pub runner: &'a RunnerSelection,
    /// The prefix's wineserver is already up, so Proton should not wait for
    /// its own bootstrap.
    pub prefix_running: bool,
    pub shader_cache: Option<&'a Path>,
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: EnvMap,
    pub debug_logging: bool,
}

/// Builds the launch environment on top of `ambient`. Never fails: options
/// that are absent or unusable leave their variables out.
pub fn build_environment(inputs: &EnvInputs, resolver: &Resolver, ambient: EnvMap) -> Environment {
    let mut env = ambient;
    let runner = RunnerInfo::classify(&inputs.runner.name);

    env.insert(ENV_WINEPREFIX, inputs.prefix_dir.to_string_lossy());
    env.insert_default(ENV_GAMEID, FALSE);
    env.insert(ENV_PROTONPATH, inputs.runner.path.to_string_lossy());

    if resolver
        .resolve_in(OptionKey::RuntimeUpdateOnLaunch, ScopeMode::PrefixOnly)
        .as_bool()
    {
        env.insert_default(ENV_RUNTIME_UPDATE, TRUE);
    }

    let verb = if inputs.prefix_running {
        VERB_RUN
    } else {
        VERB_WAIT_AND_RUN
    };
    env.insert(ENV_PROTON_VERB, verb);
    env.insert_default(ENV_BUTTON_LABELS, FALSE);

    if let Some(cache) = inputs.shader_cache {
        let cache = cache.to_string_lossy();
        env.insert(ENV_DXVK_CACHE, cache.clone());
        env.insert(ENV_VKD3D_CACHE, cache);
    }

    apply_dll_overrides(&mut env, resolver);
    apply_d3d_backend(&mut env, resolver);

    for (key, var) in SIMPLE_FLAGS {
        if resolver.flag(*key) {
            env.insert(*var, TRUE);
        }
    }

    let fps = resolver.int(OptionKey::LimitFps);
    if fps != 0 {
        env.insert(ENV_FRAME_RATE, fps.to_string());
    }

    let sync = SyncMode::from_index(resolver.int(OptionKey::FileSyncMode));
    for (key, value) in sync.environment(runner.supports_ntsync()) {
        env.insert(key, value);
    }

    let debug = DebugOutput::from_index(resolver.int(OptionKey::DebugOutput));
    if let Some(channels) = debug.winedebug() {
        env.insert(ENV_WINEDEBUG, channels);
    }

    if resolver.flag(OptionKey::AllowHidraw) {
        env.insert(ENV_HIDRAW, TRUE);
    } else {
        env.insert(ENV_PREFER_SDL, TRUE);
    }

    if resolver.flag(OptionKey::UseXalia) {
        env.insert(ENV_XALIA, TRUE);
    } else {
        env.insert_default(ENV_XALIA, FALSE);
    }

    let wayland_session = env
        .get(ENV_WAYLAND_DISPLAY)
        .is_some_and(|display| !display.is_empty());
    if wayland_session && resolver.flag(OptionKey::UseWayland) {
        env.insert(ENV_ENABLE_WAYLAND, TRUE);
        if resolver.flag(OptionKey::UseHdr) {
            env.insert(ENV_ENABLE_HDR, TRUE);
        }
    }

    let scaling = ScalingMode::from_index(resolver.int(OptionKey::ScalingMode));
    let custom = (
        resolver.int(OptionKey::FsrCustomResW),
        resolver.int(OptionKey::FsrCustomResH),
    );
    for (key, value) in scaling.environment(custom) {
        env.insert(key, value);
    }

    apply_reconstruction(&mut env, resolver, &runner);

    if resolver.flag(OptionKey::WineCpuTopology) {
        let cores = resolver.resolve(OptionKey::CpuCores).as_list();
        if !cores.is_empty() {
            env.insert(
                ENV_CPU_TOPOLOGY,
                format!("{}:{}", cores.len(), cores.join(",")),
            );
        }
    }

    Environment {
        vars: env,
        debug_logging: debug.enables_logging(),
    }
}

/// Ambient overrides come first so configured entries win on conflicts.
fn apply_dll_overrides(env: &mut EnvMap, resolver: &Resolver) {
    let ambient: Vec<String> = env
        .get(ENV_DLL_OVERRIDES)
        .map(|value| {
            value
                .split(';')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let configured = resolver.dll_overrides();
    if configured.is_empty() {
        return;
    }
    let merged = merge_dll_overrides([ambient, configured]);
    env.insert(ENV_DLL_OVERRIDES, merged.join(";"));
}

/// D8VK rides on DXVK, so an explicit WineD3D choice takes precedence.
fn apply_d3d_backend(env: &mut EnvMap, resolver: &Resolver) {
    let force_wined3d = resolver.resolve(OptionKey::ForceWineD3D);
    if force_wined3d.is_defined() {
        let value = if force_wined3d.as_bool() { TRUE } else { FALSE };
        env.insert(ENV_USE_WINED3D, value);
    } else if !resolver.flag(OptionKey::NoD8vk) {
        env.insert(ENV_DXVK_D3D8, TRUE);
    }
}

fn apply_reconstruction(env: &mut EnvMap, resolver: &Resolver, runner: &RunnerInfo) {
    let upgrade =
        Reconstruction::upgrade_from_index(resolver.int(OptionKey::ImageReconstructionUpgrade));
    if let Some(tech) = upgrade.filter(|tech| runner.supports_reconstruction(*tech)) {
        env.insert(tech.upgrade_var(), TRUE);
    }
    let indicator =
        Reconstruction::indicator_from_index(resolver.int(OptionKey::ImageReconstructionIndicator));
    if let Some(var) = indicator
        .filter(|tech| runner.supports_reconstruction(*tech))
        .filter(|_| runner.supports(OptionKey::ImageReconstructionIndicator))
        .and_then(Reconstruction::indicator_var)
    {
        env.insert(var, TRUE);
    }
}
