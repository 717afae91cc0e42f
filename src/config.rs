use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

pub const APP_DIR: &str = "prefixctl";
pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_LAUNCHER: &str = "umu-run";
const PREFIXES_DIR: &str = "prefixes";
const RUNNERS_DIR: &str = ".local/share/Steam/compatibilitytools.d";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub prefixes_root: PathBuf,
    pub runners_root: PathBuf,
    /// Explicit launcher binary; `umu-run` on `PATH` otherwise.
    #[serde(default)]
    pub launcher: Option<PathBuf>,
    #[serde(default)]
    pub default_runner: String,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        Self::load_or_create_in(&base_dir)
    }

    pub fn load_or_create_in(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join(CONFIG_FILE);
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let home = BaseDirs::new().context("resolve home dir")?;
        let config = AppConfig {
            prefixes_root: base_dir.join(PREFIXES_DIR),
            runners_root: home.home_dir().join(RUNNERS_DIR),
            launcher: None,
            default_runner: String::new(),
        };
        config.save_in(base_dir)?;
        Ok(config)
    }

    pub fn save_in(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(base_dir.join(CONFIG_FILE), raw).context("write app config")?;
        Ok(())
    }

    pub fn prefix_dir(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            bail!("invalid prefix name: {name:?}");
        }
        Ok(self.prefixes_root.join(name))
    }

    /// Sorted names of the prefix directories under `prefixes_root`.
    pub fn prefixes(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.prefixes_root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    /// The launcher executable, or `None` when it cannot be found.
    pub fn launcher_path(&self) -> Option<PathBuf> {
        match &self.launcher {
            Some(path) if path.components().count() > 1 => {
                is_executable(path).then(|| path.clone())
            }
            Some(name) => find_on_path(&name.to_string_lossy()),
            None => find_on_path(DEFAULT_LAUNCHER),
        }
    }
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join(APP_DIR))
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_defaults_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_create_in(dir.path()).unwrap();
        assert_eq!(config.prefixes_root, dir.path().join("prefixes"));
        assert!(config.runners_root.ends_with("compatibilitytools.d"));
        assert!(dir.path().join(CONFIG_FILE).exists());

        let mut changed = config.clone();
        changed.default_runner = "GE-Proton10-9".to_string();
        changed.save_in(dir.path()).unwrap();
        let reloaded = AppConfig::load_or_create_in(dir.path()).unwrap();
        assert_eq!(reloaded.default_runner, "GE-Proton10-9");
    }

    #[test]
    fn lists_prefix_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            prefixes_root: dir.path().to_path_buf(),
            runners_root: dir.path().join("runners"),
            launcher: None,
            default_runner: String::new(),
        };
        fs::create_dir(dir.path().join("steam")).unwrap();
        fs::create_dir(dir.path().join("battle.net")).unwrap();
        fs::create_dir(dir.path().join(".trash")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert_eq!(config.prefixes(), vec!["battle.net", "steam"]);
        assert!(config.prefix_dir("../escape").is_err());
        assert_eq!(config.prefix_dir("steam").unwrap(), dir.path().join("steam"));
    }

    #[test]
    fn explicit_launcher_must_be_executable() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = dir.path().join("umu-run");
        fs::write(&launcher, "#!/bin/sh\n").unwrap();
        let mut config = AppConfig {
            prefixes_root: dir.path().to_path_buf(),
            runners_root: dir.path().to_path_buf(),
            launcher: Some(launcher.clone()),
            default_runner: String::new(),
        };
        assert_eq!(config.launcher_path(), None);
        fs::set_permissions(&launcher, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(config.launcher_path(), Some(launcher));

        config.launcher = Some(dir.path().join("missing"));
        assert_eq!(config.launcher_path(), None);
    }
}
