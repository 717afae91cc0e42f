use crate::{
    config::AppConfig,
    options::OptionKey,
    settings::{Scope, SettingsStore, Value},
};
use anyhow::{bail, Context, Result};
use std::{fs, path::PathBuf};

pub const LOGS_DIR: &str = ".logs";
pub const SHADER_CACHE_DIR: &str = ".shaderCache";

/// A prefix directory together with its settings.
#[derive(Debug, Clone)]
pub struct Prefix {
    pub name: String,
    pub dir: PathBuf,
    pub settings: SettingsStore,
}

impl Prefix {
    pub fn open(config: &AppConfig, name: &str) -> Result<Self> {
        let dir = config.prefix_dir(name)?;
        if !dir.is_dir() {
            bail!("prefix not found: {name}");
        }
        let settings = SettingsStore::load(&dir)?;
        Ok(Self {
            name: name.to_string(),
            dir,
            settings,
        })
    }

    /// Creates an empty prefix; the launcher populates it on first run.
    pub fn create(config: &AppConfig, name: &str, runner: &str) -> Result<Self> {
        let dir = config.prefix_dir(name)?;
        if dir.exists() {
            bail!("prefix already exists: {name}");
        }
        fs::create_dir_all(&dir).context("create prefix dir")?;
        let mut settings = SettingsStore::default();
        if !runner.is_empty() {
            settings.set(
                &Scope::Prefix,
                OptionKey::CurrentRunner,
                Value::Text(runner.to_string()),
            )?;
        }
        settings.save(&dir)?;
        Ok(Self {
            name: name.to_string(),
            dir,
            settings,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.settings.save(&self.dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join(LOGS_DIR)
    }

    pub fn shader_cache_dir(&self) -> PathBuf {
        self.dir.join(SHADER_CACHE_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::settings_path;

    fn config(root: &std::path::Path) -> AppConfig {
        AppConfig {
            prefixes_root: root.join("prefixes"),
            runners_root: root.join("runners"),
            launcher: None,
            default_runner: String::new(),
        }
    }

    #[test]
    fn create_seeds_runner_and_reopens() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        let created = Prefix::create(&config, "steam", "GE-Proton10-9").unwrap();
        assert!(settings_path(&created.dir).exists());
        assert!(Prefix::create(&config, "steam", "").is_err());

        let opened = Prefix::open(&config, "steam").unwrap();
        assert_eq!(
            opened.settings.get("PrefixSettings/CurrentRunner"),
            Some(&Value::Text("GE-Proton10-9".into()))
        );
        assert_eq!(opened.logs_dir(), created.dir.join(".logs"));
    }

    #[test]
    fn open_missing_prefix_fails() {
        let root = tempfile::tempdir().unwrap();
        assert!(Prefix::open(&config(root.path()), "nothing").is_err());
    }
}
