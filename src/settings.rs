use crate::options::{OptionKey, OptionKind};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const PREFIX_GROUP: &str = "PrefixSettings";
pub const SHORTCUT_GROUP_PREFIX: &str = "Shortcuts--";
pub const SETTINGS_FILE: &str = "prefix.json";

/// A stored option value. The on-disk form is the plain JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl Value {
    /// Empty strings and empty lists count as "not set".
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Text(text) => text.trim().is_empty(),
            Value::List(items) => items.iter().all(|item| item.trim().is_empty()),
            Value::Bool(_) | Value::Int(_) => false,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Text(text) => {
                let text = text.trim();
                text == "1" || text.eq_ignore_ascii_case("true")
            }
            Value::List(_) => false,
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(value) => *value,
            Value::Bool(value) => i64::from(*value),
            Value::Text(text) => text.trim().parse().unwrap_or(0),
            Value::List(_) => 0,
        }
    }

    /// Lists may be stored either as real lists or as one `;`-joined string.
    pub fn as_list(&self) -> Vec<String> {
        let items: Vec<String> = match self {
            Value::List(items) => items.clone(),
            Value::Text(text) => text.split(';').map(str::to_string).collect(),
            Value::Bool(_) | Value::Int(_) => vec![self.as_text()],
        };
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            Value::Int(value) => value.to_string(),
            Value::Bool(value) => (if *value { "1" } else { "0" }).to_string(),
            Value::List(items) => items.join(";"),
        }
    }

    /// Parses user input for the given option kind.
    pub fn parse_for(kind: OptionKind, raw: &[String]) -> Result<Value> {
        if raw.is_empty() {
            bail!("missing value");
        }
        let joined = raw.join(" ");
        match kind {
            OptionKind::Bool => match joined.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
                "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
                other => bail!("expected a boolean, got {other:?}"),
            },
            OptionKind::Int => joined
                .trim()
                .parse()
                .map(Value::Int)
                .with_context(|| format!("expected an integer, got {joined:?}")),
            OptionKind::Text => {
                if raw.len() == 1 {
                    Ok(Value::Text(joined))
                } else {
                    Ok(Value::List(raw.to_vec()))
                }
            }
            OptionKind::List => {
                if raw.len() == 1 {
                    Ok(Value::List(Value::Text(joined).as_list()))
                } else {
                    Ok(Value::List(raw.to_vec()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Prefix,
    Shortcut(String),
}

impl Scope {
    pub fn group_name(&self) -> String {
        match self {
            Scope::Prefix => PREFIX_GROUP.to_string(),
            Scope::Shortcut(hash) => format!("{SHORTCUT_GROUP_PREFIX}{hash}"),
        }
    }

    fn parse_group(name: &str) -> Option<Scope> {
        if name == PREFIX_GROUP {
            return Some(Scope::Prefix);
        }
        name.strip_prefix(SHORTCUT_GROUP_PREFIX)
            .filter(|hash| !hash.is_empty())
            .map(|hash| Scope::Shortcut(hash.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ShortcutSummary {
    pub hash: String,
    pub name: String,
    pub path: String,
}

/// Two-tier option storage for one prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsStore {
    groups: BTreeMap<String, BTreeMap<String, Value>>,
}

impl SettingsStore {
    pub fn load(prefix_dir: &Path) -> Result<Self> {
        let path = settings_path(prefix_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).context("read prefix settings")?;
        let store: SettingsStore = serde_json::from_str(&raw).context("parse prefix settings")?;
        store
            .validate()
            .with_context(|| format!("validate {}", path.display()))?;
        Ok(store)
    }

    pub fn save(&self, prefix_dir: &Path) -> Result<()> {
        fs::create_dir_all(prefix_dir).context("create prefix dir")?;
        let raw = serde_json::to_string_pretty(self).context("serialize prefix settings")?;
        fs::write(settings_path(prefix_dir), raw).context("write prefix settings")?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (group, values) in &self.groups {
            let Some(scope) = Scope::parse_group(group) else {
                bail!("unknown settings group: {group}");
            };
            for name in values.keys() {
                let key: OptionKey = name.parse()?;
                check_scope(&scope, key)?;
            }
        }
        Ok(())
    }

    /// Raw lookup by `"<Group>/<Key>"` path.
    #[cfg(test)]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let (group, key) = path.split_once('/')?;
        self.groups.get(group)?.get(key)
    }

    pub fn value(&self, scope: &Scope, key: OptionKey) -> Option<&Value> {
        self.groups.get(&scope.group_name())?.get(key.key())
    }

    pub fn set(&mut self, scope: &Scope, key: OptionKey, value: Value) -> Result<()> {
        check_scope(scope, key)?;
        self.groups
            .entry(scope.group_name())
            .or_default()
            .insert(key.key().to_string(), value);
        Ok(())
    }

    pub fn unset(&mut self, scope: &Scope, key: OptionKey) -> bool {
        let group = scope.group_name();
        let Some(values) = self.groups.get_mut(&group) else {
            return false;
        };
        let removed = values.remove(key.key()).is_some();
        if values.is_empty() {
            self.groups.remove(&group);
        }
        removed
    }

    pub fn has_shortcut(&self, hash: &str) -> bool {
        self.groups
            .contains_key(&Scope::Shortcut(hash.to_string()).group_name())
    }

    pub fn remove_shortcut(&mut self, hash: &str) -> bool {
        self.groups
            .remove(&Scope::Shortcut(hash.to_string()).group_name())
            .is_some()
    }

    pub fn add_shortcut(&mut self, name: &str, path: &str) -> Result<String> {
        let hash = shortcut_hash(name, path);
        let scope = Scope::Shortcut(hash.clone());
        self.set(&scope, OptionKey::Name, Value::Text(name.to_string()))?;
        self.set(&scope, OptionKey::Path, Value::Text(path.to_string()))?;
        Ok(hash)
    }

    pub fn shortcuts(&self) -> Vec<ShortcutSummary> {
        let mut list: Vec<ShortcutSummary> = self
            .groups
            .iter()
            .filter_map(|(group, values)| {
                let hash = group.strip_prefix(SHORTCUT_GROUP_PREFIX)?;
                let text = |key: OptionKey| {
                    values
                        .get(key.key())
                        .map(Value::as_text)
                        .unwrap_or_default()
                };
                Some(ShortcutSummary {
                    hash: hash.to_string(),
                    name: text(OptionKey::Name),
                    path: text(OptionKey::Path),
                })
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Accepts a shortcut hash or its display name.
    pub fn find_shortcut(&self, query: &str) -> Option<String> {
        if self.has_shortcut(query) {
            return Some(query.to_string());
        }
        self.shortcuts()
            .into_iter()
            .find(|shortcut| shortcut.name == query)
            .map(|shortcut| shortcut.hash)
    }
}

fn check_scope(scope: &Scope, key: OptionKey) -> Result<()> {
    match scope {
        Scope::Prefix if !key.allowed_in_prefix() => {
            bail!("{key} can only be set on a shortcut")
        }
        Scope::Shortcut(_) if !key.allowed_in_shortcut() => {
            bail!("{key} can only be set on the prefix")
        }
        _ => Ok(()),
    }
}

pub fn settings_path(prefix_dir: &Path) -> PathBuf {
    prefix_dir.join(SETTINGS_FILE)
}

pub fn shortcut_hash(name: &str, path: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(path.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercions() {
        assert!(Value::Text("true".into()).as_bool());
        assert!(Value::Text("1".into()).as_bool());
        assert!(!Value::Text("yes please".into()).as_bool());
        assert_eq!(Value::Text("abc".into()).as_int(), 0);
        assert_eq!(Value::Text(" 144 ".into()).as_int(), 144);
        assert_eq!(
            Value::Text("d3d9=n,b;dxgi=n".into()).as_list(),
            vec!["d3d9=n,b", "dxgi=n"]
        );
        assert!(Value::Text("  ".into()).is_blank());
        assert!(Value::List(vec![]).is_blank());
        assert!(!Value::Bool(false).is_blank());
    }

    #[test]
    fn raw_paths_and_scopes() {
        let mut store = SettingsStore::default();
        store
            .set(&Scope::Prefix, OptionKey::ScalingMode, Value::Int(1))
            .unwrap();
        let hash = store.add_shortcut("Game", "C:/Games/game.exe").unwrap();
        assert_eq!(store.get("PrefixSettings/ScalingMode"), Some(&Value::Int(1)));
        assert_eq!(
            store.get(&format!("Shortcuts--{hash}/Name")),
            Some(&Value::Text("Game".into()))
        );
        assert!(store
            .set(&Scope::Prefix, OptionKey::Path, Value::Text("x".into()))
            .is_err());
        assert!(store
            .set(
                &Scope::Shortcut(hash.clone()),
                OptionKey::CurrentRunner,
                Value::Text("x".into())
            )
            .is_err());
        assert_eq!(store.find_shortcut("Game"), Some(hash.clone()));
        assert!(store.remove_shortcut(&hash));
        assert!(store.get(&format!("Shortcuts--{hash}/Name")).is_none());
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            settings_path(dir.path()),
            r#"{"PrefixSettings": {"ScalingMod": 1}}"#,
        )
        .unwrap();
        let err = SettingsStore::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("ScalingMod"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::default();
        store
            .set(
                &Scope::Prefix,
                OptionKey::DllOverrides,
                Value::List(vec!["d3d9=n,b".into()]),
            )
            .unwrap();
        store.save(dir.path()).unwrap();
        let loaded = SettingsStore::load(dir.path()).unwrap();
        assert_eq!(
            loaded.value(&Scope::Prefix, OptionKey::DllOverrides),
            Some(&Value::List(vec!["d3d9=n,b".into()]))
        );
    }
}
