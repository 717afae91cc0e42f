use crate::{
    options::OptionKey,
    settings::{Scope, SettingsStore, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// Shortcut scope first, prefix scope as fallback.
    Combined,
    /// Ad-hoc launches have no shortcut identity.
    PrefixOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceScope {
    Shortcut,
    Prefix,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSetting {
    pub value: Option<Value>,
    pub source: SourceScope,
    pub has_override: bool,
}

impl ResolvedSetting {
    fn absent() -> Self {
        Self {
            value: None,
            source: SourceScope::None,
            has_override: false,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn as_bool(&self) -> bool {
        self.value.as_ref().is_some_and(Value::as_bool)
    }

    pub fn as_int(&self) -> i64 {
        self.value.as_ref().map(Value::as_int).unwrap_or(0)
    }

    pub fn as_list(&self) -> Vec<String> {
        self.value.as_ref().map(Value::as_list).unwrap_or_default()
    }

    pub fn as_text(&self) -> Option<String> {
        self.value.as_ref().map(Value::as_text)
    }
}

/// Read-only view over one prefix's settings for a single launch.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    store: &'a SettingsStore,
    shortcut: Option<&'a str>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a SettingsStore, shortcut: Option<&'a str>) -> Self {
        Self { store, shortcut }
    }

    pub fn default_mode(&self) -> ScopeMode {
        if self.shortcut.is_some() {
            ScopeMode::Combined
        } else {
            ScopeMode::PrefixOnly
        }
    }

    pub fn resolve(&self, key: OptionKey) -> ResolvedSetting {
        self.resolve_in(key, self.default_mode())
    }

    pub fn resolve_in(&self, key: OptionKey, mode: ScopeMode) -> ResolvedSetting {
        if mode == ScopeMode::Combined {
            if let Some(value) = self.shortcut_value(key) {
                return ResolvedSetting {
                    value: Some(value.clone()),
                    source: SourceScope::Shortcut,
                    has_override: true,
                };
            }
        }
        match self.prefix_value(key) {
            Some(value) => ResolvedSetting {
                value: Some(value.clone()),
                source: SourceScope::Prefix,
                has_override: false,
            },
            None => ResolvedSetting::absent(),
        }
    }

    pub fn flag(&self, key: OptionKey) -> bool {
        self.resolve(key).as_bool()
    }

    pub fn int(&self, key: OptionKey) -> i64 {
        self.resolve(key).as_int()
    }

    pub fn text(&self, key: OptionKey) -> Option<String> {
        self.resolve(key).as_text()
    }

    /// DLL overrides are additive across scopes rather than replaced.
    ///
    /// The scope listed last wins when the same DLL appears twice: shortcut
    /// entries come last when the shortcut is set to override the prefix list
    /// (`IgnoreGlobalDLLs`), otherwise prefix entries do.
    pub fn dll_overrides(&self) -> Vec<String> {
        let prefix = self
            .prefix_value(OptionKey::DllOverrides)
            .map(Value::as_list)
            .unwrap_or_default();
        let shortcut = self
            .shortcut_value(OptionKey::DllOverrides)
            .map(Value::as_list)
            .unwrap_or_default();
        if shortcut.is_empty() || self.default_mode() == ScopeMode::PrefixOnly {
            return merge_dll_overrides([prefix]);
        }
        let shortcut_wins = self
            .shortcut_value(OptionKey::IgnoreGlobalDlls)
            .is_some_and(Value::as_bool);
        if shortcut_wins {
            merge_dll_overrides([prefix, shortcut])
        } else {
            merge_dll_overrides([shortcut, prefix])
        }
    }

    fn shortcut_value(&self, key: OptionKey) -> Option<&'a Value> {
        let hash = self.shortcut?;
        self.store
            .value(&Scope::Shortcut(hash.to_string()), key)
            .filter(|value| !value.is_blank())
    }

    fn prefix_value(&self, key: OptionKey) -> Option<&'a Value> {
        self.store
            .value(&Scope::Prefix, key)
            .filter(|value| !value.is_blank())
    }
}

/// Concatenates override lists and collapses repeated DLL names so the last
/// entry for a name wins and keeps its position.
pub fn merge_dll_overrides<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let all: Vec<String> = lists.into_iter().flatten().collect();
    let mut merged: Vec<String> = Vec::new();
    for (index, entry) in all.iter().enumerate() {
        let name = dll_name(entry);
        let overridden_later = all[index + 1..]
            .iter()
            .any(|later| dll_name(later) == name);
        if !overridden_later {
            merged.push(entry.clone());
        }
    }
    merged
}

fn dll_name(entry: &str) -> String {
    entry
        .split_once('=')
        .map(|(name, _)| name)
        .unwrap_or(entry)
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(hash: &str) -> SettingsStore {
        let mut store = SettingsStore::default();
        let shortcut = Scope::Shortcut(hash.to_string());
        store
            .set(&shortcut, OptionKey::Name, Value::Text("Game".into()))
            .unwrap();
        store
    }

    #[test]
    fn shortcut_value_wins_outright() {
        let mut store = store_with("abc");
        let shortcut = Scope::Shortcut("abc".into());
        store.set(&Scope::Prefix, OptionKey::LimitFps, Value::Int(60)).unwrap();
        store.set(&shortcut, OptionKey::LimitFps, Value::Int(144)).unwrap();

        let resolver = Resolver::new(&store, Some("abc"));
        let resolved = resolver.resolve(OptionKey::LimitFps);
        assert_eq!(resolved.source, SourceScope::Shortcut);
        assert!(resolved.has_override);
        assert_eq!(resolved.as_int(), 144);

        let prefix_only = resolver.resolve_in(OptionKey::LimitFps, ScopeMode::PrefixOnly);
        assert_eq!(prefix_only.source, SourceScope::Prefix);
        assert_eq!(prefix_only.as_int(), 60);
    }

    #[test]
    fn blank_shortcut_value_falls_back() {
        let mut store = store_with("abc");
        let shortcut = Scope::Shortcut("abc".into());
        store.set(&Scope::Prefix, OptionKey::Gamemode, Value::Bool(true)).unwrap();
        store
            .set(&shortcut, OptionKey::Gamemode, Value::Text(String::new()))
            .unwrap();

        let resolved = Resolver::new(&store, Some("abc")).resolve(OptionKey::Gamemode);
        assert_eq!(resolved.source, SourceScope::Prefix);
        assert!(!resolved.has_override);
        assert!(resolved.as_bool());
    }

    #[test]
    fn explicit_false_shortcut_still_overrides() {
        let mut store = store_with("abc");
        let shortcut = Scope::Shortcut("abc".into());
        store.set(&Scope::Prefix, OptionKey::Gamemode, Value::Bool(true)).unwrap();
        store.set(&shortcut, OptionKey::Gamemode, Value::Bool(false)).unwrap();

        let resolver = Resolver::new(&store, Some("abc"));
        assert!(!resolver.flag(OptionKey::Gamemode));
    }

    #[test]
    fn absent_key_is_not_an_error() {
        let store = SettingsStore::default();
        let resolved = Resolver::new(&store, None).resolve(OptionKey::ScalingMode);
        assert_eq!(resolved.source, SourceScope::None);
        assert!(!resolved.is_defined());
        assert_eq!(resolved.as_int(), 0);
        assert!(!resolved.as_bool());
    }

    #[test]
    fn resolving_twice_is_stable() {
        let mut store = store_with("abc");
        store
            .set(&Scope::Prefix, OptionKey::ScalingMode, Value::Int(3))
            .unwrap();
        let resolver = Resolver::new(&store, Some("abc"));
        assert_eq!(
            resolver.resolve(OptionKey::ScalingMode),
            resolver.resolve(OptionKey::ScalingMode)
        );
    }

    #[test]
    fn dll_overrides_are_additive() {
        let mut store = store_with("abc");
        let shortcut = Scope::Shortcut("abc".into());
        store
            .set(
                &Scope::Prefix,
                OptionKey::DllOverrides,
                Value::List(vec!["d3d9=n,b".into(), "dxgi=n".into()]),
            )
            .unwrap();
        store
            .set(
                &shortcut,
                OptionKey::DllOverrides,
                Value::Text("dxgi=b;winmm=n,b".into()),
            )
            .unwrap();

        let resolver = Resolver::new(&store, Some("abc"));
        assert_eq!(
            resolver.dll_overrides(),
            vec!["winmm=n,b", "d3d9=n,b", "dxgi=n"]
        );

        store
            .set(&shortcut, OptionKey::IgnoreGlobalDlls, Value::Bool(true))
            .unwrap();
        let resolver = Resolver::new(&store, Some("abc"));
        assert_eq!(
            resolver.dll_overrides(),
            vec!["d3d9=n,b", "dxgi=b", "winmm=n,b"]
        );
    }

    #[test]
    fn prefix_only_launch_ignores_shortcut_dlls() {
        let mut store = store_with("abc");
        store
            .set(
                &Scope::Shortcut("abc".into()),
                OptionKey::DllOverrides,
                Value::List(vec!["dxgi=n".into()]),
            )
            .unwrap();
        assert!(Resolver::new(&store, None).dll_overrides().is_empty());
    }
}
