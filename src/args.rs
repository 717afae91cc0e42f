use crate::{
    env::{EnvMap, ENV_MANGOHUD},
    error::LaunchError,
    options::OptionKey,
    policy::{GamescopeFilter, GamescopeScaler, ScalingMode},
    resolve::Resolver,
    settings::Value,
};
use std::path::{Path, PathBuf};

pub const GAMEMODE: &str = "gamemoderun";
pub const GAMESCOPE: &str = "gamescope";
pub const MANGOHUD: &str = "mangohud";
pub const MANGOAPP_FLAG: &str = "--mangoapp";
pub const GAMESCOPE_END: &str = "--";
const ADAPTIVE_SYNC_FLAG: &str = "--adaptive-sync";
const ZINK_WRAPPER: [&str; 3] = [
    "env",
    "MESA_LOADER_DRIVER_OVERRIDE=zink",
    "__GLX_VENDOR_LIBRARY_NAME=mesa",
];

const DRIVE_C: &str = "drive_c";

/// Splits a user-typed argument string. Spaces separate tokens except inside
/// double quotes; a quote opens or closes a quoted token and is dropped. An
/// unterminated quote keeps what was collected.
pub fn tokenize_args(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in input.chars() {
        match (quoted, ch) {
            (false, '"') => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = true;
            }
            (false, ' ') => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            (true, '"') => {
                tokens.push(std::mem::take(&mut current));
                quoted = false;
            }
            (_, ch) => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Extra arguments stored on a shortcut: real lists are used verbatim,
/// strings go through [`tokenize_args`].
pub fn stored_arguments(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::List(items)) => items.clone(),
        Some(Value::Text(text)) => tokenize_args(text),
        Some(other) => tokenize_args(&other.as_text()),
    }
}

/// Full command line for the launcher, wrappers included. The first element
/// is the program to execute.
pub fn assemble_arguments(
    launcher: &str,
    target: &str,
    extra: &[String],
    resolver: &Resolver,
    env: &EnvMap,
) -> Vec<String> {
    let mut args = vec![launcher.to_string(), target.to_string()];
    args.extend(extra.iter().cloned());

    if resolver.flag(OptionKey::Gamemode) {
        args.insert(0, GAMEMODE.to_string());
    }

    let scaling = ScalingMode::from_index(resolver.int(OptionKey::ScalingMode));
    if scaling.is_gamescope() {
        let mut wrapped = gamescope_group(scaling, resolver);
        wrapped.append(&mut args);
        args = wrapped;
    }

    if resolver.flag(OptionKey::Mangohud) {
        if let Some(position) = args.iter().position(|arg| arg == GAMESCOPE) {
            args.insert(position + 1, MANGOAPP_FLAG.to_string());
        } else if !env.contains(ENV_MANGOHUD) {
            args.insert(0, MANGOHUD.to_string());
        }
    }

    if resolver.flag(OptionKey::UseZink) {
        let mut wrapped: Vec<String> = ZINK_WRAPPER.iter().map(|arg| arg.to_string()).collect();
        wrapped.append(&mut args);
        args = wrapped;
    }

    args
}

/// Gamescope's own flags, always closed by a bare `--`.
pub fn gamescope_group(mode: ScalingMode, resolver: &Resolver) -> Vec<String> {
    let mut group = vec![GAMESCOPE.to_string()];
    let sized = |flag: &str, key: OptionKey, group: &mut Vec<String>| {
        let value = resolver.int(key);
        if value != 0 {
            group.push(flag.to_string());
            group.push(value.to_string());
        }
    };

    sized("-w", OptionKey::GamescopeOutResW, &mut group);
    sized("-h", OptionKey::GamescopeOutResH, &mut group);
    if mode != ScalingMode::GamescopeFullscreen {
        sized("-W", OptionKey::GamescopeWinResW, &mut group);
        sized("-H", OptionKey::GamescopeWinResH, &mut group);
    }

    if let Some(scaler) = GamescopeScaler::from_index(resolver.int(OptionKey::GamescopeScaler)).token() {
        group.push("-S".to_string());
        group.push(scaler.to_string());
    }
    if let Some(filter) = GamescopeFilter::from_index(resolver.int(OptionKey::GamescopeFilter)).token() {
        group.push("-F".to_string());
        group.push(filter.to_string());
    }

    let fps = resolver.int(OptionKey::LimitFps);
    if fps != 0 {
        group.push("-r".to_string());
        group.push(fps.to_string());
        group.push("-o".to_string());
        group.push(fps.to_string());
    }

    match mode {
        ScalingMode::GamescopeFullscreen => group.push("-f".to_string()),
        ScalingMode::GamescopeBorderless => group.push("-b".to_string()),
        _ => {}
    }
    group.push(ADAPTIVE_SYNC_FLAG.to_string());
    group.push(GAMESCOPE_END.to_string());
    group
}

/// Maps a `C:` path onto the prefix's `drive_c`; other paths are host paths.
pub fn host_path(target: &str, prefix_dir: &Path) -> PathBuf {
    let normalized = target.replace('\\', "/");
    let drive = normalized
        .get(..2)
        .filter(|head| head.eq_ignore_ascii_case("C:"));
    match drive {
        Some(_) => {
            let rest = normalized[2..].trim_start_matches('/');
            prefix_dir.join(DRIVE_C).join(rest)
        }
        None => PathBuf::from(normalized),
    }
}

pub fn is_drive_c_path(target: &str) -> bool {
    target
        .get(..2)
        .is_some_and(|head| head.eq_ignore_ascii_case("C:"))
}

/// Directory the launched program starts in. Targets that are neither on
/// disk nor written as a `C:` path are rejected before anything runs.
pub fn working_directory(target: &str, prefix_dir: &Path) -> Result<PathBuf, LaunchError> {
    let host = host_path(target, prefix_dir);
    if !host.exists() && !is_drive_c_path(target) {
        return Err(LaunchError::InvalidTarget(target.to_string()));
    }
    let parent = host.parent().filter(|parent| parent.is_dir());
    let dir = match parent {
        Some(parent) => parent.to_path_buf(),
        None => {
            let drive_c = prefix_dir.join(DRIVE_C);
            if drive_c.is_dir() {
                drive_c
            } else {
                prefix_dir.to_path_buf()
            }
        }
    };
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Scope, SettingsStore};
    use std::fs;

    fn resolve_with(entries: &[(OptionKey, Value)]) -> SettingsStore {
        let mut store = SettingsStore::default();
        for (key, value) in entries {
            store.set(&Scope::Prefix, *key, value.clone()).unwrap();
        }
        store
    }

    fn assemble(store: &SettingsStore, env: &EnvMap) -> Vec<String> {
        assemble_arguments(
            "umu-run",
            "C:/Games/game.exe",
            &["-windowed".to_string()],
            &Resolver::new(store, None),
            env,
        )
    }

    #[test]
    fn tokenizer_respects_quotes() {
        assert_eq!(tokenize_args(r#"foo "bar baz" qux"#), vec!["foo", "bar baz", "qux"]);
        assert_eq!(tokenize_args(r#"foo "bar baz"#), vec!["foo", "bar baz"]);
        assert_eq!(tokenize_args("  -a   -b "), vec!["-a", "-b"]);
        assert_eq!(tokenize_args(r#"-x"y z"w"#), vec!["-x", "y z", "w"]);
        assert!(tokenize_args("").is_empty());
    }

    #[test]
    fn stored_lists_are_not_retokenized() {
        let list = Value::List(vec!["a b".into(), "c".into()]);
        assert_eq!(stored_arguments(Some(&list)), vec!["a b", "c"]);
        let text = Value::Text(r#"-skip "my save""#.into());
        assert_eq!(stored_arguments(Some(&text)), vec!["-skip", "my save"]);
    }

    #[test]
    fn plain_launch() {
        let store = SettingsStore::default();
        assert_eq!(
            assemble(&store, &EnvMap::new()),
            vec!["umu-run", "C:/Games/game.exe", "-windowed"]
        );
    }

    #[test]
    fn gamemode_goes_first() {
        let store = resolve_with(&[(OptionKey::Gamemode, Value::Bool(true))]);
        let args = assemble(&store, &EnvMap::new());
        assert_eq!(args[0], GAMEMODE);
        assert_eq!(args[1], "umu-run");
    }

    #[test]
    fn gamescope_fullscreen_group() {
        let store = resolve_with(&[
            (OptionKey::ScalingMode, Value::Int(9)),
            (OptionKey::GamescopeOutResW, Value::Int(2560)),
            (OptionKey::GamescopeOutResH, Value::Int(1440)),
            (OptionKey::GamescopeWinResW, Value::Int(1280)),
            (OptionKey::GamescopeFilter, Value::Int(2)),
            (OptionKey::LimitFps, Value::Int(60)),
            (OptionKey::Gamemode, Value::Bool(true)),
        ]);
        let args = assemble(&store, &EnvMap::new());
        assert_eq!(
            args,
            vec![
                "gamescope", "-w", "2560", "-h", "1440", "-F", "fsr", "-r", "60", "-o", "60",
                "-f", "--adaptive-sync", "--", "gamemoderun", "umu-run", "C:/Games/game.exe",
                "-windowed",
            ]
        );
    }

    #[test]
    fn gamescope_borderless_shares_windowed_flags() {
        let store = resolve_with(&[
            (OptionKey::ScalingMode, Value::Int(10)),
            (OptionKey::GamescopeWinResW, Value::Int(1280)),
            (OptionKey::GamescopeWinResH, Value::Int(720)),
            (OptionKey::GamescopeScaler, Value::Int(2)),
        ]);
        let args = assemble(&store, &EnvMap::new());
        assert_eq!(
            args,
            vec![
                "gamescope", "-W", "1280", "-H", "720", "-S", "integer", "-b", "--adaptive-sync",
                "--", "umu-run", "C:/Games/game.exe", "-windowed",
            ]
        );

        let windowed = resolve_with(&[(OptionKey::ScalingMode, Value::Int(11))]);
        let args = assemble(&windowed, &EnvMap::new());
        assert_eq!(args[..3], ["gamescope", "--adaptive-sync", "--"]);
    }

    #[test]
    fn separator_precedes_target() {
        let store = resolve_with(&[(OptionKey::ScalingMode, Value::Int(11))]);
        let args = assemble(&store, &EnvMap::new());
        let separator = args.iter().position(|arg| arg == GAMESCOPE_END).unwrap();
        let target = args.iter().position(|arg| arg == "C:/Games/game.exe").unwrap();
        assert!(separator < target);
    }

    #[test]
    fn fsr_tiers_leave_arguments_alone() {
        let store = resolve_with(&[(OptionKey::ScalingMode, Value::Int(1))]);
        assert_eq!(
            assemble(&store, &EnvMap::new()),
            vec!["umu-run", "C:/Games/game.exe", "-windowed"]
        );
    }

    #[test]
    fn mangohud_wrapping() {
        let store = resolve_with(&[(OptionKey::Mangohud, Value::Bool(true))]);
        let args = assemble(&store, &EnvMap::new());
        assert_eq!(args[0], MANGOHUD);

        let ambient: EnvMap = [(ENV_MANGOHUD.to_string(), "1".to_string())]
            .into_iter()
            .collect();
        let args = assemble(&store, &ambient);
        assert_eq!(args[0], "umu-run");

        let store = resolve_with(&[
            (OptionKey::Mangohud, Value::Bool(true)),
            (OptionKey::ScalingMode, Value::Int(9)),
        ]);
        let args = assemble(&store, &EnvMap::new());
        assert_eq!(args[..2], [GAMESCOPE, MANGOAPP_FLAG]);
        assert!(!args.iter().any(|arg| arg == MANGOHUD));
    }

    #[test]
    fn zink_wraps_everything() {
        let store = resolve_with(&[
            (OptionKey::UseZink, Value::Bool(true)),
            (OptionKey::Gamemode, Value::Bool(true)),
        ]);
        let args = assemble(&store, &EnvMap::new());
        assert_eq!(args[..4], ["env", "MESA_LOADER_DRIVER_OVERRIDE=zink", "__GLX_VENDOR_LIBRARY_NAME=mesa", GAMEMODE]);
    }

    #[test]
    fn drive_c_paths_map_into_prefix() {
        let prefix = Path::new("/prefixes/main");
        assert_eq!(
            host_path("C:/Games/game.exe", prefix),
            PathBuf::from("/prefixes/main/drive_c/Games/game.exe")
        );
        assert_eq!(
            host_path(r"C:\Games\game.exe", prefix),
            PathBuf::from("/prefixes/main/drive_c/Games/game.exe")
        );
        assert_eq!(host_path("/opt/game.exe", prefix), PathBuf::from("/opt/game.exe"));
    }

    #[test]
    fn working_directory_rules() {
        let prefix = tempfile::tempdir().unwrap();
        let games = prefix.path().join("drive_c/Games");
        fs::create_dir_all(&games).unwrap();
        fs::write(games.join("game.exe"), b"MZ").unwrap();

        assert_eq!(
            working_directory("C:/Games/game.exe", prefix.path()).unwrap(),
            games
        );
        assert!(matches!(
            working_directory("D:/nope.exe", prefix.path()),
            Err(LaunchError::InvalidTarget(_))
        ));
        assert_eq!(
            working_directory("C:/Missing/game.exe", prefix.path()).unwrap(),
            prefix.path().join("drive_c")
        );
    }
}
