use crate::{
    config::{self, AppConfig},
    env::EnvMap,
    launch::{LaunchOptions, LaunchPlan, Launcher},
    logging::{Logger, LOG_FILE},
    options::{OptionKey, OptionScope},
    prefix::Prefix,
    resolve::{Resolver, SourceScope},
    runner::{available_runners, RunnerInfo},
    settings::{Scope, Value},
    supervisor::RunnerStatus,
};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::{
    sync::{
        atomic::Ordering,
        mpsc::{self, Receiver},
    },
    thread,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

struct GlobalOptions {
    format: OutputFormat,
    quiet: bool,
}

struct CliAction {
    command: CliCommand,
    format: OutputFormat,
    quiet: bool,
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    Run {
        prefix: String,
        shortcut: String,
        options: LaunchFlags,
    },
    Exec {
        prefix: String,
        path: String,
        args: Vec<String>,
        options: LaunchFlags,
    },
    Tool {
        prefix: String,
        tool: String,
        options: LaunchFlags,
    },
    Plan {
        prefix: String,
        shortcut: String,
        options: LaunchFlags,
    },
    Prefixes,
    Runners,
    Shortcuts(String),
    AddPrefix {
        name: String,
        runner: Option<String>,
    },
    AddShortcut {
        prefix: String,
        name: String,
        path: String,
    },
    RemoveShortcut {
        prefix: String,
        shortcut: String,
    },
    Get(SettingTarget),
    Set {
        target: SettingTarget,
        values: Vec<String>,
    },
    Unset(SettingTarget),
    Options,
    Help,
    Version,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LaunchFlags {
    attach: bool,
    log: bool,
}

impl From<LaunchFlags> for LaunchOptions {
    fn from(flags: LaunchFlags) -> Self {
        LaunchOptions {
            prefix_running: flags.attach,
            log: flags.log,
        }
    }
}

#[derive(Debug, PartialEq)]
struct SettingTarget {
    prefix: String,
    shortcut: Option<String>,
    key: OptionKey,
}

/// Runs the command line and returns the process exit code.
pub fn run() -> Result<i32> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = parse_args(&args)?;
    match action.command {
        CliCommand::Help => {
            print_help();
            Ok(0)
        }
        CliCommand::Version => {
            println!("prefixctl v{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        command => {
            let config = AppConfig::load_or_create()?;
            let log_path = config::base_data_dir()?.join(LOG_FILE);
            let logger = Logger::new(Some(log_path), action.quiet);
            run_command(&config, &logger, command, action.format)
        }
    }
}

fn parse_args(args: &[String]) -> Result<CliAction> {
    let (global, tokens) = parse_global_options(args);
    let command = match tokens.first().map(String::as_str) {
        None | Some("help" | "--help" | "-h") => CliCommand::Help,
        Some("version" | "--version" | "-V") => CliCommand::Version,
        Some(_) => parse_subcommand(&tokens)?,
    };
    Ok(CliAction {
        command,
        format: global.format,
        quiet: global.quiet,
    })
}

/// Pulls global flags out of the argument list. Everything after a bare `--`
/// is passed through untouched.
fn parse_global_options(args: &[String]) -> (GlobalOptions, Vec<String>) {
    let mut format = OutputFormat::Text;
    let mut quiet = false;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            tokens.push(arg.to_string());
            tokens.extend(iter.by_ref().cloned());
            break;
        }
        if let Some(value) = arg.strip_prefix("--format=") {
            if let Some(parsed) = OutputFormat::parse(value) {
                format = parsed;
            }
            continue;
        }
        if arg == "--format" {
            if let Some(value) = iter.next() {
                if let Some(parsed) = OutputFormat::parse(value) {
                    format = parsed;
                }
            }
            continue;
        }
        if arg == "--quiet" || arg == "-q" {
            quiet = true;
            continue;
        }
        tokens.push(arg.to_string());
    }

    (GlobalOptions { format, quiet }, tokens)
}

fn parse_subcommand(tokens: &[String]) -> Result<CliCommand> {
    let head = tokens[0].as_str();
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head {
        "run" => {
            let (positional, options, _) = parse_launch_flags(rest)?;
            let [prefix, shortcut] = expect_args::<2>(head, positional, "<prefix> <shortcut>")?;
            CliCommand::Run {
                prefix,
                shortcut,
                options,
            }
        }
        "exec" => {
            let (positional, options, args) = parse_launch_flags(rest)?;
            let [prefix, path] = expect_args::<2>(head, positional, "<prefix> <path>")?;
            CliCommand::Exec {
                prefix,
                path,
                args,
                options,
            }
        }
        "tool" => {
            let (positional, options, _) = parse_launch_flags(rest)?;
            let [prefix, tool] = expect_args::<2>(head, positional, "<prefix> <tool>")?;
            CliCommand::Tool {
                prefix,
                tool,
                options,
            }
        }
        "plan" => {
            let (positional, options, _) = parse_launch_flags(rest)?;
            let [prefix, shortcut] = expect_args::<2>(head, positional, "<prefix> <shortcut>")?;
            CliCommand::Plan {
                prefix,
                shortcut,
                options,
            }
        }
        "prefixes" => CliCommand::Prefixes,
        "runners" => CliCommand::Runners,
        "options" => CliCommand::Options,
        "shortcuts" => {
            let [prefix] = expect_args::<1>(head, rest.to_vec(), "<prefix>")?;
            CliCommand::Shortcuts(prefix)
        }
        "add-prefix" => {
            let mut runner = None;
            let mut positional = Vec::new();
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                if arg == "--runner" {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("--runner requires a value"))?;
                    runner = Some(value.to_string());
                } else if let Some(value) = arg.strip_prefix("--runner=") {
                    runner = Some(value.to_string());
                } else {
                    positional.push(arg.to_string());
                }
            }
            let [name] = expect_args::<1>(head, positional, "<name>")?;
            CliCommand::AddPrefix { name, runner }
        }
        "add-shortcut" => {
            let [prefix, name, path] =
                expect_args::<3>(head, rest.to_vec(), "<prefix> <name> <path>")?;
            CliCommand::AddShortcut { prefix, name, path }
        }
        "remove-shortcut" => {
            let [prefix, shortcut] =
                expect_args::<2>(head, rest.to_vec(), "<prefix> <shortcut>")?;
            CliCommand::RemoveShortcut { prefix, shortcut }
        }
        "get" | "unset" => {
            let (target, extra) = parse_setting_target(head, rest)?;
            if !extra.is_empty() {
                bail!("{head} takes no value");
            }
            if head == "get" {
                CliCommand::Get(target)
            } else {
                CliCommand::Unset(target)
            }
        }
        "set" => {
            let (target, values) = parse_setting_target(head, rest)?;
            if values.is_empty() {
                bail!("set requires a value for {}", target.key);
            }
            CliCommand::Set { target, values }
        }
        _ => bail!("Unknown command: {head} (see 'prefixctl help')"),
    };
    Ok(command)
}

/// Splits launch flags from positionals; arguments after `--` are returned
/// separately.
fn parse_launch_flags(args: &[String]) -> Result<(Vec<String>, LaunchFlags, Vec<String>)> {
    let mut flags = LaunchFlags::default();
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--" => {
                let passthrough = iter.cloned().collect();
                return Ok((positional, flags, passthrough));
            }
            "--attach" => flags.attach = true,
            "--log" => flags.log = true,
            value if value.starts_with("--") => bail!("Unknown flag: {value}"),
            value => positional.push(value.to_string()),
        }
    }
    Ok((positional, flags, Vec::new()))
}

fn parse_setting_target(head: &str, args: &[String]) -> Result<(SettingTarget, Vec<String>)> {
    let mut shortcut = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--shortcut" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--shortcut requires a value"))?;
            shortcut = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("--shortcut=") {
            shortcut = Some(value.to_string());
        } else {
            positional.push(arg.to_string());
        }
    }
    if positional.len() < 2 {
        bail!("Usage: prefixctl {head} <prefix> [--shortcut <hash>] <Key>");
    }
    let values = positional.split_off(2);
    let key: OptionKey = positional[1].parse()?;
    let target = SettingTarget {
        prefix: positional[0].clone(),
        shortcut,
        key,
    };
    Ok((target, values))
}

fn expect_args<const N: usize>(head: &str, args: Vec<String>, usage: &str) -> Result<[String; N]> {
    args.try_into()
        .map_err(|_| anyhow!("Usage: prefixctl {head} {usage}"))
}

fn run_command(
    config: &AppConfig,
    logger: &Logger,
    command: CliCommand,
    format: OutputFormat,
) -> Result<i32> {
    match command {
        CliCommand::Run {
            prefix,
            shortcut,
            options,
        } => {
            let prefix = Prefix::open(config, &prefix)?;
            supervised_launch(config, logger, format, |launcher| {
                launcher.start_shortcut(&prefix, &shortcut, options.into())
            })
        }
        CliCommand::Exec {
            prefix,
            path,
            args,
            options,
        } => {
            let prefix = Prefix::open(config, &prefix)?;
            supervised_launch(config, logger, format, |launcher| {
                launcher.start_onetime(&prefix, &path, &args, options.into())
            })
        }
        CliCommand::Tool {
            prefix,
            tool,
            options,
        } => {
            let prefix = Prefix::open(config, &prefix)?;
            supervised_launch(config, logger, format, |launcher| {
                launcher.start_utility(&prefix, &tool, options.into())
            })
        }
        CliCommand::Plan {
            prefix,
            shortcut,
            options,
        } => {
            let prefix = Prefix::open(config, &prefix)?;
            let launcher = Launcher::new(config.clone(), logger.clone());
            let plan = launcher.plan_shortcut(&prefix, &shortcut, options.into())?;
            print_plan(&plan, format)?;
            Ok(0)
        }
        CliCommand::Prefixes => {
            print_names(&config.prefixes(), format)?;
            Ok(0)
        }
        CliCommand::Runners => {
            list_runners(config, format)?;
            Ok(0)
        }
        CliCommand::Shortcuts(prefix) => {
            list_shortcuts(&Prefix::open(config, &prefix)?, format)?;
            Ok(0)
        }
        CliCommand::AddPrefix { name, runner } => {
            let runner = runner.unwrap_or_else(|| config.default_runner.clone());
            let prefix = Prefix::create(config, &name, &runner)?;
            logger.info(format!("Created prefix {} at {}", prefix.name, prefix.dir.display()));
            Ok(0)
        }
        CliCommand::AddShortcut { prefix, name, path } => {
            let mut prefix = Prefix::open(config, &prefix)?;
            if prefix.settings.find_shortcut(&name).is_some() {
                bail!("Shortcut {name} already exists in {}", prefix.name);
            }
            let hash = prefix.settings.add_shortcut(&name, &path)?;
            prefix.save()?;
            println!("{hash}");
            Ok(0)
        }
        CliCommand::RemoveShortcut { prefix, shortcut } => {
            let mut prefix = Prefix::open(config, &prefix)?;
            let hash = shortcut_hash(&prefix, &shortcut)?;
            prefix.settings.remove_shortcut(&hash);
            prefix.save()?;
            logger.info(format!("Removed shortcut {shortcut} from {}", prefix.name));
            Ok(0)
        }
        CliCommand::Get(target) => {
            let prefix = Prefix::open(config, &target.prefix)?;
            show_setting(&prefix, &target, format)?;
            Ok(0)
        }
        CliCommand::Set { target, values } => {
            let mut prefix = Prefix::open(config, &target.prefix)?;
            let scope = setting_scope(&prefix, &target)?;
            let value = Value::parse_for(target.key.kind(), &values)?;
            prefix.settings.set(&scope, target.key, value)?;
            prefix.save()?;
            warn_if_unsupported(config, &prefix, target.key, logger);
            Ok(0)
        }
        CliCommand::Unset(target) => {
            let mut prefix = Prefix::open(config, &target.prefix)?;
            let scope = setting_scope(&prefix, &target)?;
            if prefix.settings.unset(&scope, target.key) {
                prefix.save()?;
            } else {
                logger.warn(format!("{} was not set", target.key));
            }
            Ok(0)
        }
        CliCommand::Options => {
            list_options(format)?;
            Ok(0)
        }
        CliCommand::Help | CliCommand::Version => Ok(0),
    }
}

/// Runs one launch with Ctrl-C/SIGTERM wired to the launcher's halt flag, so
/// an interrupted launch still shuts the prefix down.
fn supervised_launch<F>(
    config: &AppConfig,
    logger: &Logger,
    format: OutputFormat,
    start: F,
) -> Result<i32>
where
    F: FnOnce(&Launcher) -> i32,
{
    let (status_tx, status_rx) = mpsc::channel();
    let launcher = Launcher::new(config.clone(), logger.clone())
        .with_status(status_tx)
        .with_echo(!logger.is_quiet());

    let halt = launcher.halt_handle();
    let signal_logger = logger.clone();
    ctrlc::set_handler(move || {
        if !halt.swap(true, Ordering::SeqCst) {
            signal_logger.warn("Interrupted, stopping the prefix");
        }
    })
    .context("install signal handler")?;

    let reporter = {
        let logger = logger.clone();
        thread::spawn(move || report_status(status_rx, format, &logger))
    };
    let code = start(&launcher);
    drop(launcher);
    let _ = reporter.join();
    Ok(code)
}

/// Relays runner status events until the launch drops its sender.
fn report_status(events: Receiver<RunnerStatus>, format: OutputFormat, logger: &Logger) {
    for status in events {
        match format {
            OutputFormat::Json => match serde_json::to_string(&StatusEvent { status }) {
                Ok(line) => println!("{line}"),
                Err(err) => logger.warn(format!("Failed to encode status: {err}")),
            },
            OutputFormat::Text => logger.info(format!("Runner status: {}", status.label())),
        }
    }
}

#[derive(Serialize)]
struct StatusEvent {
    status: RunnerStatus,
}

fn shortcut_hash(prefix: &Prefix, query: &str) -> Result<String> {
    prefix
        .settings
        .find_shortcut(query)
        .ok_or_else(|| anyhow!("Unknown shortcut: {query}"))
}

fn setting_scope(prefix: &Prefix, target: &SettingTarget) -> Result<Scope> {
    match &target.shortcut {
        Some(query) => Ok(Scope::Shortcut(shortcut_hash(prefix, query)?)),
        None => Ok(Scope::Prefix),
    }
}

fn warn_if_unsupported(config: &AppConfig, prefix: &Prefix, key: OptionKey, logger: &Logger) {
    let runner = Resolver::new(&prefix.settings, None)
        .text(OptionKey::CurrentRunner)
        .unwrap_or_else(|| config.default_runner.clone());
    let info = RunnerInfo::classify(&runner);
    if !info.supports(key) {
        logger.warn(format!(
            "{key} is not supported by runner {runner:?} ({}); it will have no effect",
            info.label()
        ));
    }
}

#[derive(Serialize)]
struct SettingItem {
    key: &'static str,
    value: Option<Value>,
    source: &'static str,
    has_override: bool,
}

fn show_setting(prefix: &Prefix, target: &SettingTarget, format: OutputFormat) -> Result<()> {
    let hash = match &target.shortcut {
        Some(query) => Some(shortcut_hash(prefix, query)?),
        None => None,
    };
    let resolved = Resolver::new(&prefix.settings, hash.as_deref()).resolve(target.key);
    let item = SettingItem {
        key: target.key.key(),
        source: source_label(resolved.source),
        has_override: resolved.has_override,
        value: resolved.value,
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
        OutputFormat::Text => match &item.value {
            Some(value) => println!("{} = {} ({})", item.key, value.as_text(), item.source),
            None => println!("{} is unset", item.key),
        },
    }
    Ok(())
}

fn source_label(source: SourceScope) -> &'static str {
    match source {
        SourceScope::Shortcut => "shortcut",
        SourceScope::Prefix => "prefix",
        SourceScope::None => "none",
    }
}

fn print_names(names: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(names)?),
        OutputFormat::Text => {
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RunnerItem {
    name: String,
    kind: String,
    custom: bool,
    wayland: bool,
    ntsync: bool,
    options: Vec<&'static str>,
}

fn list_runners(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let items: Vec<RunnerItem> = available_runners(&config.runners_root)
        .into_iter()
        .map(|name| {
            let info = RunnerInfo::classify(&name);
            RunnerItem {
                kind: info.label(),
                custom: info.is_custom(),
                wayland: info.is_proton10_or_later(),
                ntsync: info.supports_ntsync(),
                options: info.valid_options().into_iter().map(OptionKey::key).collect(),
                name,
            }
        })
        .collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No runners in {}", config.runners_root.display());
            }
            for item in items {
                let mut features = Vec::new();
                if item.wayland {
                    features.push("wayland");
                }
                if item.ntsync {
                    features.push("ntsync");
                }
                println!("{:<32} {:<12} {}", item.name, item.kind, features.join(","));
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ShortcutItem {
    hash: String,
    name: String,
    path: String,
}

fn list_shortcuts(prefix: &Prefix, format: OutputFormat) -> Result<()> {
    let items: Vec<ShortcutItem> = prefix
        .settings
        .shortcuts()
        .into_iter()
        .map(|shortcut| ShortcutItem {
            hash: shortcut.hash,
            name: shortcut.name,
            path: shortcut.path,
        })
        .collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            for item in items {
                println!("{}  {:<24} {}", item.hash, item.name, item.path);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct OptionItem {
    key: &'static str,
    kind: &'static str,
    scope: &'static str,
}

fn list_options(format: OutputFormat) -> Result<()> {
    let items: Vec<OptionItem> = OptionKey::ALL
        .iter()
        .map(|key| OptionItem {
            key: key.key(),
            kind: key.kind().label(),
            scope: match key.scope() {
                OptionScope::Any => "any",
                OptionScope::PrefixOnly => "prefix",
                OptionScope::ShortcutOnly => "shortcut",
            },
        })
        .collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            for item in items {
                println!("{:<30} {:<5} {}", item.key, item.kind, item.scope);
            }
        }
    }
    Ok(())
}

fn print_plan(plan: &LaunchPlan, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }
    println!("Prefix:  {}", plan.prefix);
    match &plan.runner_replaced {
        Some(missing) => println!("Runner:  {} (replaces missing {missing})", plan.runner),
        None => println!("Runner:  {}", plan.runner),
    }
    println!("Workdir: {}", plan.process.cwd.display());
    println!("Command: {}", plan.process.command_line());
    if let Some(path) = &plan.log_path {
        println!("Log:     {}", path.display());
    }
    if let Some(script) = &plan.pre_run {
        println!("Pre-run: {script}");
    }
    if let Some(script) = &plan.post_run {
        println!("Post-run: {script}");
    }
    println!("Environment (changed from current):");
    let ambient = EnvMap::from_ambient();
    for (key, value) in plan.process.env.iter() {
        if ambient.get(key) != Some(value) {
            println!("  {key}={value}");
        }
    }
    Ok(())
}

fn print_help() {
    println!("prefixctl v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  prefixctl run <prefix> <shortcut>         Launch a shortcut");
    println!("  prefixctl exec <prefix> <path> [-- args]  Launch an executable once");
    println!("  prefixctl tool <prefix> <tool>            Run winecfg, regedit, ... in a prefix");
    println!("  prefixctl plan <prefix> <shortcut>        Show the launch without running it");
    println!("  prefixctl prefixes                        List prefixes");
    println!("  prefixctl runners                         List installed runners");
    println!("  prefixctl shortcuts <prefix>              List shortcuts");
    println!("  prefixctl add-prefix <name> [--runner R]  Create a prefix");
    println!("  prefixctl add-shortcut <prefix> <name> <path>");
    println!("  prefixctl remove-shortcut <prefix> <shortcut>");
    println!("  prefixctl get <prefix> [--shortcut S] <Key>");
    println!("  prefixctl set <prefix> [--shortcut S] <Key> <value...>");
    println!("  prefixctl unset <prefix> [--shortcut S] <Key>");
    println!("  prefixctl options                         List option keys");
    println!();
    println!("Launch options:");
    println!("  --attach                         Prefix is already running");
    println!("  --log                            Write a launch log under <prefix>/.logs");
    println!();
    println!("Global options:");
    println!("  --format <json|text>             Output format for lists and launch status");
    println!("  -q, --quiet                      Only write diagnostics to the log file");
    println!("  -h, --help                       Show help");
    println!("  -V, --version                    Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliAction> {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        parse_args(&args)
    }

    #[test]
    fn empty_and_help() {
        assert_eq!(parse(&[]).unwrap().command, CliCommand::Help);
        assert_eq!(parse(&["-h"]).unwrap().command, CliCommand::Help);
        assert_eq!(parse(&["--version"]).unwrap().command, CliCommand::Version);
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn run_with_flags_anywhere() {
        let action = parse(&["--format", "json", "run", "steam", "--log", "Elden Ring", "-q"]).unwrap();
        assert_eq!(action.format, OutputFormat::Json);
        assert!(action.quiet);
        assert_eq!(
            action.command,
            CliCommand::Run {
                prefix: "steam".into(),
                shortcut: "Elden Ring".into(),
                options: LaunchFlags {
                    attach: false,
                    log: true
                },
            }
        );
        assert!(parse(&["run", "steam"]).is_err());
        assert!(parse(&["run", "steam", "game", "--bogus"]).is_err());
    }

    #[test]
    fn exec_passes_arguments_through() {
        let action = parse(&["exec", "steam", "/games/setup.exe", "--attach", "--", "--quiet", "/S"]).unwrap();
        assert!(!action.quiet);
        assert_eq!(
            action.command,
            CliCommand::Exec {
                prefix: "steam".into(),
                path: "/games/setup.exe".into(),
                args: vec!["--quiet".into(), "/S".into()],
                options: LaunchFlags {
                    attach: true,
                    log: false
                },
            }
        );
    }

    #[test]
    fn setting_commands() {
        let action = parse(&["set", "steam", "--shortcut", "abc", "DLLoverrides", "dxgi=n", "d3d9=n"]).unwrap();
        assert_eq!(
            action.command,
            CliCommand::Set {
                target: SettingTarget {
                    prefix: "steam".into(),
                    shortcut: Some("abc".into()),
                    key: OptionKey::DllOverrides,
                },
                values: vec!["dxgi=n".into(), "d3d9=n".into()],
            }
        );
        assert_eq!(
            parse(&["get", "steam", "ScalingMode"]).unwrap().command,
            CliCommand::Get(SettingTarget {
                prefix: "steam".into(),
                shortcut: None,
                key: OptionKey::ScalingMode,
            })
        );
        assert!(parse(&["set", "steam", "ScalingMode"]).is_err());
        assert!(parse(&["get", "steam", "NotAKey"]).is_err());
        assert!(parse(&["unset", "steam", "Gamemode", "extra"]).is_err());
    }

    #[test]
    fn status_events_reach_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        let logger = Logger::new(Some(path.clone()), true);
        let (tx, rx) = mpsc::channel();
        tx.send(RunnerStatus::Starting).unwrap();
        tx.send(RunnerStatus::Stopping).unwrap();
        drop(tx);

        report_status(rx, OutputFormat::Text, &logger);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[INFO] Runner status: launcher starting"));
        assert!(contents.contains("[INFO] Runner status: stopping"));
    }

    #[test]
    fn add_prefix_runner_flag() {
        assert_eq!(
            parse(&["add-prefix", "--runner=GE-Proton10-9", "steam"]).unwrap().command,
            CliCommand::AddPrefix {
                name: "steam".into(),
                runner: Some("GE-Proton10-9".into()),
            }
        );
    }
}
