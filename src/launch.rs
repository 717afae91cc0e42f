use crate::{
    args::{assemble_arguments, stored_arguments, working_directory},
    config::AppConfig,
    env::{build_environment, EnvInputs, EnvMap, ENV_NO_PROTON, ENV_RUNTIME_UPDATE},
    error::LaunchError,
    logging::Logger,
    options::OptionKey,
    prefix::Prefix,
    resolve::{Resolver, ScopeMode},
    runner::{select_runner, RunnerSelection},
    settings::Scope,
    supervisor::{LaunchLog, ProcessSpec, RunnerStatus, Supervisor},
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, mpsc::Sender, Arc},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOptions {
    /// The prefix's wineserver is already running.
    pub prefix_running: bool,
    /// Write a launch log even when debug output is off.
    pub log: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchKind {
    Shortcut,
    OneTime,
    Utility,
}

/// Everything needed to start one launch, computed without side effects on
/// the child side.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    pub kind: LaunchKind,
    pub prefix: String,
    pub target: String,
    pub runner: String,
    pub runner_replaced: Option<String>,
    pub process: ProcessSpec,
    pub stop: ProcessSpec,
    pub log_path: Option<PathBuf>,
    pub pre_run: Option<String>,
    pub post_run: Option<String>,
}

struct PlanInput<'a> {
    kind: LaunchKind,
    prefix: &'a Prefix,
    resolver: Resolver<'a>,
    launcher: PathBuf,
    target: String,
    extra: Vec<String>,
    cwd: PathBuf,
    log_name: String,
    wrapped: bool,
}

pub struct Launcher {
    config: AppConfig,
    logger: Logger,
    ambient: EnvMap,
    halt: Arc<AtomicBool>,
    status: Option<Sender<RunnerStatus>>,
    echo: bool,
}

impl Launcher {
    pub fn new(config: AppConfig, logger: Logger) -> Self {
        Self {
            config,
            logger,
            ambient: EnvMap::from_ambient(),
            halt: Arc::new(AtomicBool::new(false)),
            status: None,
            echo: true,
        }
    }

    #[cfg(test)]
    pub fn with_ambient(mut self, ambient: EnvMap) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_status(mut self, status: Sender<RunnerStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Setting the returned flag asks a running launch to shut down.
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt)
    }

    pub fn start_shortcut(&self, prefix: &Prefix, shortcut: &str, options: LaunchOptions) -> i32 {
        let result = self
            .plan_shortcut(prefix, shortcut, options)
            .and_then(|plan| self.execute(&plan));
        self.exit_code(result)
    }

    pub fn start_onetime(
        &self,
        prefix: &Prefix,
        path: &str,
        args: &[String],
        options: LaunchOptions,
    ) -> i32 {
        let result = self
            .plan_onetime(prefix, path, args, options)
            .and_then(|plan| self.execute(&plan));
        self.exit_code(result)
    }

    pub fn start_utility(&self, prefix: &Prefix, tool: &str, options: LaunchOptions) -> i32 {
        let result = self
            .plan_utility(prefix, tool, options)
            .and_then(|plan| self.execute(&plan));
        self.exit_code(result)
    }

    pub fn plan_shortcut(
        &self,
        prefix: &Prefix,
        shortcut: &str,
        options: LaunchOptions,
    ) -> Result<LaunchPlan, LaunchError> {
        let launcher = self.launcher()?;
        let hash = prefix
            .settings
            .find_shortcut(shortcut)
            .ok_or_else(|| LaunchError::UnknownShortcut(shortcut.to_string()))?;
        let resolver = Resolver::new(&prefix.settings, Some(&hash));
        let name = resolver
            .text(OptionKey::Name)
            .unwrap_or_else(|| hash.clone());
        let target = resolver
            .text(OptionKey::Path)
            .ok_or_else(|| LaunchError::MissingPath(name.clone()))?;
        let cwd = working_directory(&target, &prefix.dir)?;
        let extra = stored_arguments(
            prefix
                .settings
                .value(&Scope::Shortcut(hash.clone()), OptionKey::Args),
        );

        self.plan(
            PlanInput {
                kind: LaunchKind::Shortcut,
                prefix,
                resolver,
                launcher,
                log_name: log_file_name(&format!("{name}-{hash}")),
                target,
                extra,
                cwd,
                wrapped: true,
            },
            options,
        )
    }

    pub fn plan_onetime(
        &self,
        prefix: &Prefix,
        path: &str,
        args: &[String],
        options: LaunchOptions,
    ) -> Result<LaunchPlan, LaunchError> {
        let launcher = self.launcher()?;
        let cwd = working_directory(path, &prefix.dir)?;
        let stem = Path::new(&path.replace('\\', "/"))
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onetime".to_string());

        self.plan(
            PlanInput {
                kind: LaunchKind::OneTime,
                prefix,
                resolver: Resolver::new(&prefix.settings, None),
                launcher,
                target: path.to_string(),
                extra: args.to_vec(),
                cwd,
                log_name: log_file_name(&stem),
                wrapped: true,
            },
            options,
        )
    }

    /// Wine built-ins such as `winecfg` run bare, without display wrappers.
    pub fn plan_utility(
        &self,
        prefix: &Prefix,
        tool: &str,
        options: LaunchOptions,
    ) -> Result<LaunchPlan, LaunchError> {
        let launcher = self.launcher()?;
        self.plan(
            PlanInput {
                kind: LaunchKind::Utility,
                prefix,
                resolver: Resolver::new(&prefix.settings, None),
                launcher,
                target: tool.to_string(),
                extra: Vec::new(),
                cwd: prefix.dir.clone(),
                log_name: log_file_name(tool),
                wrapped: false,
            },
            options,
        )
    }

    /// Opens the launch log, then runs hooks and the launcher in order.
    pub fn execute(&self, plan: &LaunchPlan) -> Result<i32, LaunchError> {
        let log = match &plan.log_path {
            Some(path) => Some(LaunchLog::create(path, &plan.process)?),
            None => None,
        };
        let mut supervisor = Supervisor::new(self.logger.clone(), self.halt_handle())
            .with_status(self.status.clone())
            .with_log(log)
            .with_echo(self.echo);

        self.logger.info(format!(
            "Launching {} in prefix {} with {}",
            plan.target, plan.prefix, plan.runner
        ));
        if let Some(script) = &plan.pre_run {
            supervisor.run_hook(script, &plan.process.env, &plan.process.cwd);
        }
        let code = supervisor.supervise(&plan.process, Some(&plan.stop))?;
        if let Some(script) = &plan.post_run {
            supervisor.run_hook(script, &plan.process.env, &plan.process.cwd);
        }
        if let Some(path) = supervisor.finish() {
            self.logger
                .info(format!("Launch log written to {}", path.display()));
        }
        Ok(code)
    }

    fn plan(&self, input: PlanInput, options: LaunchOptions) -> Result<LaunchPlan, LaunchError> {
        let PlanInput {
            kind,
            prefix,
            resolver,
            launcher,
            target,
            extra,
            cwd,
            log_name,
            wrapped,
        } = input;

        let runner = self.runner_for(&resolver);
        let shader_cache = self.shader_cache(prefix);
        let inputs = EnvInputs {
            prefix_dir: &prefix.dir,
            runner: &runner,
            prefix_running: options.prefix_running,
            shader_cache: shader_cache.as_deref(),
        };
        let environment = build_environment(&inputs, &resolver, self.ambient.clone());

        let launcher_arg = launcher.to_string_lossy().into_owned();
        let argv = if wrapped {
            assemble_arguments(&launcher_arg, &target, &extra, &resolver, &environment.vars)
        } else {
            vec![launcher_arg, target.clone()]
        };
        let stop = stop_command(&launcher, &runner, &environment.vars, &cwd);
        let process = ProcessSpec::from_argv(&argv, environment.vars, cwd)?;
        let log_path = (options.log || environment.debug_logging)
            .then(|| prefix.logs_dir().join(log_name));

        Ok(LaunchPlan {
            kind,
            prefix: prefix.name.clone(),
            target,
            runner: runner.name,
            runner_replaced: runner.replaced,
            process,
            stop,
            log_path,
            pre_run: resolver.text(OptionKey::PreRunScript),
            post_run: resolver.text(OptionKey::PostRunScript),
        })
    }

    fn launcher(&self) -> Result<PathBuf, LaunchError> {
        self.config
            .launcher_path()
            .ok_or(LaunchError::MissingLauncher)
    }

    fn runner_for(&self, resolver: &Resolver) -> RunnerSelection {
        let configured = resolver
            .resolve_in(OptionKey::CurrentRunner, ScopeMode::PrefixOnly)
            .as_text()
            .unwrap_or_else(|| self.config.default_runner.clone());
        let selection = select_runner(&self.config.runners_root, &configured);
        if let Some(missing) = &selection.replaced {
            self.logger.warn(format!(
                "Runner {missing:?} not found, using {} instead",
                selection.name
            ));
        }
        selection
    }

    fn shader_cache(&self, prefix: &Prefix) -> Option<PathBuf> {
        let dir = prefix.shader_cache_dir();
        match fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(err) => {
                self.logger
                    .warn(format!("Shader cache {} unavailable: {err}", dir.display()));
                None
            }
        }
    }

    fn exit_code(&self, result: Result<i32, LaunchError>) -> i32 {
        match result {
            Ok(code) => code,
            Err(err) => {
                self.logger.error(err.to_string());
                err.exit_code()
            }
        }
    }
}

/// Shuts the whole prefix down through Proton's own `wineboot -e`, skipping
/// any runtime update.
fn stop_command(launcher: &Path, runner: &RunnerSelection, env: &EnvMap, cwd: &Path) -> ProcessSpec {
    let mut env = env.clone();
    env.insert(ENV_NO_PROTON, "1");
    env.insert(ENV_RUNTIME_UPDATE, "0");
    ProcessSpec {
        program: launcher.to_string_lossy().into_owned(),
        args: vec![
            runner.path.join("proton").to_string_lossy().into_owned(),
            "runinprefix".to_string(),
            "wineboot".to_string(),
            "-e".to_string(),
        ],
        env,
        cwd: cwd.to_path_buf(),
    }
}

fn log_file_name(stem: &str) -> String {
    format!("{}.txt", stem.replace('/', "_"))
}
