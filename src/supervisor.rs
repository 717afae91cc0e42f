use crate::{
    env::EnvMap,
    error::{LaunchError, LAUNCH_FAILED},
    logging::Logger,
};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Read, Write},
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const STOP_GRACE: Duration = Duration::from_secs(10);
/// Returned when a halted child is still alive after the stop grace period.
pub const HALTED_EXIT: i32 = 130;
const STOP_POLL: Duration = Duration::from_millis(100);
const LOG_SEPARATOR: &str = "==============================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunnerStatus {
    Starting,
    Updated,
    ProtonStarted,
    Stopping,
    Stopped,
}

impl RunnerStatus {
    pub fn label(self) -> &'static str {
        match self {
            RunnerStatus::Starting => "launcher starting",
            RunnerStatus::Updated => "runtime up to date",
            RunnerStatus::ProtonStarted => "proton started",
            RunnerStatus::Stopping => "stopping",
            RunnerStatus::Stopped => "stopped",
        }
    }
}

/// Lifecycle marker carried by a launcher output line, if any.
pub fn classify_line(line: &str) -> Option<RunnerStatus> {
    if line.contains("umu-launcher") {
        Some(RunnerStatus::Starting)
    } else if line.contains("steamrt3 is up to date") {
        Some(RunnerStatus::Updated)
    } else if line.starts_with("Proton: Executable") || line.contains("SteamAPI_Init") {
        Some(RunnerStatus::ProtonStarted)
    } else {
        None
    }
}

/// A fully resolved child invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: EnvMap,
    pub cwd: PathBuf,
}

impl ProcessSpec {
    /// Splits the first element off `argv` as the executable.
    pub fn from_argv(argv: &[String], env: EnvMap, cwd: PathBuf) -> Result<Self, LaunchError> {
        let (program, args) = argv.split_first().ok_or(LaunchError::MissingLauncher)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            env,
            cwd,
        })
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env_clear()
            .envs(self.env.iter())
            .current_dir(&self.cwd)
            .stdin(Stdio::null());
        command
    }
}

/// Per-launch output log under the prefix's `.logs` directory.
#[derive(Debug)]
pub struct LaunchLog {
    path: PathBuf,
    file: File,
}

impl LaunchLog {
    /// Truncates any previous log and writes the environment and command
    /// header.
    pub fn create(path: &Path, spec: &ProcessSpec) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        writeln!(file, "Current running environment:")?;
        for line in spec.env.lines() {
            writeln!(file, "{line}")?;
        }
        writeln!(file)?;
        writeln!(file, "Running command:")?;
        writeln!(file, "{}", spec.command_line())?;
        writeln!(file, "{LOG_SEPARATOR}")?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.file, "{line}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Hook,
    Main,
}

/// Runs launcher children one at a time, forwarding their stderr.
pub struct Supervisor {
    logger: Logger,
    halt: Arc<AtomicBool>,
    status: Option<Sender<RunnerStatus>>,
    log: Option<LaunchLog>,
    echo: bool,
    poll: Duration,
    grace: Duration,
}

impl Supervisor {
    pub fn new(logger: Logger, halt: Arc<AtomicBool>) -> Self {
        Self {
            logger,
            halt,
            status: None,
            log: None,
            echo: true,
            poll: POLL_INTERVAL,
            grace: STOP_GRACE,
        }
    }

    pub fn with_status(mut self, status: Option<Sender<RunnerStatus>>) -> Self {
        self.status = status;
        self
    }

    pub fn with_log(mut self, log: Option<LaunchLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[cfg(test)]
    pub fn with_timing(mut self, poll: Duration, grace: Duration) -> Self {
        self.poll = poll;
        self.grace = grace;
        self
    }

    /// Runs a pre- or post-run script to completion. Hooks are not
    /// cancellable and their failure does not abort the launch.
    pub fn run_hook(&mut self, script: &str, env: &EnvMap, cwd: &Path) -> Option<i32> {
        let spec = ProcessSpec {
            program: script.to_string(),
            args: Vec::new(),
            env: env.clone(),
            cwd: cwd.to_path_buf(),
        };
        self.logger.info(format!("Running hook {script}"));
        let result = self
            .spawn(&spec)
            .and_then(|mut child| self.pump(&mut child, Stage::Hook, None));
        match result {
            Ok(code) => {
                if code != 0 {
                    self.logger.warn(format!("Hook {script} exited with {code}"));
                }
                Some(code)
            }
            Err(err) => {
                self.logger.warn(format!("Hook {script} failed: {err}"));
                None
            }
        }
    }

    /// Runs the main launcher process until it exits or the halt flag is
    /// raised, in which case `stop` is issued and waited for.
    pub fn supervise(
        &mut self,
        spec: &ProcessSpec,
        stop: Option<&ProcessSpec>,
    ) -> Result<i32, LaunchError> {
        let mut child = self.spawn(spec)?;
        self.pump(&mut child, Stage::Main, stop)
    }

    /// Closes the launch log, returning where it was written.
    pub fn finish(self) -> Option<PathBuf> {
        self.log.map(|log| log.path)
    }

    fn spawn(&self, spec: &ProcessSpec) -> Result<Child, LaunchError> {
        spec.command()
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: PathBuf::from(&spec.program),
                source,
            })
    }

    fn pump(
        &mut self,
        child: &mut Child,
        stage: Stage,
        stop: Option<&ProcessSpec>,
    ) -> Result<i32, LaunchError> {
        let (tx, rx) = mpsc::channel();
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx);
        }

        let mut stream_open = true;
        loop {
            if stage == Stage::Main && self.halt.load(Ordering::SeqCst) {
                return Ok(self.halt_child(child, &rx, stop));
            }
            if stream_open {
                match rx.recv_timeout(self.poll) {
                    Ok(line) => {
                        self.record(&line, stage);
                        continue;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stream_open = false,
                }
            } else {
                // stderr closed but the child may still be running
                thread::sleep(self.poll);
            }
            if let Some(status) = child.try_wait()? {
                // Wine services can keep the pipe open after the child exits.
                if stream_open {
                    self.drain_exited(&rx, stage);
                }
                return Ok(exit_code(status));
            }
        }
    }

    fn halt_child(
        &mut self,
        child: &mut Child,
        rx: &Receiver<String>,
        stop: Option<&ProcessSpec>,
    ) -> i32 {
        self.emit(RunnerStatus::Stopping);
        if let Some(stop) = stop {
            self.logger.info("Stop requested, shutting down the prefix");
            let result = stop
                .command()
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if let Err(err) = result {
                self.logger.warn(format!("Stop command failed to start: {err}"));
            }
        }
        self.emit(RunnerStatus::Stopped);

        let deadline = Instant::now() + self.grace;
        loop {
            self.drain(rx, Stage::Main);
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.drain(rx, Stage::Main);
                    return exit_code(status);
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(STOP_POLL),
                Ok(None) => {
                    self.logger
                        .warn("Launcher still running after stop; leaving it to the runtime");
                    return HALTED_EXIT;
                }
                Err(err) => {
                    self.logger.warn(format!("Failed to poll stopped launcher: {err}"));
                    return HALTED_EXIT;
                }
            }
        }
    }

    fn drain(&mut self, rx: &Receiver<String>, stage: Stage) {
        while let Ok(line) = rx.try_recv() {
            self.record(&line, stage);
        }
    }

    /// Collects what the reader thread still holds once the child is gone,
    /// bounded by the grace period in case a daemon keeps writing.
    fn drain_exited(&mut self, rx: &Receiver<String>, stage: Stage) {
        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline {
            match rx.recv_timeout(self.poll.min(STOP_POLL)) {
                Ok(line) => self.record(&line, stage),
                Err(_) => break,
            }
        }
    }

    fn record(&mut self, line: &str, stage: Stage) {
        if self.echo {
            eprintln!("{line}");
        }
        if let Some(log) = self.log.as_mut() {
            if let Err(err) = log.write_line(line) {
                self.logger
                    .warn(format!("Launch log {} unwritable: {err}", log.path.display()));
                self.log = None;
            }
        }
        if stage == Stage::Main {
            if let Some(status) = classify_line(line) {
                self.emit(status);
            }
        }
    }

    fn emit(&self, status: RunnerStatus) {
        if let Some(sender) = &self.status {
            let _ = sender.send(status);
        }
    }
}

fn forward_lines<R: Read + Send + 'static>(stream: R, tx: Sender<String>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(&['\n', '\r'][..]).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(LAUNCH_FAILED)
}
