use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use time::OffsetDateTime;

pub const LOG_FILE: &str = "prefixctl.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Diagnostics sink: echoes to stderr unless quiet and appends a
/// timestamped copy to the application log when one is configured.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    path: Option<PathBuf>,
    quiet: bool,
}

impl Logger {
    pub fn new(path: Option<PathBuf>, quiet: bool) -> Self {
        Self { path, quiet }
    }

    #[cfg(test)]
    pub fn quiet() -> Self {
        Self {
            path: None,
            quiet: true,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let label = log_level_label(level);
        if !self.quiet {
            eprintln!("[{label}] {message}");
        }
        if let Some(path) = &self.path {
            let _ = append_log_file(path, level, message);
        }
    }
}

pub fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{} [{label}] {message}", log_timestamp())
}

fn log_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    let format = time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
    );
    now.format(&format).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_labelled_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(LOG_FILE);
        let logger = Logger::new(Some(path.clone()), true);
        logger.info("starting");
        logger.warn("runner missing");

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] starting"));
        assert!(lines[1].ends_with("[WARN] runner missing"));
        assert!(lines[0].contains('T'));
    }

    #[test]
    fn quiet_logger_without_path_is_silent() {
        let logger = Logger::quiet();
        logger.error("nothing happens");
        assert!(logger.path.is_none());
    }
}
