use std::{io, path::PathBuf};
use thiserror::Error;

/// Exit value reported when a launch never started a child process.
pub const LAUNCH_FAILED: i32 = -1;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("launcher executable not found (install umu-run or set `launcher` in config.json)")]
    MissingLauncher,
    #[error("launch target does not exist: {0}")]
    InvalidTarget(String),
    #[error("unknown shortcut: {0}")]
    UnknownShortcut(String),
    #[error("shortcut {0} has no executable path")]
    MissingPath(String),
    #[error("failed to start {}: {source}", command.display())]
    Spawn {
        command: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LaunchError {
    pub fn exit_code(&self) -> i32 {
        LAUNCH_FAILED
    }
}
