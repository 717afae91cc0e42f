mod args;
mod cli;
mod config;
mod env;
mod error;
mod launch;
mod logging;
mod options;
mod policy;
mod prefix;
mod resolve;
mod runner;
mod settings;
mod supervisor;

use anyhow::Result;

fn main() -> Result<()> {
    options::validate_registry()?;
    let code = cli::run()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
