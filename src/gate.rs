//! Build and test verification that must pass before a tag is created

use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::config::GateConfig;
use crate::error::{CoordinatorError, Result};

/// Runs the configured gate commands in the repository workdir
pub struct GateExecutor;

impl GateExecutor {
    /// Execute every command in order, stopping at the first failure.
    ///
    /// Commands are split on whitespace into program and arguments; no shell
    /// is involved.
    pub fn run(config: &GateConfig, workdir: &Path) -> Result<()> {
        if !config.enabled {
            debug!("verification gate disabled");
            return Ok(());
        }

        for command in &config.commands {
            Self::execute(command, workdir)?;
        }
        Ok(())
    }

    pub fn execute(command: &str, workdir: &Path) -> Result<()> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| CoordinatorError::gate("empty gate command"))?;

        info!(command, "running verification gate");
        let output = Command::new(program)
            .args(parts)
            .current_dir(workdir)
            .output()
            .map_err(|e| CoordinatorError::gate(format!("Failed to execute '{}': {}", command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(CoordinatorError::gate(format!(
                "'{}' failed with exit code {}\nStdout: {}\nStderr: {}",
                command,
                output.status.code().unwrap_or(-1),
                stdout.trim_end(),
                stderr.trim_end()
            )));
        }

        Ok(())
    }
}
