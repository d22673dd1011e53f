//! Subprocess execution for CLI-backed secret stores.

use async_trait::async_trait;
use credman_core::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Captured result of one CLI invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stdout, the usual shape of `--raw` CLI responses.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Executes a secret-store CLI command and captures its output.
///
/// The Bitwarden manager only talks to the external tool through this
/// trait, so tests can substitute scripted responses for real subprocess
/// runs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the tool with `args`, adding `env` to the child environment.
    async fn run(&self, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput>;
}

/// Runs the Bitwarden CLI (`bw`) found on the execution path.
pub struct BwCli {
    program: String,
}

impl BwCli {
    pub fn new() -> Self {
        Self {
            program: "bw".to_string(),
        }
    }
}

impl Default for BwCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for BwCli {
    async fn run(&self, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput> {
        debug!(program = %self.program, command = %args.first().copied().unwrap_or(""), "Running CLI command");

        let mut command = Command::new(&self.program);
        command.args(args);
        for (key, value) in env {
            command.env(key, value);
        }

        let output = command.output().await.map_err(|e| {
            Error::ExternalTool(format!(
                "Failed to execute '{}': {}. Is the Bitwarden CLI installed and on PATH?",
                self.program, e
            ))
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
