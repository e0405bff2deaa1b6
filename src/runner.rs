use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr.
    pub output: String,
    /// Exit code; `-1` when the process was killed by a signal.
    pub status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Executes build commands inside a working copy.
pub trait CommandRunner {
    /// `Err` only when the command could not be started at all.
    fn run(&self, command: &str, working_dir: &Path) -> Result<CommandOutput>;
}

/// Runs commands through `bash -c`.
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, working_dir: &Path) -> Result<CommandOutput> {
        tracing::debug!("Running `{}` in {}", command, working_dir.display());
        let output = Command::new("bash")
            .args(["-c", command])
            .current_dir(working_dir)
            .output()
            .with_context(|| format!("Failed to start `{}`", command))?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            output: text,
            status: output.status.code().unwrap_or(-1),
        })
    }
}
