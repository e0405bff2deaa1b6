//! Shell completion scripts generated from the CLI definition.

use crate::cli::Cli;
use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BASH_COMPLETION_FILE_NAME: &str = ".bash_completion";

pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    generate(shell, &mut command, name, out);
}

/// Rewrites `<root>/.bash_completion` so shells sourcing it stay current.
pub fn refresh_bash_completion(root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(root)
        .with_context(|| format!("Could not create {}", root.display()))?;
    let path = root.join(BASH_COMPLETION_FILE_NAME);

    let mut script = Vec::new();
    write_completions(Shell::Bash, &mut script);
    fs::write(&path, script)
        .with_context(|| format!("Could not write completion script {}", path.display()))?;

    tracing::debug!("Updated shell completion at {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_bash_completion_lists_subcommands() {
        let dir = tempdir().unwrap();
        let path = refresh_bash_completion(&dir.path().join("tools")).unwrap();

        assert_eq!(path, dir.path().join("tools").join(BASH_COMPLETION_FILE_NAME));
        let script = fs::read_to_string(path).unwrap();
        assert!(script.contains("getgit"));
        assert!(script.contains("install"));
        assert!(script.contains("upgrade"));
    }

    #[test]
    fn test_every_shell_generates_a_script() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell] {
            let mut out = Vec::new();
            write_completions(shell, &mut out);
            assert!(!out.is_empty(), "{shell} produced no script");
        }
    }
}
