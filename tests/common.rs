use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// Not every test binary uses every helper.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub root_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("config");
        let root_dir = temp_dir.path().join("tools");
        let cache_dir = temp_dir.path().join("cache");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_getgit"));

        Self {
            _temp_dir: temp_dir,
            config_dir,
            root_dir,
            cache_dir,
            bin_path,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("GETGIT_CONFIG_DIR", &self.config_dir);
        cmd.env("GETGIT_ROOT", &self.root_dir);
        cmd.env("GETGIT_CACHE_DIR", &self.cache_dir);
        // Keep the user's own config and data out of reach.
        cmd.env("HOME", self._temp_dir.path());
        cmd.env("XDG_DATA_HOME", self._temp_dir.path().join("data"));
        cmd.env("XDG_CONFIG_HOME", self._temp_dir.path().join("xdg-config"));
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.cmd()
            .args(args)
            .output()
            .expect("Failed to run getgit")
            .into()
    }

    /// Writes `sources.d/<file_name>`.
    pub fn add_source(&self, file_name: &str, content: &str) -> PathBuf {
        let dir = self.config_dir.join("sources.d");
        fs::create_dir_all(&dir).expect("Failed to create sources dir");
        let path = dir.join(file_name);
        fs::write(&path, content).expect("Failed to write source file");
        path
    }

    pub fn tool_dir(&self, tool: &str) -> PathBuf {
        self.root_dir.join(tool)
    }

    pub fn marker(&self, tool: &str) -> PathBuf {
        self.tool_dir(tool).join(".getgit")
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.status.success() {
            panic!(
                "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// Whether a usable `git` is on PATH.
#[allow(dead_code)]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Runs git in `dir` with a fixed identity; panics on failure.
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) -> String {
    git_at(dir, args, None)
}

/// Like [`git`], with author and committer dates pinned to `epoch` seconds.
#[allow(dead_code)]
pub fn git_at(dir: &Path, args: &[&str], epoch: Option<i64>) -> String {
    let mut cmd = Command::new("git");
    if let Some(epoch) = epoch {
        let date = format!("@{} +0000", epoch);
        cmd.env("GIT_AUTHOR_DATE", &date);
        cmd.env("GIT_COMMITTER_DATE", &date);
    }
    let output = cmd
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "getgit tests")
        .env("GIT_AUTHOR_EMAIL", "tests@example.com")
        .env("GIT_COMMITTER_NAME", "getgit tests")
        .env("GIT_COMMITTER_EMAIL", "tests@example.com")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
