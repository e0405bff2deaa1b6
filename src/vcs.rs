//! Version-control capability consumed by the lifecycle engine, and its
//! implementation on top of the `git` executable.

use crate::error::VcsError;
use std::path::Path;
use std::process::Command;

pub const FALLBACK_BRANCH: &str = "main";

pub trait VersionControlClient {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError>;
    fn fetch(&self, path: &Path, include_tags: bool) -> Result<(), VcsError>;
    /// Tag name when HEAD is exactly at a tag.
    fn current_tag(&self, path: &Path) -> Result<Option<String>, VcsError>;
    fn default_branch_name(&self, path: &Path) -> Result<String, VcsError>;
    /// Unix timestamp of the commit a tag points to.
    fn tag_timestamp(&self, path: &Path, tag: &str) -> Result<i64, VcsError>;
    fn checkout(&self, path: &Path, reference: &str) -> Result<(), VcsError>;
    fn pull(&self, path: &Path, branch: &str) -> Result<(), VcsError>;
    fn list_tags(&self, path: &Path) -> Result<Vec<String>, VcsError>;
    fn remote_head_commit(&self, path: &Path, branch: &str) -> Result<String, VcsError>;
    fn local_head_commit(&self, path: &Path) -> Result<String, VcsError>;

    /// Tag name if HEAD is exactly a tag, else the commit hash.
    fn current_ref(&self, path: &Path) -> Result<String, VcsError> {
        match self.current_tag(path)? {
            Some(tag) => Ok(tag),
            None => self.local_head_commit(path),
        }
    }

    /// Newest tag by commit timestamp (not by version number).
    fn latest_tag_by_timestamp(&self, path: &Path) -> Result<Option<String>, VcsError> {
        let mut latest: Option<(i64, String)> = None;
        for tag in self.list_tags(path)? {
            let timestamp = self.tag_timestamp(path, &tag)?;
            if latest.as_ref().map_or(true, |(newest, _)| timestamp >= *newest) {
                latest = Some((timestamp, tag));
            }
        }
        Ok(latest.map(|(_, tag)| tag))
    }
}

/// Runs the system `git` binary.
#[derive(Debug, Default, Clone)]
pub struct GitCli {
    /// Echo captured git output at info level.
    pub verbose: bool,
}

impl GitCli {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, VcsError> {
        let command_line = format!("git {}", args.join(" "));
        tracing::debug!("Running `{}` in {}", command_line, dir.display());

        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| VcsError::new(&command_line, e.to_string()))?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim().to_string();

        if !output.status.success() {
            return Err(VcsError::new(command_line, text));
        }
        if self.verbose && !text.is_empty() {
            tracing::info!("{}", text);
        }
        Ok(text)
    }

    fn run_stdout(&self, dir: &Path, args: &[&str]) -> Result<String, VcsError> {
        let command_line = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| VcsError::new(&command_line, e.to_string()))?;
        if !output.status.success() {
            return Err(VcsError::new(
                command_line,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionControlClient for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        let parent = dest
            .parent()
            .ok_or_else(|| VcsError::new("git clone", "destination has no parent directory"))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| VcsError::new("git clone", e.to_string()))?;
        let dest = dest.to_string_lossy().to_string();
        self.run(parent, &["clone", url, dest.as_str()])?;
        Ok(())
    }

    fn fetch(&self, path: &Path, include_tags: bool) -> Result<(), VcsError> {
        if include_tags {
            self.run(path, &["fetch", "--tags", "origin"])?;
        } else {
            self.run(path, &["fetch", "origin"])?;
        }
        Ok(())
    }

    fn current_tag(&self, path: &Path) -> Result<Option<String>, VcsError> {
        // A non-zero exit here only means HEAD is not tagged.
        Ok(self
            .run_stdout(path, &["describe", "--tags", "--exact-match"])
            .ok()
            .filter(|tag| !tag.is_empty()))
    }

    fn default_branch_name(&self, path: &Path) -> Result<String, VcsError> {
        match self.run_stdout(path, &["symbolic-ref", "refs/remotes/origin/HEAD"]) {
            Ok(reference) => Ok(reference
                .trim_start_matches("refs/remotes/origin/")
                .to_string()),
            Err(e) => {
                tracing::debug!("Could not resolve origin/HEAD ({}), assuming {}", e, FALLBACK_BRANCH);
                Ok(FALLBACK_BRANCH.to_string())
            }
        }
    }

    fn tag_timestamp(&self, path: &Path, tag: &str) -> Result<i64, VcsError> {
        let output = self.run_stdout(path, &["log", "-1", "--format=%ct", tag])?;
        output.parse::<i64>().map_err(|e| {
            VcsError::new(
                format!("git log -1 --format=%ct {}", tag),
                format!("unparsable timestamp '{}': {}", output, e),
            )
        })
    }

    fn checkout(&self, path: &Path, reference: &str) -> Result<(), VcsError> {
        self.run(path, &["checkout", reference])?;
        Ok(())
    }

    fn pull(&self, path: &Path, branch: &str) -> Result<(), VcsError> {
        self.run(path, &["pull", "origin", branch])?;
        Ok(())
    }

    fn list_tags(&self, path: &Path) -> Result<Vec<String>, VcsError> {
        let output = self.run_stdout(path, &["tag"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect())
    }

    fn remote_head_commit(&self, path: &Path, branch: &str) -> Result<String, VcsError> {
        let remote_ref = format!("origin/{}", branch);
        self.run_stdout(path, &["rev-parse", remote_ref.as_str()])
    }

    fn local_head_commit(&self, path: &Path) -> Result<String, VcsError> {
        self.run_stdout(path, &["rev-parse", "HEAD"])
    }
}
