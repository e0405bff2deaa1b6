use crate::error::VcsError;
use crate::types::{UpdateTrain, VersionState};
use crate::vcs::VersionControlClient;
use std::path::Path;

/// Answers "is there something newer" for a working copy and moves it there.
///
/// Tag recency is judged by commit timestamp, not by version number, so
/// releases tagged out of order can be misordered.
pub struct VersionOracle<'a> {
    vcs: &'a dyn VersionControlClient,
}

impl<'a> VersionOracle<'a> {
    pub fn new(vcs: &'a dyn VersionControlClient) -> Self {
        Self { vcs }
    }

    pub fn current_ref(&self, path: &Path) -> Result<String, VcsError> {
        self.vcs.current_ref(path)
    }

    /// Whether the remote default branch moved past the local HEAD.
    pub fn has_newer_edge(&self, path: &Path) -> Result<bool, VcsError> {
        self.vcs.fetch(path, true)?;
        let branch = self.vcs.default_branch_name(path)?;
        let local = self.vcs.local_head_commit(path)?;
        let remote = self.vcs.remote_head_commit(path, &branch)?;
        tracing::debug!("Edge check on {}: local {} remote {}", branch, local, remote);
        Ok(local != remote)
    }

    /// Whether a newer tag than the checked-out one exists, and which tag is latest.
    ///
    /// A repository without tags always reports an update, so tools on the
    /// release train never silently stop updating.
    pub fn has_newer_release(&self, path: &Path) -> Result<(bool, Option<String>), VcsError> {
        self.vcs.fetch(path, true)?;

        let latest = match self.vcs.latest_tag_by_timestamp(path)? {
            Some(tag) => tag,
            None => return Ok((true, None)),
        };

        let current = match self.vcs.current_tag(path)? {
            Some(tag) => tag,
            None => return Ok((true, Some(latest))),
        };

        if current == latest {
            return Ok((false, Some(latest)));
        }

        let newer =
            self.vcs.tag_timestamp(path, &latest)? > self.vcs.tag_timestamp(path, &current)?;
        Ok((newer, Some(latest)))
    }

    pub fn has_newer(&self, path: &Path, train: UpdateTrain) -> Result<bool, VcsError> {
        match train {
            UpdateTrain::Edge => self.has_newer_edge(path),
            UpdateTrain::Release => Ok(self.has_newer_release(path)?.0),
        }
    }

    /// Checks out the position `train` points at.
    pub fn move_to_train(&self, path: &Path, train: UpdateTrain) -> Result<(), VcsError> {
        match train {
            UpdateTrain::Edge => self.follow_default_branch(path),
            UpdateTrain::Release => {
                self.vcs.fetch(path, true)?;
                match self.vcs.latest_tag_by_timestamp(path)? {
                    Some(tag) => self.vcs.checkout(path, &tag),
                    None => {
                        tracing::warn!(
                            "{} has no tags, following the default branch instead",
                            path.display()
                        );
                        self.follow_default_branch(path)
                    }
                }
            }
        }
    }

    fn follow_default_branch(&self, path: &Path) -> Result<(), VcsError> {
        let branch = self.vcs.default_branch_name(path)?;
        self.vcs.checkout(path, &branch)?;
        self.vcs.pull(path, &branch)
    }

    /// Full picture of where the working copy stands. Fetches first.
    pub fn inspect(&self, path: &Path) -> Result<VersionState, VcsError> {
        self.vcs.fetch(path, true)?;
        let branch = self.vcs.default_branch_name(path)?;
        let tags = self.vcs.list_tags(path)?;
        let latest_tag = if tags.is_empty() {
            None
        } else {
            self.vcs.latest_tag_by_timestamp(path)?
        };

        Ok(VersionState {
            current_ref: self.vcs.current_ref(path)?,
            has_tags: !tags.is_empty(),
            latest_tag,
            remote_head_differs_from_local: self.vcs.local_head_commit(path)?
                != self.vcs.remote_head_commit(path, &branch)?,
        })
    }
}
