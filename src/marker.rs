//! Per-tool marker file recording provenance and update train.
//!
//! The marker lives at `<root>/<tool>/.getgit` and is itself a sourceable
//! shell script: a YAML header hidden in a no-op heredoc, followed by the
//! tool's load command verbatim.
//!
//! ```text
//! #!/bin/bash
//!
//! : <<'EOF'
//! sourcefile: default
//! updates: release
//! EOF
//!
//! export PATH="$PATH:/opt/tool/bin"
//! ```

use crate::error::{GetgitError, MarkerError};
use crate::types::UpdateTrain;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const MARKER_FILE_NAME: &str = ".getgit";
const HEREDOC_START: &str = ": <<'EOF'";
const HEREDOC_END: &str = "EOF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRecord {
    pub source_name: String,
    pub update_train: UpdateTrain,
    pub load_command: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MarkerHeader {
    #[serde(default)]
    sourcefile: String,
    #[serde(default)]
    updates: String,
}

impl InstallationRecord {
    pub fn parse(content: &str) -> Result<Self, MarkerError> {
        let mut header_lines = Vec::new();
        let mut load_lines = Vec::new();
        let mut in_heredoc = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if !in_heredoc && trimmed == HEREDOC_START {
                in_heredoc = true;
                continue;
            }
            if in_heredoc && trimmed == HEREDOC_END {
                in_heredoc = false;
                continue;
            }

            if in_heredoc {
                header_lines.push(line);
            } else if !trimmed.is_empty() && !trimmed.starts_with('#') {
                load_lines.push(line);
            }
        }

        let header: MarkerHeader = if header_lines.iter().all(|l| l.trim().is_empty()) {
            MarkerHeader::default()
        } else {
            serde_yaml::from_str(&header_lines.join("\n"))?
        };

        if header.sourcefile.trim().is_empty() {
            return Err(MarkerError::Invalid("source name is empty".to_string()));
        }

        let update_train = header.updates.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Marker declares unknown update train '{}', using release",
                header.updates
            );
            UpdateTrain::Release
        });

        Ok(Self {
            source_name: header.sourcefile,
            update_train,
            load_command: load_lines.join("\n"),
        })
    }

    pub fn render(&self) -> Result<String, MarkerError> {
        let header = serde_yaml::to_string(&MarkerHeader {
            sourcefile: self.source_name.clone(),
            updates: self.update_train.as_str().to_string(),
        })?;

        let mut content = String::from("#!/bin/bash\n\n");
        content.push_str(HEREDOC_START);
        content.push('\n');
        content.push_str(&header);
        content.push_str(HEREDOC_END);
        content.push('\n');
        if !self.load_command.trim().is_empty() {
            content.push('\n');
            content.push_str(self.load_command.trim_end());
            content.push('\n');
        }
        Ok(content)
    }
}

/// Reads and writes markers for the working copies under one root.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    root: PathBuf,
}

impl MarkerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, tool: &str) -> PathBuf {
        self.root.join(tool).join(MARKER_FILE_NAME)
    }

    /// `Ok(None)` when the tool has no marker; an error when one exists but is unusable.
    pub fn read(&self, tool: &str) -> Result<Option<InstallationRecord>, GetgitError> {
        let path = self.path(tool);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(GetgitError::Marker {
                    tool: tool.to_string(),
                    source: MarkerError::Io { path, source },
                })
            }
        };

        InstallationRecord::parse(&content)
            .map(Some)
            .map_err(|source| GetgitError::Marker {
                tool: tool.to_string(),
                source,
            })
    }

    /// Replaces the marker in one rename so readers never see partial content.
    pub fn write(
        &self,
        tool: &str,
        source_name: &str,
        update_train: &str,
        load_command: &str,
    ) -> Result<InstallationRecord, GetgitError> {
        let marker_err = |source| GetgitError::Marker {
            tool: tool.to_string(),
            source,
        };

        if source_name.trim().is_empty() {
            return Err(marker_err(MarkerError::Invalid(
                "source name is empty".to_string(),
            )));
        }

        let record = InstallationRecord {
            source_name: source_name.to_string(),
            update_train: UpdateTrain::normalize(update_train),
            load_command: load_command.to_string(),
        };
        let content = record.render().map_err(marker_err)?;

        let path = self.path(tool);
        write_atomic(&path, content.as_bytes())
            .map_err(|source| marker_err(MarkerError::Io { path, source }))?;

        tracing::debug!(
            "Wrote marker for {} (source: {}, train: {})",
            tool,
            record.source_name,
            record.update_train
        );
        Ok(record)
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "marker path has no parent"))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o755))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Outcome of deciding which train a tool follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainResolution {
    pub train: UpdateTrain,
    /// Set when `edge` was chosen only because the repository has no tags.
    pub fallback: bool,
}

/// Collapses the two CLI flags into one request; both at once is a user error.
pub fn requested_train(edge: bool, release: bool) -> Result<Option<UpdateTrain>, GetgitError> {
    match (edge, release) {
        (true, true) => Err(GetgitError::ConflictingTrainFlags),
        (true, false) => Ok(Some(UpdateTrain::Edge)),
        (false, true) => Ok(Some(UpdateTrain::Release)),
        (false, false) => Ok(None),
    }
}

/// Picks the train: explicit request, then the recorded train, then the
/// repository default (`release`, or `edge` when it has no tags).
///
/// `has_tags` is `None` when the tag lookup was not possible; that is treated
/// as "has tags".
pub fn resolve_update_train(
    requested: Option<UpdateTrain>,
    recorded: Option<UpdateTrain>,
    has_tags: Option<bool>,
) -> TrainResolution {
    let tagless = has_tags == Some(false);
    match (requested, recorded) {
        (Some(UpdateTrain::Edge), _) => TrainResolution {
            train: UpdateTrain::Edge,
            fallback: false,
        },
        (Some(UpdateTrain::Release), _) | (None, None) if tagless => TrainResolution {
            train: UpdateTrain::Edge,
            fallback: true,
        },
        (Some(UpdateTrain::Release), _) => TrainResolution {
            train: UpdateTrain::Release,
            fallback: false,
        },
        (None, Some(train)) => TrainResolution {
            train,
            fallback: false,
        },
        (None, None) => TrainResolution {
            train: UpdateTrain::Release,
            fallback: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with_tool(tool: &str) -> (tempfile::TempDir, MarkerStore) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(tool)).unwrap();
        let store = MarkerStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_missing_marker_is_none() {
        let (_dir, store) = store_with_tool("k9s");
        assert!(store.read("k9s").unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store_with_tool("nvm");
        store
            .write("nvm", "default", "edge", "export NVM_DIR=/tools/nvm\n. \"$NVM_DIR/nvm.sh\"")
            .unwrap();

        let record = store.read("nvm").unwrap().unwrap();
        assert_eq!(record.source_name, "default");
        assert_eq!(record.update_train, UpdateTrain::Edge);
        assert_eq!(
            record.load_command,
            "export NVM_DIR=/tools/nvm\n. \"$NVM_DIR/nvm.sh\""
        );
    }

    #[test]
    fn test_file_layout_is_sourceable() {
        let (_dir, store) = store_with_tool("k9s");
        store.write("k9s", "default", "release", "").unwrap();
        let content = fs::read_to_string(store.path("k9s")).unwrap();
        assert_eq!(
            content,
            "#!/bin/bash\n\n: <<'EOF'\nsourcefile: default\nupdates: release\nEOF\n"
        );
    }

    #[test]
    fn test_invalid_train_is_normalized_on_write() {
        let (_dir, store) = store_with_tool("k9s");
        let record = store.write("k9s", "default", "nightly", "").unwrap();
        assert_eq!(record.update_train, UpdateTrain::Release);
        assert_eq!(
            store.read("k9s").unwrap().unwrap().update_train,
            UpdateTrain::Release
        );
    }

    #[test]
    fn test_rewrite_is_byte_identical() {
        let (_dir, store) = store_with_tool("k9s");
        store.write("k9s", "default", "release", "alias k=k9s").unwrap();
        let first = fs::read(store.path("k9s")).unwrap();
        store.write("k9s", "default", "release", "alias k=k9s").unwrap();
        assert_eq!(first, fs::read(store.path("k9s")).unwrap());
    }

    #[test]
    fn test_empty_source_name_is_a_validation_error() {
        let (_dir, store) = store_with_tool("k9s");
        fs::write(
            store.path("k9s"),
            "#!/bin/bash\n\n: <<'EOF'\nsourcefile: \"\"\nupdates: release\nEOF\n",
        )
        .unwrap();

        let err = store.read("k9s").unwrap_err();
        assert!(matches!(
            err,
            GetgitError::Marker {
                source: MarkerError::Invalid(_),
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_header_is_a_parse_error() {
        let (_dir, store) = store_with_tool("k9s");
        fs::write(store.path("k9s"), ": <<'EOF'\nsourcefile: [oops\nEOF\n").unwrap();
        assert!(matches!(
            store.read("k9s").unwrap_err(),
            GetgitError::Marker {
                source: MarkerError::Parse(_),
                ..
            }
        ));
    }

    #[test]
    fn test_marker_without_header_is_invalid() {
        let (_dir, store) = store_with_tool("k9s");
        fs::write(store.path("k9s"), "#!/bin/bash\nexport FOO=1\n").unwrap();
        assert!(store.read("k9s").is_err());
    }

    #[test]
    fn test_writing_empty_source_is_refused() {
        let (_dir, store) = store_with_tool("k9s");
        assert!(store.write("k9s", " ", "release", "").is_err());
        assert!(!store.path("k9s").exists());
    }

    #[test]
    fn test_requested_train_rejects_both_flags() {
        assert!(matches!(
            requested_train(true, true),
            Err(GetgitError::ConflictingTrainFlags)
        ));
        assert_eq!(requested_train(true, false).unwrap(), Some(UpdateTrain::Edge));
        assert_eq!(requested_train(false, false).unwrap(), None);
    }

    #[test]
    fn test_resolve_update_train() {
        use UpdateTrain::*;

        // Explicit flags win over the record.
        assert_eq!(
            resolve_update_train(Some(Edge), Some(Release), Some(true)),
            TrainResolution { train: Edge, fallback: false }
        );
        assert_eq!(
            resolve_update_train(Some(Release), Some(Edge), Some(true)),
            TrainResolution { train: Release, fallback: false }
        );
        // Release on a tagless repository falls back to edge.
        assert_eq!(
            resolve_update_train(Some(Release), None, Some(false)),
            TrainResolution { train: Edge, fallback: true }
        );
        // The record wins when no flag is given, even without tags.
        assert_eq!(
            resolve_update_train(None, Some(Release), Some(false)),
            TrainResolution { train: Release, fallback: false }
        );
        // Defaults.
        assert_eq!(
            resolve_update_train(None, None, Some(false)),
            TrainResolution { train: Edge, fallback: true }
        );
        assert_eq!(
            resolve_update_train(None, None, Some(true)),
            TrainResolution { train: Release, fallback: false }
        );
        assert_eq!(
            resolve_update_train(Some(Release), None, None),
            TrainResolution { train: Release, fallback: false }
        );
    }
}
