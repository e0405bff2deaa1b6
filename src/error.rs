use std::path::PathBuf;
use thiserror::Error;

/// A failed `git` invocation, with the command line and whatever it printed.
#[derive(Debug, Error)]
#[error("`{command}` failed: {output}")]
pub struct VcsError {
    pub command: String,
    pub output: String,
}

impl VcsError {
    pub fn new(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
        }
    }
}

/// Failures reading or writing the per-tool marker file.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("invalid marker YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("marker failed validation: {0}")]
    Invalid(String),
    #[error("marker I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum GetgitError {
    #[error("tool '{tool}' not found in any source; check `getgit info` or your sources.d directory")]
    NotFound { tool: String },

    #[error("tool '{tool}' is provided by several sources ({}) and no source was selected", sources.join(", "))]
    MultipleMatches { tool: String, sources: Vec<String> },

    #[error("URL '{url}' of '{tool}' is not allowed in source '{source_name}'; add its domain to the permissions origins list")]
    PermissionDenied {
        tool: String,
        url: String,
        source_name: String,
    },

    #[error("source '{source_name}' recorded for '{tool}' no longer provides this tool")]
    StaleProvenance { tool: String, source_name: String },

    #[error("git operation failed for '{tool}': {source}")]
    Vcs {
        tool: String,
        #[source]
        source: VcsError,
    },

    #[error("build failed for '{tool}' (exit status {status}): {output}")]
    Build {
        tool: String,
        status: i32,
        output: String,
    },

    #[error("error parsing source file {}: {source}", file.display())]
    ManifestParse {
        file: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid source file {}: {reason}", file.display())]
    ManifestInvalid { file: PathBuf, reason: String },

    #[error("marker of '{tool}' is unusable: {source}")]
    Marker {
        tool: String,
        #[source]
        source: MarkerError,
    },

    #[error("tool '{tool}' is not installed")]
    NotInstalled { tool: String },

    #[error("cannot specify both --release and --edge")]
    ConflictingTrainFlags,

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register shell entries for '{tool}': {source}")]
    Registration {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("source selection for '{tool}' failed: {source}")]
    Prompt {
        tool: String,
        #[source]
        source: anyhow::Error,
    },
}

impl GetgitError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GetgitError::Io {
            path: path.into(),
            source,
        }
    }
}
