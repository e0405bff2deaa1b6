use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Update policy a tool follows: latest tag or latest default-branch commit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum UpdateTrain {
    #[serde(rename = "release")]
    #[default]
    Release,
    #[serde(rename = "edge")]
    Edge,
}

impl UpdateTrain {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateTrain::Release => "release",
            UpdateTrain::Edge => "edge",
        }
    }

    /// Lenient parse used for persisted values: anything unknown becomes `Release`.
    pub fn normalize(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for UpdateTrain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "release" => Ok(UpdateTrain::Release),
            "edge" => Ok(UpdateTrain::Edge),
            other => Err(format!("unknown update train '{}'", other)),
        }
    }
}

impl fmt::Display for UpdateTrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetgitSettings {
    #[serde(default = "default_root")]
    pub root: String,
}

fn default_root() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("getgit")
        .to_string_lossy()
        .to_string()
}

impl Default for GetgitSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GetgitConfig {
    #[serde(default)]
    pub settings: GetgitSettings,
}

/// Options threaded through one install/upgrade invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Train explicitly requested on the command line, if any.
    pub requested_train: Option<UpdateTrain>,
    pub skip_build: bool,
}

/// Snapshot of a working copy's version position. Recomputed on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionState {
    pub current_ref: String,
    pub has_tags: bool,
    pub latest_tag: Option<String>,
    pub remote_head_differs_from_local: bool,
}

/// What a single install/upgrade did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        train: UpdateTrain,
        reference: String,
    },
    Updated {
        train: UpdateTrain,
        from: String,
        to: String,
    },
    SwitchedTrain {
        from: UpdateTrain,
        to: UpdateTrain,
        reference: String,
    },
    UpToDate {
        train: UpdateTrain,
        reference: String,
    },
}

impl InstallOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, InstallOutcome::UpToDate { .. })
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOutcome::Installed { train, reference } => {
                write!(f, "installed at {} ({} train)", reference, train)
            }
            InstallOutcome::Updated { train, from, to } => {
                write!(f, "updated {} -> {} ({} train)", from, to, train)
            }
            InstallOutcome::SwitchedTrain {
                from,
                to,
                reference,
            } => write!(f, "switched from {} to {} train, now at {}", from, to, reference),
            InstallOutcome::UpToDate { train, reference } => {
                write!(f, "already up to date at {} ({} train)", reference, train)
            }
        }
    }
}

/// Aggregate result of upgrading every installed tool.
#[derive(Debug, Default)]
pub struct UpgradeSummary {
    pub updated: Vec<(String, InstallOutcome)>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl UpgradeSummary {
    pub fn total(&self) -> usize {
        self.updated.len() + self.skipped.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for UpgradeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: {} updated, {} skipped, {} failed",
            self.updated.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}
