//! Source manifests and the catalog built from them.
//!
//! A manifest is a YAML file in `sources.d/` declaring a named set of
//! installable repositories plus the origins they may be cloned from.

use crate::error::GetgitError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One tool's declaration inside a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RepositoryDefinition {
    pub name: String,
    /// Git remote. A bare `owner/repo` means GitHub.
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build: String,
    /// Executable relative to the working copy; presence means an alias is registered.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub executable: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub load: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SourceManifest {
    pub name: String,
    /// Where the manifest is re-fetched from; empty means locally managed.
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub repos: Vec<RepositoryDefinition>,
    #[serde(skip)]
    pub file_path: PathBuf,
}

impl SourceManifest {
    /// Parse manifest text; `file_path` is the on-disk identity it is bound to.
    pub fn from_yaml(content: &str, file_path: &Path) -> Result<Self, GetgitError> {
        let mut manifest: SourceManifest =
            serde_yaml::from_str(content).map_err(|source| GetgitError::ManifestParse {
                file: file_path.to_path_buf(),
                source,
            })?;
        manifest.file_path = file_path.to_path_buf();
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(file_path: &Path) -> Result<Self, GetgitError> {
        let content =
            fs::read_to_string(file_path).map_err(|e| GetgitError::io(file_path, e))?;
        Self::from_yaml(&content, file_path)
    }

    fn validate(&self) -> Result<(), GetgitError> {
        let invalid = |reason: String| GetgitError::ManifestInvalid {
            file: self.file_path.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("source name is empty".to_string()));
        }
        for (i, repo) in self.repos.iter().enumerate() {
            if repo.name.trim().is_empty() {
                return Err(invalid(format!("repository #{} has an empty name", i + 1)));
            }
            if repo.url.trim().is_empty() {
                return Err(invalid(format!("repository '{}' has an empty url", repo.name)));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Case-insensitive exact match on repository name.
    pub fn find_repo(&self, name: &str) -> impl Iterator<Item = &RepositoryDefinition> {
        let wanted = name.to_lowercase();
        self.repos
            .iter()
            .filter(move |repo| repo.name.to_lowercase() == wanted)
    }
}

/// A repository definition joined with the manifest that declares it.
#[derive(Debug, Clone, Copy)]
pub struct RepoMatch<'a> {
    pub repo: &'a RepositoryDefinition,
    pub manifest: &'a SourceManifest,
}

/// Every manifest found in the sources directory.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    manifests: Vec<SourceManifest>,
}

impl Catalog {
    /// Reads every `*.yaml`/`*.yml` file directly inside `dir`, in file-name order.
    /// One unparsable manifest fails the whole load.
    pub fn load(dir: &Path) -> Result<Self, GetgitError> {
        let entries = fs::read_dir(dir).map_err(|e| GetgitError::io(dir, e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_manifest_file(path))
            .collect();
        paths.sort();

        let mut manifests = Vec::with_capacity(paths.len());
        for path in paths {
            tracing::debug!("Loading source file {}", path.display());
            manifests.push(SourceManifest::load(&path)?);
        }

        tracing::debug!("Loaded {} source(s) from {}", manifests.len(), dir.display());
        Ok(Self::from_manifests(manifests))
    }

    pub fn from_manifests(manifests: Vec<SourceManifest>) -> Self {
        Self { manifests }
    }

    pub fn manifests(&self) -> &[SourceManifest] {
        &self.manifests
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Vec<RepoMatch<'_>> {
        self.manifests
            .iter()
            .flat_map(|manifest| {
                manifest
                    .find_repo(name)
                    .map(move |repo| RepoMatch { repo, manifest })
            })
            .collect()
    }

    pub fn list_all(&self) -> Vec<RepoMatch<'_>> {
        self.manifests
            .iter()
            .flat_map(|manifest| {
                manifest
                    .repos
                    .iter()
                    .map(move |repo| RepoMatch { repo, manifest })
            })
            .collect()
    }
}

fn is_manifest_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Expand `owner/repo` shorthand to a GitHub clone URL; absolute URLs pass through.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") || url.starts_with("git@") {
        return url.to_string();
    }

    let clean = url
        .trim_start_matches("github.com/")
        .trim_end_matches('/')
        .trim_end_matches(".git");
    format!("https://github.com/{}.git", clean)
}
