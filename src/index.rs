//! Cached, queryable listing of every tool the catalog offers.

use crate::sources::Catalog;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoSummary {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub executable: String,
    #[serde(default)]
    pub load: String,
    pub source_file: String,
    pub source_name: String,
}

/// Read side of the tool index.
pub trait ToolIndex {
    fn find_by_name(&self, name: &str) -> Result<Vec<RepoSummary>>;
    fn list_all(&self) -> Result<Vec<RepoSummary>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    generated_at: String,
    #[serde(default)]
    repos: Vec<RepoSummary>,
}

/// Index stored as a JSON document in the cache directory.
#[derive(Debug, Clone)]
pub struct JsonToolIndex {
    path: PathBuf,
}

impl JsonToolIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Replaces the whole index with the catalog's current content.
    /// Rows are unique by `(name, source_file)`; later duplicates win.
    pub fn rebuild(&self, catalog: &Catalog) -> Result<usize> {
        let mut repos: Vec<RepoSummary> = Vec::new();
        for entry in catalog.list_all() {
            let source_file = entry.manifest.file_path.to_string_lossy().to_string();
            let summary = RepoSummary {
                name: entry.repo.name.clone(),
                url: entry.repo.url.clone(),
                build: entry.repo.build.clone(),
                executable: entry.repo.executable.clone(),
                load: entry.repo.load.clone(),
                source_file,
                source_name: entry.manifest.name.clone(),
            };
            match repos
                .iter_mut()
                .find(|r| r.name == summary.name && r.source_file == summary.source_file)
            {
                Some(existing) => *existing = summary,
                None => repos.push(summary),
            }
        }

        let count = repos.len();
        let file = IndexFile {
            generated_at: chrono::Utc::now().to_rfc3339(),
            repos,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Could not write tool index {}", self.path.display()))?;

        tracing::info!("Indexed {} tool(s) into {}", count, self.path.display());
        Ok(count)
    }

    /// Rebuilds only when no index has been written yet.
    pub fn ensure(&self, catalog: &Catalog) -> Result<()> {
        if !self.exists() {
            tracing::debug!("Tool index missing, building it");
            self.rebuild(catalog)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<IndexFile> {
        if !self.exists() {
            return Ok(IndexFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Could not read tool index {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Could not parse tool index {}", self.path.display()))
    }
}

impl ToolIndex for JsonToolIndex {
    fn find_by_name(&self, name: &str) -> Result<Vec<RepoSummary>> {
        let wanted = name.to_lowercase();
        Ok(self
            .read()?
            .repos
            .into_iter()
            .filter(|r| r.name.to_lowercase() == wanted)
            .collect())
    }

    fn list_all(&self) -> Result<Vec<RepoSummary>> {
        let mut repos = self.read()?.repos;
        repos.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.source_name.cmp(&b.source_name))
        });
        Ok(repos)
    }
}
