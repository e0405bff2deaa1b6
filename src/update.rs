//! Refreshing manifests from their declared origin.

use crate::error::GetgitError;
use crate::output::Reporter;
use crate::permissions;
use crate::prompt::Disambiguator;
use crate::sources::{normalize_url, Catalog, RepositoryDefinition, SourceManifest};
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Apply without asking, even when approval would be required.
    pub force: bool,
    pub dry_run: bool,
}

/// Differences between the local manifest and the fetched one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestChanges {
    pub identity: Vec<String>,
    pub removed_permissions: Vec<String>,
    pub required_permissions: Vec<String>,
    pub repositories: Vec<String>,
}

impl ManifestChanges {
    pub fn is_empty(&self) -> bool {
        self.identity.is_empty()
            && self.removed_permissions.is_empty()
            && self.required_permissions.is_empty()
            && self.repositories.is_empty()
    }

    /// Identity changes and newly requested origins widen trust.
    pub fn needs_approval(&self) -> bool {
        !self.identity.is_empty() || !self.required_permissions.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.identity
            .iter()
            .chain(&self.removed_permissions)
            .chain(&self.repositories)
            .cloned()
            .chain(
                self.required_permissions
                    .iter()
                    .map(|origin| format!("New permission required: '{}'", origin)),
            )
    }
}

fn origins(manifest: &SourceManifest) -> BTreeSet<&str> {
    manifest
        .permissions
        .iter()
        .flat_map(|p| p.origins.iter())
        .map(String::as_str)
        .collect()
}

fn repos_by_name(manifest: &SourceManifest) -> BTreeMap<&str, &RepositoryDefinition> {
    manifest
        .repos
        .iter()
        .map(|repo| (repo.name.as_str(), repo))
        .collect()
}

pub fn diff_manifests(old: &SourceManifest, new: &SourceManifest) -> ManifestChanges {
    let mut changes = ManifestChanges::default();

    if old.name != new.name {
        changes
            .identity
            .push(format!("Name changed from '{}' to '{}'", old.name, new.name));
    }
    if old.origin != new.origin {
        changes.identity.push(format!(
            "Origin changed from '{}' to '{}'",
            old.origin, new.origin
        ));
    }

    let old_origins = origins(old);
    let new_origins = origins(new);
    changes.required_permissions = new_origins
        .difference(&old_origins)
        .map(|o| o.to_string())
        .collect();
    changes.removed_permissions = old_origins
        .difference(&new_origins)
        .map(|o| format!("Origin permission removed: '{}'", o))
        .collect();

    let old_repos = repos_by_name(old);
    let new_repos = repos_by_name(new);
    for (name, new_repo) in &new_repos {
        let Some(old_repo) = old_repos.get(name) else {
            changes
                .repositories
                .push(format!("New repository added: '{}'", name));
            continue;
        };
        let fields = [
            ("URL", &old_repo.url, &new_repo.url),
            ("build command", &old_repo.build, &new_repo.build),
            ("executable path", &old_repo.executable, &new_repo.executable),
        ];
        for (field, before, after) in fields {
            if before != after {
                changes.repositories.push(format!(
                    "Repository '{}' {} changed from '{}' to '{}'",
                    name, field, before, after
                ));
            }
        }
    }
    for name in old_repos.keys().filter(|name| !new_repos.contains_key(*name)) {
        changes
            .repositories
            .push(format!("Repository removed: '{}'", name));
    }

    changes
}

/// Every repository of a fetched manifest must pass its own trust policy.
pub fn validate_fetched(manifest: &SourceManifest) -> Result<(), GetgitError> {
    for repo in &manifest.repos {
        permissions::validate(manifest, repo, &normalize_url(&repo.url))?;
    }
    Ok(())
}

/// A fetched manifest that differs from the local file and passed validation.
#[derive(Debug)]
pub struct PendingUpdate {
    pub file_path: PathBuf,
    pub content: String,
    pub changes: ManifestChanges,
}

impl PendingUpdate {
    /// Replaces the manifest file with the fetched bytes in one rename.
    pub fn apply(&self) -> Result<()> {
        let dir = self
            .file_path
            .parent()
            .ok_or_else(|| anyhow!("{} has no parent directory", self.file_path.display()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(self.content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.file_path)
            .with_context(|| format!("Could not replace {}", self.file_path.display()))?;
        Ok(())
    }
}

pub async fn fetch_manifest(client: &reqwest::Client, origin: &str) -> Result<String> {
    tracing::debug!("Fetching source from {}", origin);
    let response = client
        .get(origin)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", origin))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to fetch {}: HTTP {}",
            origin,
            response.status()
        ));
    }
    Ok(response.text().await?)
}

/// Compares fetched manifest text against the local manifest.
/// `Ok(None)` when nothing changed.
pub fn prepare_update(local: &SourceManifest, content: String) -> Result<Option<PendingUpdate>> {
    let fetched = SourceManifest::from_yaml(&content, &local.file_path)?;
    let changes = diff_manifests(local, &fetched);
    if changes.is_empty() {
        return Ok(None);
    }
    validate_fetched(&fetched).context("Permission validation failed")?;

    Ok(Some(PendingUpdate {
        file_path: local.file_path.clone(),
        content,
        changes,
    }))
}

/// What one `update` run did across all manifests.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub applied: usize,
    /// `(source name, error)` for every manifest that could not be refreshed.
    pub failed: Vec<(String, String)>,
}

/// Refreshes every manifest that declares an origin. A manifest that fails
/// is reported and the remaining ones are still checked.
pub async fn update_sources(
    catalog: &Catalog,
    options: UpdateOptions,
    prompt: &dyn Disambiguator,
    reporter: &Reporter,
) -> Result<UpdateReport> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("getgit/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut report = UpdateReport::default();
    for manifest in catalog.manifests() {
        match update_source(&client, manifest, options, prompt, reporter).await {
            Ok(true) => report.applied += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::debug!("Update of source {} failed: {:?}", manifest.name(), e);
                reporter.failure(&format!(
                    "Error updating source '{}': {:#}",
                    manifest.name(),
                    e
                ));
                report
                    .failed
                    .push((manifest.name().to_string(), format!("{:#}", e)));
            }
        }
    }
    Ok(report)
}

/// Whether the manifest file was rewritten.
async fn update_source(
    client: &reqwest::Client,
    manifest: &SourceManifest,
    options: UpdateOptions,
    prompt: &dyn Disambiguator,
    reporter: &Reporter,
) -> Result<bool> {
    if manifest.origin().trim().is_empty() {
        reporter.success(&format!(
            "Source '{}' has no origin, skipping",
            manifest.name()
        ));
        return Ok(false);
    }

    reporter.start_stage(&format!("Checking source '{}'", manifest.name()));
    let content = fetch_manifest(client, manifest.origin()).await?;
    let pending = prepare_update(manifest, content)?;
    reporter.stop();

    let Some(pending) = pending else {
        reporter.success(&format!("No changes in source '{}'", manifest.name()));
        return Ok(false);
    };

    reporter.success(&format!("Changes in source '{}':", manifest.name()));
    for line in pending.changes.lines() {
        reporter.info(&format!("  - {}", line));
    }

    if options.dry_run {
        reporter.success(&format!(
            "Changes would be applied to source '{}'",
            manifest.name()
        ));
        return Ok(false);
    }

    if !options.force
        && pending.changes.needs_approval()
        && !prompt.confirm("Do you want to apply these changes?")?
    {
        reporter.success(&format!(
            "Changes to source '{}' skipped",
            manifest.name()
        ));
        return Ok(false);
    }

    pending.apply()?;
    reporter.success(&format!("Source '{}' updated", manifest.name()));
    Ok(true)
}
