use crate::error::GetgitError;
use crate::sources::{RepositoryDefinition, SourceManifest};

/// Origin trusted when a manifest declares no origin restriction at all.
pub const DEFAULT_TRUSTED_PREFIX: &str = "https://github.com/";

/// Origins declared across all permission entries, empty strings dropped.
fn declared_origins(manifest: &SourceManifest) -> impl Iterator<Item = &str> {
    manifest
        .permissions
        .iter()
        .flat_map(|perm| perm.origins.iter())
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
}

/// Whether `url` may be cloned under `manifest`'s trust policy.
///
/// A manifest with at least one declared origin is restricted: the URL must
/// contain one of them. Otherwise only GitHub HTTPS URLs are trusted.
pub fn is_origin_allowed(manifest: &SourceManifest, url: &str) -> bool {
    let mut origins = declared_origins(manifest).peekable();
    if origins.peek().is_none() {
        return url.starts_with(DEFAULT_TRUSTED_PREFIX);
    }
    origins.any(|origin| url.contains(origin))
}

/// Rejects `repo` when its (already normalised) `url` is not allowed.
pub fn validate(
    manifest: &SourceManifest,
    repo: &RepositoryDefinition,
    url: &str,
) -> Result<(), GetgitError> {
    if is_origin_allowed(manifest, url) {
        Ok(())
    } else {
        Err(GetgitError::PermissionDenied {
            tool: repo.name.clone(),
            url: url.to_string(),
            source_name: manifest.name.clone(),
        })
    }
}
