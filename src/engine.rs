//! Install, upgrade and uninstall decisions for working copies under the root.

use crate::error::{GetgitError, VcsError};
use crate::load::{render_load_command, AliasRegistry};
use crate::marker::{resolve_update_train, MarkerStore, TrainResolution};
use crate::oracle::VersionOracle;
use crate::output::Reporter;
use crate::permissions;
use crate::prompt::Disambiguator;
use crate::runner::CommandRunner;
use crate::sources::{normalize_url, Catalog, RepoMatch};
use crate::types::{InstallOptions, InstallOutcome, UpdateTrain, UpgradeSummary};
use crate::vcs::VersionControlClient;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VCS_DIR_NAME: &str = ".git";

pub struct ToolLifecycleEngine<'a> {
    root: PathBuf,
    catalog: &'a Catalog,
    vcs: &'a dyn VersionControlClient,
    runner: &'a dyn CommandRunner,
    registry: &'a mut dyn AliasRegistry,
    prompt: &'a dyn Disambiguator,
    markers: MarkerStore,
    reporter: Reporter,
}

impl<'a> ToolLifecycleEngine<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        catalog: &'a Catalog,
        vcs: &'a dyn VersionControlClient,
        runner: &'a dyn CommandRunner,
        registry: &'a mut dyn AliasRegistry,
        prompt: &'a dyn Disambiguator,
        reporter: Reporter,
    ) -> Self {
        let root = root.into();
        Self {
            markers: MarkerStore::new(&root),
            root,
            catalog,
            vcs,
            runner,
            registry,
            prompt,
            reporter,
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn work_dir(&self, tool: &str) -> PathBuf {
        self.root.join(tool)
    }

    /// Installs `tool`, or brings an existing working copy in line with the
    /// requested train. Re-running on an up-to-date tool builds nothing.
    pub fn install(
        &mut self,
        tool: &str,
        options: &InstallOptions,
    ) -> Result<InstallOutcome, GetgitError> {
        let catalog = self.catalog;
        let matches = catalog.find_by_name(tool);
        if matches.is_empty() {
            return Err(GetgitError::NotFound {
                tool: tool.to_string(),
            });
        }

        let existing = self.installed_name(tool)?;
        let record = match &existing {
            Some(name) => self.markers.read(name)?,
            None => None,
        };

        // A recorded source pins the selection; never re-select silently.
        let selected = match &record {
            Some(record) => matches
                .iter()
                .copied()
                .find(|m| m.manifest.name == record.source_name)
                .ok_or_else(|| GetgitError::StaleProvenance {
                    tool: tool.to_string(),
                    source_name: record.source_name.clone(),
                })?,
            None => self.select(tool, &matches)?,
        };

        let url = normalize_url(&selected.repo.url);
        permissions::validate(selected.manifest, selected.repo, &url)?;

        let load_command = render_load_command(&selected.repo.load, &self.root);

        // Directory, marker and shell entries all go by one name per tool.
        let Some(tool) = existing.as_deref() else {
            let name = selected.repo.name.as_str();
            return self.clone_and_install(name, selected, &url, &load_command, options);
        };
        let work_dir = self.work_dir(tool);

        let vcs_err = |source: VcsError| GetgitError::Vcs {
            tool: tool.to_string(),
            source,
        };
        let oracle = VersionOracle::new(self.vcs);

        let recorded = record.as_ref().map(|r| r.update_train);
        let has_tags = match (options.requested_train, recorded) {
            (Some(UpdateTrain::Release), _) | (None, None) => {
                Some(!self.vcs.list_tags(&work_dir).map_err(vcs_err)?.is_empty())
            }
            _ => None,
        };
        let resolution = resolve_update_train(options.requested_train, recorded, has_tags);
        self.report_fallback(tool, resolution);

        let load_changed = record
            .as_ref()
            .is_some_and(|r| r.load_command.trim() != load_command.trim());

        let before = oracle.current_ref(&work_dir).map_err(vcs_err)?;

        if let Some(previous) = recorded.filter(|train| *train != resolution.train) {
            tracing::info!(
                "Switching {} from {} to {} train",
                tool,
                previous,
                resolution.train
            );
            // Persist the new train first so an interrupted checkout is retried on it.
            self.markers.write(
                tool,
                selected.manifest.name(),
                resolution.train.as_str(),
                &load_command,
            )?;

            self.reporter.start_stage(&format!(
                "Switching {} to the {} train",
                tool, resolution.train
            ));
            oracle
                .move_to_train(&work_dir, resolution.train)
                .map_err(vcs_err)?;
            let after = oracle.current_ref(&work_dir).map_err(vcs_err)?;

            if before != after {
                self.rebuild_or_restore(tool, selected, &work_dir, &before, &load_command, options)?;
            } else if load_changed {
                self.sync_load_entry(tool, &load_command)?;
            }
            self.reporter.stop();

            return Ok(InstallOutcome::SwitchedTrain {
                from: previous,
                to: resolution.train,
                reference: after,
            });
        }

        // No marker on an existing working copy means an earlier install
        // stopped before finishing; build and register regardless.
        let incomplete = record.is_none();
        if incomplete {
            tracing::info!("{} has no marker, completing its installation", tool);
        }

        self.reporter
            .start_stage(&format!("Checking {} for updates", tool));
        let newer = oracle
            .has_newer(&work_dir, resolution.train)
            .map_err(vcs_err)?;

        let after = if newer {
            self.reporter.start_stage(&format!("Updating {}", tool));
            oracle
                .move_to_train(&work_dir, resolution.train)
                .map_err(vcs_err)?;
            oracle.current_ref(&work_dir).map_err(vcs_err)?
        } else {
            tracing::debug!("No update available for {}", tool);
            before.clone()
        };

        let changed = before != after;
        if changed || incomplete {
            self.rebuild_or_restore(tool, selected, &work_dir, &before, &load_command, options)?;
        } else if load_changed {
            self.sync_load_entry(tool, &load_command)?;
        }

        self.markers.write(
            tool,
            selected.manifest.name(),
            resolution.train.as_str(),
            &load_command,
        )?;
        self.reporter.stop();

        Ok(if incomplete {
            InstallOutcome::Installed {
                train: resolution.train,
                reference: after,
            }
        } else if changed {
            InstallOutcome::Updated {
                train: resolution.train,
                from: before,
                to: after,
            }
        } else {
            InstallOutcome::UpToDate {
                train: resolution.train,
                reference: after,
            }
        })
    }

    /// Same as [`install`](Self::install) but refuses tools that are not installed.
    pub fn upgrade(
        &mut self,
        tool: &str,
        options: &InstallOptions,
    ) -> Result<InstallOutcome, GetgitError> {
        match self.installed_name(tool)? {
            Some(name) => self.install(&name, options),
            None => Err(GetgitError::NotInstalled {
                tool: tool.to_string(),
            }),
        }
    }

    /// Upgrades every installed tool in name order. A failing tool is recorded
    /// and the loop moves on.
    pub fn upgrade_all(&mut self, options: &InstallOptions) -> Result<UpgradeSummary, GetgitError> {
        let tools = self.installed_tools()?;
        tracing::info!("Upgrading {} installed tool(s)", tools.len());

        let mut summary = UpgradeSummary::default();
        for tool in tools {
            match self.upgrade(&tool, options) {
                Ok(outcome) if outcome.changed() => {
                    self.reporter.success(&format!("{}: {}", tool, outcome));
                    summary.updated.push((tool, outcome));
                }
                Ok(outcome) => {
                    self.reporter.success(&format!("{}: {}", tool, outcome));
                    summary.skipped.push(tool);
                }
                Err(e) => {
                    tracing::debug!("Upgrade of {} failed: {:?}", tool, e);
                    self.reporter.failure(&format!("{}: {}", tool, e));
                    summary.failed.push((tool, e.to_string()));
                }
            }
        }
        Ok(summary)
    }

    /// Directories directly under the root that hold a git working copy, sorted.
    pub fn installed_tools(&self) -> Result<Vec<String>, GetgitError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut tools = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Err(GetgitError::io(path, e.into()));
                }
            };
            if entry.file_type().is_dir() && entry.path().join(VCS_DIR_NAME).exists() {
                tools.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(tools)
    }

    /// Removes the working copy (marker included) and its shell entries.
    pub fn uninstall(&mut self, tool: &str) -> Result<(), GetgitError> {
        let Some(name) = self.installed_name(tool)? else {
            return Err(GetgitError::NotInstalled {
                tool: tool.to_string(),
            });
        };
        let tool = name.as_str();
        let work_dir = self.work_dir(tool);

        self.reporter.start_stage(&format!("Removing {}", tool));
        fs::remove_dir_all(&work_dir).map_err(|e| GetgitError::io(&work_dir, e))?;
        self.registry
            .unregister(tool)
            .map_err(|source| GetgitError::Registration {
                tool: tool.to_string(),
                source,
            })?;
        self.reporter.stop();

        tracing::info!("Removed {}", work_dir.display());
        Ok(())
    }

    /// Directory name of an installed tool, matched case-insensitively.
    /// An exact match wins over a differently-cased one.
    fn installed_name(&self, tool: &str) -> Result<Option<String>, GetgitError> {
        let tools = self.installed_tools()?;
        let wanted = tool.to_lowercase();
        if let Some(name) = tools
            .iter()
            .find(|name| name.as_str() == tool)
            .or_else(|| tools.iter().find(|name| name.to_lowercase() == wanted))
        {
            return Ok(Some(name.clone()));
        }
        // A working copy whose clone never finished still occupies the name.
        Ok(self.work_dir(tool).exists().then(|| tool.to_string()))
    }

    fn select(
        &self,
        tool: &str,
        matches: &[RepoMatch<'a>],
    ) -> Result<RepoMatch<'a>, GetgitError> {
        if let [only] = matches {
            return Ok(*only);
        }

        tracing::debug!("{} is provided by {} sources", tool, matches.len());
        self.reporter.stop();
        let choice = self
            .prompt
            .choose(tool, matches)
            .map_err(|source| GetgitError::Prompt {
                tool: tool.to_string(),
                source,
            })?;

        match choice.and_then(|i| matches.get(i)) {
            Some(selected) => Ok(*selected),
            None => Err(GetgitError::MultipleMatches {
                tool: tool.to_string(),
                sources: matches
                    .iter()
                    .map(|m| m.manifest.name().to_string())
                    .collect(),
            }),
        }
    }

    fn clone_and_install(
        &mut self,
        tool: &str,
        selected: RepoMatch<'a>,
        url: &str,
        load_command: &str,
        options: &InstallOptions,
    ) -> Result<InstallOutcome, GetgitError> {
        let vcs_err = |source: VcsError| GetgitError::Vcs {
            tool: tool.to_string(),
            source,
        };
        let oracle = VersionOracle::new(self.vcs);
        let work_dir = self.work_dir(tool);

        self.reporter.start_stage(&format!("Cloning {}", url));
        self.vcs.clone_repo(url, &work_dir).map_err(vcs_err)?;

        let has_tags = !self.vcs.list_tags(&work_dir).map_err(vcs_err)?.is_empty();
        let resolution = resolve_update_train(options.requested_train, None, Some(has_tags));
        self.report_fallback(tool, resolution);

        // A fresh clone already sits on the default branch.
        if resolution.train == UpdateTrain::Release {
            self.reporter.start_stage("Checking out the latest release");
            oracle
                .move_to_train(&work_dir, UpdateTrain::Release)
                .map_err(vcs_err)?;
        }
        let reference = oracle.current_ref(&work_dir).map_err(vcs_err)?;

        self.build_and_register(tool, selected, &work_dir, load_command, options)?;

        self.markers.write(
            tool,
            selected.manifest.name(),
            resolution.train.as_str(),
            load_command,
        )?;
        self.reporter.stop();

        Ok(InstallOutcome::Installed {
            train: resolution.train,
            reference,
        })
    }

    fn build_and_register(
        &mut self,
        tool: &str,
        selected: RepoMatch<'a>,
        work_dir: &Path,
        load_command: &str,
        options: &InstallOptions,
    ) -> Result<(), GetgitError> {
        let build = selected.repo.build.trim();
        if options.skip_build {
            tracing::info!("Skipping build of {}", tool);
        } else if !build.is_empty() {
            self.reporter.start_stage(&format!("Building {}", tool));
            let result = self
                .runner
                .run(build, work_dir)
                .map_err(|e| GetgitError::Build {
                    tool: tool.to_string(),
                    status: -1,
                    output: format!("{:#}", e),
                })?;
            self.reporter.command_output(&result.output);
            if !result.success() {
                return Err(GetgitError::Build {
                    tool: tool.to_string(),
                    status: result.status,
                    output: result.output,
                });
            }
        }

        let registration_err = |source| GetgitError::Registration {
            tool: tool.to_string(),
            source,
        };

        let executable = selected.repo.executable.trim();
        if !executable.is_empty() {
            self.registry
                .register_alias(tool, &work_dir.join(executable))
                .map_err(registration_err)?;
        }
        self.sync_load_entry(tool, load_command)
    }

    /// Builds after a move; on failure puts the working copy back on `before`
    /// so the next run still sees the update as pending.
    fn rebuild_or_restore(
        &mut self,
        tool: &str,
        selected: RepoMatch<'a>,
        work_dir: &Path,
        before: &str,
        load_command: &str,
        options: &InstallOptions,
    ) -> Result<(), GetgitError> {
        let err = match self.build_and_register(tool, selected, work_dir, load_command, options) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if self.vcs.current_ref(work_dir).ok().as_deref() != Some(before) {
            tracing::info!("Restoring {} to {} after failed build", tool, before);
            if let Err(e) = self.vcs.checkout(work_dir, before) {
                tracing::warn!("Could not restore {} to {}: {}", tool, before, e);
            }
        }
        Err(err)
    }

    /// Sources the marker from the load file when the tool has a load command,
    /// and drops the entry when it has none.
    fn sync_load_entry(&mut self, tool: &str, load_command: &str) -> Result<(), GetgitError> {
        let result = if load_command.trim().is_empty() {
            self.registry.unregister_load_entry(tool)
        } else {
            let marker = self.markers.path(tool);
            self.registry.register_load_entry(tool, &marker)
        };
        result.map_err(|source| GetgitError::Registration {
            tool: tool.to_string(),
            source,
        })
    }

    fn report_fallback(&self, tool: &str, resolution: TrainResolution) {
        if resolution.fallback {
            tracing::warn!("{} has no tags, following the edge train", tool);
            self.reporter
                .info(&format!("{} has no release tags, using the edge train", tool));
        }
    }
}
