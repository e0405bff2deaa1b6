mod cli;
mod completion;
mod config;
mod engine;
mod error;
mod index;
mod load;
mod marker;
mod oracle;
mod output;
mod permissions;
mod prompt;
mod runner;
mod sources;
mod types;
mod update;
mod vcs;


use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use config::{load_config, normalize_key, save_config};
use console::style;
use engine::ToolLifecycleEngine;
use error::GetgitError;
use index::{JsonToolIndex, ToolIndex};
use load::LoadFile;
use marker::{requested_train, MarkerStore};
use oracle::VersionOracle;
use output::Reporter;
use prompt::ConsolePrompt;
use runner::ShellRunner;
use sources::{normalize_url, Catalog};
use std::path::{Path, PathBuf};
use types::{GetgitConfig, GetgitSettings, InstallOptions, UpdateTrain};
use update::{update_sources, UpdateOptions};
use vcs::GitCli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    let mut config = load_config()?;
    let verbose = cli.verbose > 0;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Version => {
            println!("getgit v{}", env!("CARGO_PKG_VERSION"));
        }

        Commands::Completion { shell } => {
            completion::write_completions(shell, &mut std::io::stdout());
        }

        Commands::Install {
            tool,
            edge,
            release,
            skip_build,
        } => {
            let options = InstallOptions {
                requested_train: requested_train(edge, release)?,
                skip_build,
            };
            let mut session = Session::open(&config)?;
            let root = session.root.clone();
            let mut engine = session.engine(verbose, reporter_for(verbose, quiet));
            match engine.install(&tool, &options) {
                Ok(outcome) => engine.reporter().success(&format!("{} {}", tool, outcome)),
                Err(e) => fail(engine.reporter(), e),
            }
            refresh_completion(&root);
        }

        Commands::Upgrade {
            tool,
            edge,
            release,
            skip_build,
        } => {
            let options = InstallOptions {
                requested_train: requested_train(edge, release)?,
                skip_build,
            };
            let mut session = Session::open(&config)?;
            let mut engine = session.engine(verbose, reporter_for(verbose, quiet));
            match tool {
                Some(tool) => match engine.upgrade(&tool, &options) {
                    Ok(outcome) => engine.reporter().success(&format!("{} {}", tool, outcome)),
                    Err(e) => fail(engine.reporter(), e),
                },
                None => {
                    let summary = engine.upgrade_all(&options)?;
                    if summary.total() == 0 {
                        engine.reporter().info("No tools installed yet.");
                    }
                    engine.reporter().info(&summary.to_string());
                    if summary.has_failures() {
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Uninstall { tool } => {
            let mut session = Session::open(&config)?;
            let root = session.root.clone();
            let mut engine = session.engine(verbose, reporter_for(verbose, quiet));
            match engine.uninstall(&tool) {
                Ok(()) => engine.reporter().success(&format!("{} removed", tool)),
                Err(e) => fail(engine.reporter(), e),
            }
            refresh_completion(&root);
        }

        Commands::Info {
            tool,
            installed,
            check,
        } => {
            let catalog = Catalog::load(&config::get_sources_dir()?)?;
            let root = config::get_root_dir(&config)?;
            match tool {
                Some(tool) => show_tool(&catalog, &root, &tool, check, verbose)?,
                None => list_tools(&catalog, &root, installed)?,
            }
        }

        Commands::Update {
            force,
            dry_run,
            index_only,
        } => {
            let sources_dir = config::get_sources_dir()?;
            let catalog = Catalog::load(&sources_dir)?;
            if catalog.is_empty() {
                return Err(anyhow!(
                    "No sources configured. Add source files to {}",
                    sources_dir.display()
                ));
            }

            let reporter = reporter_for(verbose, quiet);
            let mut failed = 0;
            if !index_only {
                let report = update_sources(
                    &catalog,
                    UpdateOptions { force, dry_run },
                    &ConsolePrompt::new(),
                    &reporter,
                )
                .await?;
                tracing::info!("{} source file(s) rewritten", report.applied);
                failed = report.failed.len();
            }

            if !dry_run || index_only {
                // Re-read: applied updates replaced files on disk.
                let catalog = Catalog::load(&sources_dir)?;
                let index = JsonToolIndex::new(config::get_index_file_path()?);
                let count = index.rebuild(&catalog)?;
                reporter.success(&format!("Tool index updated ({} tools)", count));
                refresh_completion(&config::get_root_dir(&config)?);
            }

            if failed > 0 {
                return Err(anyhow!("{} source(s) could not be updated", failed));
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Get { key } => {
                if let Some(key) = key {
                    let key = normalize_key(&key);
                    match key.as_str() {
                        "root" => println!("{}", config.settings.root),
                        _ => return Err(unknown_setting(&key)),
                    }
                } else {
                    println!("--- getgit Settings ---");
                    println!("  root: {}", config.settings.root);
                }
            }
            ConfigAction::Set { args } => {
                let (key, value) = if args.len() == 1 {
                    args[0]
                        .split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .ok_or_else(|| {
                            anyhow!("Invalid format. Use 'key=value' or 'key value'.")
                        })?
                } else {
                    (args[0].clone(), args[1..].join(" "))
                };

                let key = normalize_key(&key);
                match key.as_str() {
                    "root" => {
                        config.settings.root = value.clone();
                        save_config(&config)?;
                        tracing::info!("Setting '{}' updated to '{}'", key, value);
                    }
                    _ => return Err(unknown_setting(&key)),
                }
            }
            ConfigAction::Unset { key } => {
                let key = normalize_key(&key);
                match key.as_str() {
                    "root" => {
                        config.settings.root = GetgitSettings::default().root;
                        save_config(&config)?;
                        tracing::info!("Setting '{}' unset", key);
                    }
                    _ => return Err(unknown_setting(&key)),
                }
            }
            ConfigAction::Show { format } => show_config(&config, &format)?,
        },
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

/// Collaborators one engine invocation borrows from.
struct Session {
    root: PathBuf,
    catalog: Catalog,
    git: GitCli,
    runner: ShellRunner,
    load_file: LoadFile,
    prompt: ConsolePrompt,
}

impl Session {
    fn open(config: &GetgitConfig) -> Result<Self> {
        let sources_dir = config::get_sources_dir()?;
        let catalog = Catalog::load(&sources_dir)?;
        if catalog.is_empty() {
            tracing::warn!(
                "No sources configured. Add source files to {}",
                sources_dir.display()
            );
        }

        let root = config::get_root_dir(config)?;
        let index = JsonToolIndex::new(config::get_index_file_path()?);
        if let Err(e) = index.ensure(&catalog) {
            tracing::warn!("Could not build tool index: {:#}", e);
        }

        Ok(Self {
            load_file: LoadFile::open(&root)?,
            root,
            catalog,
            git: GitCli::default(),
            runner: ShellRunner,
            prompt: ConsolePrompt::new(),
        })
    }

    fn engine(&mut self, verbose: bool, reporter: Reporter) -> ToolLifecycleEngine<'_> {
        self.git.verbose = verbose;
        ToolLifecycleEngine::new(
            self.root.clone(),
            &self.catalog,
            &self.git,
            &self.runner,
            &mut self.load_file,
            &self.prompt,
            reporter,
        )
    }
}

fn refresh_completion(root: &Path) {
    if let Err(e) = completion::refresh_bash_completion(root) {
        tracing::warn!("Failed to update completion script: {:#}", e);
    }
}

/// `-q` keeps failures and drops everything else.
fn reporter_for(verbose: bool, quiet: bool) -> Reporter {
    if quiet {
        Reporter::quiet()
    } else {
        Reporter::new(verbose)
    }
}

fn fail(reporter: &Reporter, error: GetgitError) -> ! {
    tracing::debug!("{:?}", error);
    reporter.failure(&error.to_string());
    std::process::exit(1);
}

fn unknown_setting(key: &str) -> anyhow::Error {
    anyhow!(
        "'{}' is not a valid configuration setting. Valid settings: root",
        key
    )
}

fn show_config(config: &GetgitConfig, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        "yaml" => print!("{}", serde_yaml::to_string(config)?),
        "plain" => println!("root: {}", config.settings.root),
        other => {
            return Err(anyhow!(
                "Unknown format '{}'. Use json, yaml or plain.",
                other
            ))
        }
    }
    Ok(())
}

fn list_tools(catalog: &Catalog, root: &Path, installed_only: bool) -> Result<()> {
    let index = JsonToolIndex::new(config::get_index_file_path()?);
    index.ensure(catalog)?;
    let markers = MarkerStore::new(root);

    let mut shown = 0;
    for repo in index.list_all()? {
        let installed = root.join(&repo.name).is_dir()
            && matches!(markers.read(&repo.name), Ok(Some(record)) if record.source_name == repo.source_name);
        if installed_only && !installed {
            continue;
        }

        shown += 1;
        if installed {
            println!(
                "{} {} ({}) [installed]",
                style("*").green(),
                style(&repo.name).green().bold(),
                repo.source_name
            );
        } else {
            println!("  {} ({})", repo.name, repo.source_name);
        }
    }

    if shown == 0 {
        if installed_only {
            println!("No tools installed yet.");
        } else {
            println!("No tools available. Add source files and run `getgit update`.");
        }
    }
    Ok(())
}

fn show_tool(catalog: &Catalog, root: &Path, tool: &str, check: bool, verbose: bool) -> Result<()> {
    let index = JsonToolIndex::new(config::get_index_file_path()?);
    index.ensure(catalog)?;
    let matches = index.find_by_name(tool)?;
    // Installed copies live under the catalog's spelling of the name.
    let installed_name = std::iter::once(tool)
        .chain(matches.iter().map(|repo| repo.name.as_str()))
        .find(|name| root.join(name).exists())
        .unwrap_or(tool)
        .to_string();
    let tool = installed_name.as_str();
    let work_dir = root.join(tool);
    if matches.is_empty() && !work_dir.exists() {
        return Err(GetgitError::NotFound {
            tool: tool.to_string(),
        }
        .into());
    }

    for repo in &matches {
        println!("name:           {}", repo.name);
        println!("repository url: {}", normalize_url(&repo.url));
        println!("source name:    {}", repo.source_name);
        if !repo.build.is_empty() {
            println!("build command:  {}", repo.build);
        }
        if !repo.executable.is_empty() {
            println!("executable:     {}", repo.executable);
        }
        println!("source file:    {}", repo.source_file);
        println!();
    }

    if !work_dir.exists() {
        println!("{} is not installed", tool);
        return Ok(());
    }

    let git = GitCli::new(verbose);
    let oracle = VersionOracle::new(&git);
    let markers = MarkerStore::new(root);
    let record = markers.read(tool)?;

    println!("installed at:   {}", work_dir.display());
    match &record {
        Some(record) => {
            println!("installed from: {}", record.source_name);
            println!("update train:   {}", record.update_train);
        }
        None => println!("installed from: unknown (no marker)"),
    }

    let load_file = LoadFile::open(root)?;
    if let Some(alias) = load_file.aliases().get(tool) {
        println!("shell alias:    {} -> {}", tool, alias);
    }
    if let Some(entry) = load_file.sources().get(tool) {
        println!("load entry:     {}", entry);
    }
    if load_file.aliases().contains_key(tool) || load_file.sources().contains_key(tool) {
        println!("load file:      {}", load_file.path().display());
    }

    if !check {
        let reference = oracle
            .current_ref(&work_dir)
            .map_err(|source| GetgitError::Vcs {
                tool: tool.to_string(),
                source,
            })?;
        println!("current ref:    {}", reference);
        return Ok(());
    }

    let state = oracle
        .inspect(&work_dir)
        .map_err(|source| GetgitError::Vcs {
            tool: tool.to_string(),
            source,
        })?;
    println!("current ref:    {}", state.current_ref);
    println!(
        "latest tag:     {}",
        state.latest_tag.as_deref().unwrap_or("none")
    );
    println!(
        "edge moved:     {}",
        if state.remote_head_differs_from_local {
            "yes"
        } else {
            "no"
        }
    );

    let train = record
        .map(|r| r.update_train)
        .unwrap_or(UpdateTrain::Release);
    let update_available = match train {
        UpdateTrain::Edge => state.remote_head_differs_from_local,
        UpdateTrain::Release if !state.has_tags => state.remote_head_differs_from_local,
        UpdateTrain::Release => {
            state.latest_tag.as_deref() != Some(state.current_ref.as_str())
        }
    };
    if update_available {
        println!("{} update available on the {} train", style("!").yellow(), train);
    } else {
        println!("{} up to date on the {} train", style("✓").green(), train);
    }
    Ok(())
}
