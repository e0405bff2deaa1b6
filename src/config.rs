use crate::types::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub const APP_NAME: &str = "getgit";
pub const SOURCES_DIR_NAME: &str = "sources.d";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const INDEX_FILE_NAME: &str = "index.json";

pub fn get_config_dir() -> Result<PathBuf> {
    let path = match std::env::var_os("GETGIT_CONFIG_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(APP_NAME),
    };
    fs::create_dir_all(&path)
        .with_context(|| format!("Could not create config directory {}", path.display()))?;
    Ok(path)
}

pub fn get_sources_dir() -> Result<PathBuf> {
    let path = get_config_dir()?.join(SOURCES_DIR_NAME);
    tracing::debug!("Sources directory: {}", path.display());
    fs::create_dir_all(&path)
        .with_context(|| format!("Could not create sources directory {}", path.display()))?;
    Ok(path)
}

pub fn get_cache_dir() -> Result<PathBuf> {
    let path = match std::env::var_os("GETGIT_CACHE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join(APP_NAME),
    };
    fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn get_index_file_path() -> Result<PathBuf> {
    Ok(get_cache_dir()?.join(INDEX_FILE_NAME))
}

pub fn get_config_file_path() -> Result<PathBuf> {
    let path = get_config_dir()?.join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

/// Directory holding one working copy per installed tool.
pub fn get_root_dir(config: &GetgitConfig) -> Result<PathBuf> {
    let path = PathBuf::from(&config.settings.root);
    tracing::debug!("Root directory: {}", path.display());
    fs::create_dir_all(&path)
        .with_context(|| format!("Could not create root directory {}", path.display()))?;
    Ok(path)
}

pub fn load_config() -> Result<GetgitConfig> {
    let config_path = get_config_file_path()?;

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Could not read config file at {}", config_path.display()))?;
        serde_json::from_str(&content).with_context(|| "Could not parse config file as JSON")?
    } else {
        GetgitConfig::default()
    };

    if let Ok(root) = std::env::var("GETGIT_ROOT") {
        config.settings.root = root;
    }

    Ok(config)
}

pub fn save_config(config: &GetgitConfig) -> Result<()> {
    let config_path = get_config_file_path()?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)
        .with_context(|| format!("Could not write config file at {}", config_path.display()))?;
    Ok(())
}

pub fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c.is_ascii_uppercase() && i > 0 {
                format!("_{}", c.to_ascii_lowercase())
            } else {
                c.to_ascii_lowercase().to_string()
            }
        })
        .collect()
}
