//! The `.load` file users source from their shell profile.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const LOAD_FILE_NAME: &str = ".load";
const LOAD_FILE_HEADER: &str = "# This file is managed by getgit. Do not edit manually.\n\
# It contains aliases for binary tools and source commands for non-binary tools.\n";

static ROOT_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.(?:getgit|GetGit)\.(?:root|Root)\s*\}\}")
        .expect("root template pattern is valid")
});

/// Receives the shell entries of installed tools. Written to, never read by the engine.
pub trait AliasRegistry {
    fn register_alias(&mut self, tool: &str, executable: &Path) -> Result<()>;
    fn register_load_entry(&mut self, tool: &str, marker: &Path) -> Result<()>;
    /// Drops only the `source` line; the alias stays.
    fn unregister_load_entry(&mut self, tool: &str) -> Result<()>;
    fn unregister(&mut self, tool: &str) -> Result<()>;
}

#[derive(Debug)]
pub struct LoadFile {
    path: PathBuf,
    aliases: BTreeMap<String, String>,
    sources: BTreeMap<String, String>,
}

impl LoadFile {
    /// Opens `<root>/.load`, picking up entries already in it.
    pub fn open(root: &Path) -> Result<Self> {
        let mut load = Self {
            path: root.join(LOAD_FILE_NAME),
            aliases: BTreeMap::new(),
            sources: BTreeMap::new(),
        };

        if load.path.exists() {
            let content = fs::read_to_string(&load.path)
                .with_context(|| format!("Failed to read load file {}", load.path.display()))?;
            load.parse(&content);
        }
        Ok(load)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn sources(&self) -> &BTreeMap<String, String> {
        &self.sources
    }

    fn parse(&mut self, content: &str) {
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("alias ") {
                if let Some((name, path)) = rest.split_once('=') {
                    self.aliases
                        .insert(name.trim().to_string(), shell_unquote(path));
                }
            } else if let Some(rest) = line.strip_prefix("source ") {
                let (path, comment) = match rest.rsplit_once(" # ") {
                    Some((path, comment)) => (path, Some(comment.trim())),
                    None => (rest, None),
                };
                let path = shell_unquote(path);
                let path = path.as_str();
                let tool = match comment {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => Path::new(path)
                        .parent()
                        .and_then(|p| p.file_name())
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                };
                if !tool.is_empty() {
                    self.sources.insert(tool, path.to_string());
                }
            }
        }
    }

    pub fn render(&self) -> String {
        let mut content = String::from(LOAD_FILE_HEADER);
        content.push('\n');
        for (name, path) in &self.aliases {
            content.push_str(&format!("alias {}={}\n", name, shell_quote(path)));
        }
        for (name, path) in &self.sources {
            content.push_str(&format!("source {} # {}\n", shell_quote(path), name));
        }
        content
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.render())
            .with_context(|| format!("Failed to write load file {}", self.path.display()))
    }
}

impl AliasRegistry for LoadFile {
    fn register_alias(&mut self, tool: &str, executable: &Path) -> Result<()> {
        self.aliases
            .insert(tool.to_string(), executable.to_string_lossy().to_string());
        self.save()
    }

    fn register_load_entry(&mut self, tool: &str, marker: &Path) -> Result<()> {
        self.sources
            .insert(tool.to_string(), marker.to_string_lossy().to_string());
        self.save()
    }

    fn unregister_load_entry(&mut self, tool: &str) -> Result<()> {
        if self.sources.remove(tool).is_some() {
            self.save()?;
        }
        Ok(())
    }

    fn unregister(&mut self, tool: &str) -> Result<()> {
        let removed_alias = self.aliases.remove(tool).is_some();
        let removed_source = self.sources.remove(tool).is_some();
        if removed_alias || removed_source {
            self.save()?;
        }
        Ok(())
    }
}

/// Substitutes `{{ .getgit.root }}` in a load command.
pub fn render_load_command(command: &str, root: &Path) -> String {
    ROOT_TEMPLATE
        .replace_all(command, regex::NoExpand(&root.to_string_lossy()))
        .to_string()
}

/// Single-quotes `value` for the shell; embedded quotes become `'\''`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Reverses [`shell_quote`]. Double-quoted values from older files are accepted too.
fn shell_unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace(r"'\''", "'");
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let mut out = String::new();
        let mut chars = value[1..value.len() - 1].chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.extend(chars.next()),
                c => out.push(c),
            }
        }
        return out;
    }
    value.to_string()
}
