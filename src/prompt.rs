use crate::sources::RepoMatch;
use anyhow::{Context, Result};
use console::{style, Term};

/// Resolves choices the engine must not make on its own.
pub trait Disambiguator {
    /// Index into `matches` of the chosen entry, `None` if the user declined.
    fn choose(&self, tool: &str, matches: &[RepoMatch<'_>]) -> Result<Option<usize>>;

    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Asks on the controlling terminal.
#[derive(Debug, Clone)]
pub struct ConsolePrompt {
    term: Term,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Disambiguator for ConsolePrompt {
    fn choose(&self, tool: &str, matches: &[RepoMatch<'_>]) -> Result<Option<usize>> {
        if !self.term.is_term() {
            tracing::warn!("Cannot ask which source provides '{}': not a terminal", tool);
            return Ok(None);
        }

        self.term.write_line(&format!(
            "Multiple sources provide {}:",
            style(tool).bold()
        ))?;
        for (i, m) in matches.iter().enumerate() {
            self.term.write_line(&format!(
                "  {}. {} ({})",
                i + 1,
                style(m.manifest.name()).cyan(),
                m.repo.url
            ))?;
        }
        self.term
            .write_str(&format!("Select a source [1-{}]: ", matches.len()))?;

        let answer = self.term.read_line().context("Could not read selection")?;
        Ok(parse_choice(&answer, matches.len()))
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        if !self.term.is_term() {
            return Ok(false);
        }
        self.term.write_str(&format!("{} [y/N]: ", question))?;
        let answer = self.term.read_line().context("Could not read answer")?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// 1-based answer to a 0-based index; anything else is a refusal.
fn parse_choice(answer: &str, count: usize) -> Option<usize> {
    match answer.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= count => Some(n - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("1", 2), Some(0));
        assert_eq!(parse_choice(" 2\n", 2), Some(1));
        assert_eq!(parse_choice("3", 2), None);
        assert_eq!(parse_choice("0", 2), None);
        assert_eq!(parse_choice("", 2), None);
        assert_eq!(parse_choice("default", 2), None);
    }
}
