//! Progress and status lines shown to the user.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Spinner,
    Verbose,
    Quiet,
}

#[derive(Debug)]
pub struct Reporter {
    mode: Mode,
    spinner: RefCell<Option<ProgressBar>>,
}

impl Reporter {
    /// Spinners when not verbose; plain stage lines and command output when verbose.
    pub fn new(verbose: bool) -> Self {
        Self {
            mode: if verbose { Mode::Verbose } else { Mode::Spinner },
            spinner: RefCell::new(None),
        }
    }

    /// Failures only.
    pub fn quiet() -> Self {
        Self {
            mode: Mode::Quiet,
            spinner: RefCell::new(None),
        }
    }

    pub fn start_stage(&self, stage: &str) {
        self.stop();
        match self.mode {
            Mode::Quiet => {}
            Mode::Verbose => eprintln!("{} {}", style("==>").blue().bold(), stage),
            Mode::Spinner => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.set_message(format!("{}...", stage));
                pb.enable_steady_tick(Duration::from_millis(100));
                *self.spinner.borrow_mut() = Some(pb);
            }
        }
    }

    pub fn stop(&self) {
        if let Some(pb) = self.spinner.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }

    /// Captured command output, echoed only when verbose.
    pub fn command_output(&self, output: &str) {
        if self.mode == Mode::Verbose && !output.trim().is_empty() {
            eprintln!("{}", output.trim_end());
        }
    }

    pub fn success(&self, message: &str) {
        self.stop();
        if self.mode != Mode::Quiet {
            println!("{} {}", style("✓").green(), message);
        }
    }

    pub fn failure(&self, message: &str) {
        self.stop();
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn info(&self, message: &str) {
        if self.mode == Mode::Quiet {
            return;
        }
        match self.spinner.borrow().as_ref() {
            Some(pb) => pb.println(message),
            None => println!("{}", message),
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop();
    }
}
