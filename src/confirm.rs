use console::{Term, style};
use std::io::{self, BufRead};

/// Human readable description of a destructive action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSummary {
    pub title: String,
    pub lines: Vec<(&'static str, String)>,
}

impl ActionSummary {
    pub fn new(title: impl Into<String>) -> Self {
        ActionSummary {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, key: &'static str, value: impl ToString) -> Self {
        self.lines.push((key, value.to_string()));
        self
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Gate in front of every destructive operation.
///
/// Returning `false` must leave the cluster untouched.
pub trait Confirm: Send + Sync {
    fn confirm(&self, summary: &ActionSummary) -> io::Result<bool>;
}

/// Asks the operator on the terminal.
///
/// The summary goes to stderr; the answer is read from stdin so a redirected
/// stderr does not turn every prompt into a silent "no".
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, summary: &ActionSummary) -> io::Result<bool> {
        let term = Term::stderr();
        term.write_line(&style(&summary.title).bold().to_string())?;
        for (key, value) in &summary.lines {
            term.write_line(&format!("  {}: {}", key, style(value).bold()))?;
        }
        term.write_str("Correct? (y/n) ")?;
        read_answer(&mut io::stdin().lock())
    }
}

/// One line from `input`; end of input counts as "no".
fn read_answer(input: &mut impl BufRead) -> io::Result<bool> {
    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        log::warn!("No answer on stdin; pass --yes to run unattended");
        return Ok(false);
    }
    Ok(is_affirmative(&answer))
}

/// Accepts everything; backs `--yes` and the steps of an already confirmed reindex
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, summary: &ActionSummary) -> io::Result<bool> {
        log::info!("{} (confirmed)", summary.title);
        Ok(true)
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
