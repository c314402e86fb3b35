//! Terminal styling for `ajwt` output.

use colored::Colorize;

/// Styles shared by every subcommand.
pub(crate) struct Theme;

impl Theme {
    /// A bold section title.
    pub(crate) fn header(text: &str) -> String {
        text.bold().cyan().to_string()
    }

    /// An operation that completed.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {text}", "✓".green().bold())
    }

    /// A request the protocol refused, shown as an expected outcome.
    pub(crate) fn rejected(text: &str) -> String {
        format!("{} {text}", "⊘".magenta().bold())
    }

    /// A failure that ends the command.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "error:".red().bold(), text.red())
    }

    /// Something the user should act on.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "warning:".yellow().bold(), text.yellow())
    }

    /// Context that needs no action.
    pub(crate) fn note(text: &str) -> String {
        format!("{} {text}", "·".blue())
    }

    /// An aligned `label: value` line.
    pub(crate) fn field(label: &str, value: &str) -> String {
        format!("  {:<14}{value}", format!("{label}:").dimmed())
    }
}
