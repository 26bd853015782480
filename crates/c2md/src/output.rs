//! Colored terminal output utilities.

use console::{Style, Term};

/// Terminal output formatter.
///
/// Writes to stderr so stdout carries only Markdown. Quiet mode keeps
/// warnings and errors.
pub(crate) struct Output {
    term: Term,
    quiet: bool,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new(quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            quiet,
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        if !self.quiet {
            self.write(msg);
        }
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        if !self.quiet {
            self.write_styled(&self.green, msg);
        }
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        if !self.quiet {
            self.write_styled(&self.cyan_bold, msg);
        }
    }

    /// Print a warning message (yellow), even in quiet mode.
    pub(crate) fn warning(&self, msg: &str) {
        self.write_styled(&self.yellow, msg);
    }

    /// Print an error message (red), even in quiet mode.
    pub(crate) fn error(&self, msg: &str) {
        self.write_styled(&self.red, msg);
    }

    fn write_styled(&self, style: &Style, msg: &str) {
        self.write(&style.apply_to(msg).to_string());
    }

    // Write errors on stderr are ignored.
    fn write(&self, line: &str) {
        let _ = self.term.write_line(line);
    }
}
