//! Shared console output facility.
//!
//! All user-facing output of a `gen` invocation funnels through one
//! [`Console`] so concurrent writers never interleave partial lines. The
//! `--quiet` flag suppresses informational messages; diagnostics always
//! print.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use owo_colors::{OwoColorize, Stream};

/// Mutex-guarded stdout writer.
#[derive(Debug)]
pub struct Console {
    lock: Mutex<()>,
    quiet: bool,
}

impl Console {
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            lock: Mutex::new(()),
            quiet,
        }
    }

    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Print a diagnostic message verbatim. Never suppressed.
    pub fn print(&self, message: &str) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Output failures must not abort the gen command.
        drop(write!(io::stdout(), "{message}"));
        drop(io::stdout().flush());
    }

    /// Print an informational line, suppressed by `--quiet`.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.print(&format!("{message}\n"));
        }
    }

    /// Print the green completion marker followed by `stats`.
    pub fn done(&self, stats: &str) {
        if !self.quiet {
            let marker = "Done. ".if_supports_color(Stream::Stdout, |text| text.green());
            self.print(&format!("{marker}{stats}\n"));
        }
    }

    /// Print a warning summary line in yellow. Never suppressed.
    pub fn warning(&self, message: &str) {
        let decorated = message.if_supports_color(Stream::Stdout, |text| text.yellow());
        self.print(&format!("{decorated}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_console_reports_quiet() {
        assert!(Console::new(true).is_quiet());
        assert!(!Console::new(false).is_quiet());
    }
}
