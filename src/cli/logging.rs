// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Console output helpers for the CLI.
//!
//! The library itself reports through `tracing`; these macros only format
//! what the `predict` command prints for a person at a terminal.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::{ColoredString, Colorize};

/// Global verbosity flag.
static VERBOSE: AtomicBool = AtomicBool::new(true);

/// Set the global verbosity flag.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Check if verbose output is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Colored one-word posture label.
#[must_use]
pub fn verdict_label(good: bool) -> ColoredString {
    if good {
        "good posture".green().bold()
    } else {
        "bad posture".red().bold()
    }
}

/// Macro for warning messages.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        use colored::Colorize;
        eprintln!("{} {}", "WARNING ⚠️".yellow().bold(), format!($($arg)*));
    }
}

/// Macro for error messages.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        use colored::Colorize;
        eprintln!("{} {}", "Error:".red().bold(), format!($($arg)*));
    }
}

/// Macro for verbose messages.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::cli::logging::is_verbose() {
            println!("{}", format!($($arg)*));
        }
    }
}

/// Macro for section headers.
#[macro_export]
macro_rules! section {
    ($($arg:tt)*) => {
        use colored::Colorize;
        if $crate::cli::logging::is_verbose() {
            println!();
            println!("{}", format!($($arg)*).cyan().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_toggle() {
        set_verbose(true);
        assert!(is_verbose());

        set_verbose(false);
        assert!(!is_verbose());

        set_verbose(true);
        assert!(is_verbose());
    }

    #[test]
    fn test_verdict_label_text() {
        colored::control::set_override(false);
        assert_eq!(verdict_label(true).to_string(), "good posture");
        assert_eq!(verdict_label(false).to_string(), "bad posture");
        colored::control::unset_override();
    }
}
