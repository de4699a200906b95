//! UI utilities for consistent terminal output formatting.
//!
//! Provides shared formatting functions for error messages and status output.
//! Everything here writes to stderr so stdout stays a clean transcript.

use crate::error::Error;

/// Width of error box separators.
const ERROR_BOX_WIDTH: usize = 60;

/// Print an error box with a title and optional detail.
///
/// # Example
///
/// ```ignore
/// print_error_box("Connection Refused", Some("connection to 127.0.0.1:2000 refused"));
/// ```
///
/// Outputs:
/// ```text
/// ============================================================
/// Connection Refused
/// ============================================================
///
/// connection to 127.0.0.1:2000 refused
/// ```
pub fn print_error_box(title: &str, detail: Option<&str>) {
    eprintln!("\n{}", "=".repeat(ERROR_BOX_WIDTH));
    eprintln!("{title}");
    eprintln!("{}", "=".repeat(ERROR_BOX_WIDTH));

    if let Some(detail) = detail
        && !detail.is_empty()
    {
        eprintln!("\n{detail}");
    }
}

/// Print an error box followed by numbered troubleshooting hints.
pub fn print_error_box_with_hints(title: &str, detail: Option<&str>, hints: &[String]) {
    print_error_box(title, detail);

    if !hints.is_empty() {
        eprintln!("\nPlease check:");
        for (i, hint) in hints.iter().enumerate() {
            eprintln!("  {}. {hint}", i + 1);
        }
        eprintln!();
    }
}

/// Report a harness error with its title and hints.
pub fn report_error(err: &Error) {
    print_error_box_with_hints(err.title(), Some(&err.to_string()), &err.hints());
}
