//! Shared utility functions.

use std::time::Duration;

/// Format a short duration in human-readable form.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use kvprobe::utils::format_elapsed;
///
/// assert_eq!(format_elapsed(Duration::from_millis(7)), "7ms");
/// assert_eq!(format_elapsed(Duration::from_millis(1250)), "1.25s");
/// assert_eq!(format_elapsed(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_elapsed(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Join CLI tokens into one command line.
///
/// Tokens are joined by a single space; the wire protocol has no quoting.
#[must_use]
pub fn join_command(tokens: &[String]) -> String {
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0ms");
        assert_eq!(format_elapsed(Duration::from_millis(999)), "999ms");
        assert_eq!(format_elapsed(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "59.00s");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "60m 0s");
    }

    #[test]
    fn test_join_command() {
        let tokens = vec!["SET".to_string(), "k".to_string(), "v".to_string()];
        assert_eq!(join_command(&tokens), "SET k v");
        assert_eq!(join_command(&[]), "");
    }
}
