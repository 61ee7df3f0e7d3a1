//! Error formatting helpers

/// Maximum number of `source()` links followed when formatting a chain
const MAX_DEPTH: usize = 10;

/// Format an error together with its cause chain.
///
/// ```
/// use keystone_common::format_error;
///
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
/// assert_eq!(format_error(&err), "disk gone");
/// ```
pub fn format_error(error: &dyn std::error::Error) -> String {
    format_error_recursive(error, 0)
}

fn format_error_recursive(error: &dyn std::error::Error, depth: usize) -> String {
    if depth >= MAX_DEPTH {
        return error.to_string();
    }

    let base = error.to_string();

    match error.source() {
        Some(source) => format!("{} Caused by: {}", base, format_error_recursive(source, depth + 1)),
        None => base,
    }
}
