const MAX_ERROR_LENGTH: usize = 500;

/// Shorten an error message for a per-account failure marker, on a char
/// boundary.
pub fn truncate_error(error: &str) -> String {
    let error = error.trim();
    if error.chars().count() <= MAX_ERROR_LENGTH {
        return error.to_string();
    }
    let cut: String = error.chars().take(MAX_ERROR_LENGTH).collect();
    format!("{}...", cut)
}
