//! Token estimation for prompt-size logging.
//!
//! Uses a character-based heuristic: ~4 characters per token. JSON-heavy
//! telemetry slices tend to run a little over.

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
