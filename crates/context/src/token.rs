//! Token estimation.
//!
//! ~4 characters per token is close enough for budgeting English prose;
//! budgets downstream leave headroom rather than relying on exact counts.

const CHARS_PER_TOKEN: usize = 4;

/// Estimated token count for a text.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}
