//! Author display-name formatting

use crate::error::{HarvestError, Result};

/// Canonical display form of an author name
///
/// Each whitespace-separated token gets an upper-cased first character; the
/// rest of the token is kept exactly as typed. Tokens are rejoined with single
/// spaces.
pub fn display_name(raw: &str) -> Result<String> {
    let tokens: Vec<String> = raw.split_whitespace().map(capitalize_first).collect();
    if tokens.is_empty() {
        return Err(HarvestError::EmptyName);
    }
    Ok(tokens.join(" "))
}

fn capitalize_first(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
