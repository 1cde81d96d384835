//! Quote detection
//!
//! A message is a quote when it ends with an attribution: an utterance, a dash
//! followed by a space, then an author name. Quotes often contain dashes of
//! their own, so only the rightmost occurrence of a separator splits.
//!
//! Separators are tried in a fixed priority order and the first kind that
//! occurs anywhere in the text wins, even if a lower-priority kind occurs
//! further right.

/// Attribution separators, highest priority first: hyphen, en dash, em dash
pub const SEPARATORS: [&str; 3] = ["- ", "\u{2013} ", "\u{2014} "];

/// Word that attributes a quote to its sender
const SELF_ATTRIBUTION: &str = "me";

/// An accepted quote split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction<'a> {
    /// Byte offset of the separator in the original text
    pub split: usize,
    pub separator: &'static str,
    /// Text before the separator
    pub body: &'a str,
    /// Trimmed text after the separator
    pub author_field: &'a str,
}

impl<'a> Extraction<'a> {
    /// Author the quote is attributed to
    ///
    /// A bare "me" (any case) means the sender, so their display name is
    /// returned instead.
    pub fn attributed_author(&self, sender_display_name: &'a str) -> &'a str {
        if self.author_field.eq_ignore_ascii_case(SELF_ATTRIBUTION) {
            sender_display_name
        } else {
            self.author_field
        }
    }
}

/// Byte offset and kind of the splitting separator, if any
pub fn find_split(text: &str) -> Option<(usize, &'static str)> {
    SEPARATORS
        .iter()
        .find_map(|sep| text.rfind(sep).map(|idx| (idx, *sep)))
}

/// Split a message into body and author field, `None` if it is not a quote
pub fn extract(text: &str) -> Option<Extraction<'_>> {
    let (split, separator) = find_split(text)?;
    Some(Extraction {
        split,
        separator,
        body: &text[..split],
        author_field: text[split + separator.len()..].trim(),
    })
}
