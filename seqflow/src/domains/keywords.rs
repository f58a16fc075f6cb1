//! Keyword matching used by fallbacks to stay request-specific.

/// A label and the lowercase words that indicate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyword {
    /// The canonical label reported on a match.
    pub label: &'static str,
    /// Single lowercase words that count as a match.
    pub aliases: &'static [&'static str],
}

impl Keyword {
    /// Creates a keyword entry.
    #[must_use]
    pub const fn new(label: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { label, aliases }
    }
}

/// Returns the labels of every keyword mentioned in `text`, in table order.
#[must_use]
pub fn find_keywords(text: &str, table: &[Keyword]) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|w| !w.is_empty())
        .collect();

    table
        .iter()
        .filter(|keyword| keyword.aliases.iter().any(|alias| words.contains(alias)))
        .map(|keyword| keyword.label)
        .collect()
}
