//! Term extraction shared by the catalog index and incoming queries.
//!
//! Catalog paths look like `Web/JavaScript/Reference/Global_Objects/Array/flatMap`
//! and queries look like `Array.flatMap` or `array flat map`; both go through the
//! same lowercase + split-on-non-alphanumeric pass so they meet in one term space.

/// Lowercase and split on anything that is not alphanumeric. Empty fragments are
/// dropped; single characters are kept because element pages such as
/// `Web/HTML/Element/a` are only reachable through them.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Tokenize and deduplicate, keeping first-seen order.
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text).into_iter().filter(|t| seen.insert(t.clone())).collect()
}
