/// Collapse every run of whitespace to a single space and trim both ends.
///
/// Example: `"  Welcome   to\n\tShady  Meadows B&B  "` → `"Welcome to Shady Meadows B&B"`
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize possibly-absent element text. Absence becomes the empty string.
pub fn normalize_text(text: Option<&str>) -> String {
    normalize_whitespace(text.unwrap_or_default())
}
