//! Identifier scraping for control-plane output.
//!
//! The CLI reports created resources in human-oriented sentences such as
//! `Connection added successfully: OpenAI-Main (ID: <uuid>)`. Only the shape
//! of the identifier is checked; version and variant bits are ignored.
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

const IDENTIFIER_PATTERN: &str = r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(IDENTIFIER_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("identifier pattern is valid")
});

/// Return the first UUID-shaped substring of `text`, scanning left to right.
pub fn extract_identifier(text: &str) -> Option<String> {
    IDENTIFIER_REGEX
        .find(text)
        .map(|found| found.as_str().to_string())
}
