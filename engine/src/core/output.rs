//! Normalization of raw tool output into assertion-ready text.

use std::sync::LazyLock;

use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
        .unwrap_or_else(|err| panic!("ansi escape regex: {err}"))
});

/// Decode raw bytes lossily, drop ANSI escape sequences and normalize line endings.
///
/// `-no-color` already suppresses coloring, but plugins and wrappers do not
/// always honor it.
pub fn normalize_output(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let stripped = ANSI_ESCAPE.replace_all(&text, "");
    stripped.replace("\r\n", "\n")
}

/// The last `lines` lines of `text`, for failure diagnostics.
pub fn output_tail(text: &str, lines: usize) -> String {
    if lines == 0 {
        return String::new();
    }
    let trimmed = text.trim_end_matches('\n');
    let all: Vec<&str> = trimmed.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
