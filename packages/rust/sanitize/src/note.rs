//! Event note scrubbing.
//!
//! Each pass is a function `&str -> String` applied in sequence. Notes often
//! carry pasted log output and monitoring links that are large and useless
//! to a summarizer; those are replaced by short placeholders.

use std::sync::LazyLock;

use regex::Regex;

/// Replaces a fenced code/log block.
pub const CODE_BLOCK_PLACEHOLDER: &str = "[code block/log snippet]";

/// Replaces a diagnostics-vendor URL.
pub const VENDOR_URL_PLACEHOLDER: &str = "[dynatrace url]";

const FENCE: &str = "```";

/// Run every cleaning pass over a note.
pub fn clean_note(text: &str) -> String {
    let mut result = isolate_fences(text);

    result = replace_vendor_urls(&result);
    result = unwrap_link_markup(&result);
    result = strip_code_blocks(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Put every fence marker on its own line
// ---------------------------------------------------------------------------

/// Split lines so each fence marker stands alone, keeping the original
/// line's indentation on the fence. Lines without a fence are untouched.
pub fn isolate_fences(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in text.split('\n') {
        if !line.contains(FENCE) {
            lines.push(line.to_string());
            continue;
        }

        let indent = leading_whitespace(line);
        let mut pieces = line.split(FENCE);

        if let Some(first) = pieces.next() {
            if !first.trim().is_empty() {
                lines.push(first.to_string());
            }
        }
        for piece in pieces {
            lines.push(format!("{indent}{FENCE}"));
            if !piece.trim().is_empty() {
                lines.push(piece.to_string());
            }
        }
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Vendor URLs
// ---------------------------------------------------------------------------

/// Replace any whitespace-delimited token holding a dynatrace URL.
///
/// Characters glued to the URL (`<`, `(`, link markup) go with it.
pub fn replace_vendor_urls(text: &str) -> String {
    static VENDOR_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\S*https?://\S*dynatrace\S*").expect("valid regex")
    });

    VENDOR_RE.replace_all(text, VENDOR_URL_PLACEHOLDER).to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Link markup
// ---------------------------------------------------------------------------

/// Replace chat-style `<url|display text>` links with the display text.
pub fn unwrap_link_markup(text: &str) -> String {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"<[^\s|<>]+\|([^<>\r\n\t\f\v]+)>").expect("valid regex")
    });

    LINK_RE.replace_all(text, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Drop fenced blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Outside,
    Inside,
}

/// Replace every fenced block with one placeholder line.
///
/// Expects fences already isolated by [`isolate_fences`]. An unterminated
/// block swallows the rest of the note.
pub fn strip_code_blocks(text: &str) -> String {
    let mut state = BlockState::Outside;
    let mut lines: Vec<String> = Vec::new();

    for line in text.split('\n') {
        let is_fence = line.trim() == FENCE;

        match (state, is_fence) {
            (BlockState::Outside, true) => {
                let indent = leading_whitespace(line);
                lines.push(format!("{indent}{CODE_BLOCK_PLACEHOLDER}"));
                state = BlockState::Inside;
            }
            (BlockState::Outside, false) => lines.push(line.to_string()),
            (BlockState::Inside, true) => state = BlockState::Outside,
            (BlockState::Inside, false) => {}
        }
    }

    lines.join("\n")
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
