//! Cleanup passes for generated Markdown.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! Passes that touch prose leave fenced code blocks alone.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline. Fences must already be balanced.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.to_string();

    result = normalize_line_endings(&result);
    result = normalize_headings(&result);
    result = normalize_bullets(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);
    result = ensure_trailing_newline(&result);

    result
}

/// A line that opens or closes a fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fence {
    marker: char,
    len: usize,
    /// No info string after the marker run.
    bare: bool,
}

impl Fence {
    /// A closing fence uses the same marker, is at least as long as the
    /// opening one, and carries no info string.
    pub(crate) fn closes(&self, open: &Fence) -> bool {
        self.bare && self.marker == open.marker && self.len >= open.len
    }
}

/// Parse a fence line (three or more backticks or tildes).
pub(crate) fn fence(line: &str) -> Option<Fence> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    Some(Fence {
        marker,
        len,
        bare: trimmed[len..].trim().is_empty(),
    })
}

/// Apply `f` to every line outside fenced code blocks.
fn map_prose_lines<F>(md: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut open: Option<Fence> = None;
    let mut lines: Vec<String> = Vec::new();

    for line in md.split('\n') {
        match (open, fence(line)) {
            (None, Some(opening)) => {
                open = Some(opening);
                lines.push(line.to_string());
            }
            (Some(current), Some(closing)) if closing.closes(&current) => {
                open = None;
                lines.push(line.to_string());
            }
            (Some(_), _) => lines.push(line.to_string()),
            (None, None) => lines.push(f(line)),
        }
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(md: &str) -> String {
    md.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: ATX headings
// ---------------------------------------------------------------------------

/// Single space after the hashes, no closing hashes.
fn normalize_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(#{1,6})[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("valid regex")
    });

    map_prose_lines(md, |line| H_RE.replace(line, "$1 $2").to_string())
}

// ---------------------------------------------------------------------------
// Pass 3: Bullet markers
// ---------------------------------------------------------------------------

/// Use `-` for every unordered list item.
///
/// Lines made only of `*` or `+` markers are left as written, since
/// `* * *` is a thematic break rather than a list item.
fn normalize_bullets(md: &str) -> String {
    static BULLET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^([ \t]*)[*+][ \t]+").expect("valid regex"));
    static RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[ \t]*(?:(?:\*[ \t]*){3,}|(?:\+[ \t]*){3,})$").expect("valid regex")
    });

    map_prose_lines(md, |line| {
        if RULE_RE.is_match(line) {
            line.to_string()
        } else {
            BULLET_RE.replace(line, "$1- ").to_string()
        }
    })
}

// ---------------------------------------------------------------------------
// Pass 4: Trailing whitespace
// ---------------------------------------------------------------------------

fn normalize_whitespace(md: &str) -> String {
    map_prose_lines(md, |line| line.trim_end().to_string())
}

// ---------------------------------------------------------------------------
// Pass 5: Blank lines
// ---------------------------------------------------------------------------

/// Drop leading blank lines and collapse runs of blank prose lines to one.
fn clean_blank_lines(md: &str) -> String {
    let mut open: Option<Fence> = None;
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;

    for line in md.split('\n') {
        let parsed = fence(line);
        let in_code = open.is_some();

        match (open, parsed) {
            (None, Some(opening)) => open = Some(opening),
            (Some(current), Some(closing)) if closing.closes(&current) => open = None,
            _ => {}
        }

        if !in_code && parsed.is_none() && line.trim().is_empty() {
            if previous_blank {
                continue;
            }
            previous_blank = true;
        } else {
            previous_blank = false;
        }
        lines.push(line);
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 6: Trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_headings_collapses_spacing() {
        assert_eq!(normalize_headings("##   Impact"), "## Impact");
        assert_eq!(normalize_headings("# Summary ##"), "# Summary");
    }

    #[test]
    fn normalize_headings_ignores_hashtags() {
        let input = "#general was paged";
        assert_eq!(normalize_headings(input), input);
    }

    #[test]
    fn normalize_bullets_uses_dash() {
        let input = "* one\n  + nested\n- three\n**bold** text";
        assert_eq!(
            normalize_bullets(input),
            "- one\n  - nested\n- three\n**bold** text"
        );
    }

    #[test]
    fn code_blocks_are_untouched() {
        let input = "```\n* not a bullet   \n##  raw\n```";
        assert_eq!(normalize_bullets(input), input);
        assert_eq!(normalize_headings(input), input);
        assert_eq!(normalize_whitespace(input), input);
    }

    #[test]
    fn tilde_fence_does_not_close_backtick_fence() {
        let input = "```\n~~~\n* inside\n```\n* outside";
        assert_eq!(
            normalize_bullets(input),
            "```\n~~~\n* inside\n```\n- outside"
        );
    }

    #[test]
    fn normalize_bullets_keeps_thematic_breaks() {
        for rule in ["* * *", "***", "+ + +", "  *  *  *  "] {
            assert_eq!(normalize_bullets(rule), rule);
        }
        assert_eq!(
            normalize_bullets("Impact\n\n* * *\n\n* item"),
            "Impact\n\n* * *\n\n- item"
        );
    }

    #[test]
    fn fence_with_info_string_does_not_close_block() {
        let input = "```python\n* inside\n```python\n* still inside\n```\n* outside";
        assert_eq!(
            normalize_bullets(input),
            "```python\n* inside\n```python\n* still inside\n```\n- outside"
        );
    }

    #[test]
    fn longer_fence_needs_longer_close() {
        let input = "````\n```\n* inside\n````\n* outside";
        assert_eq!(
            normalize_bullets(input),
            "````\n```\n* inside\n````\n- outside"
        );
    }

    #[test]
    fn clean_blank_lines_collapses_runs() {
        let input = "\n\nLine 1\n\n\n\nLine 2\n";
        assert_eq!(clean_blank_lines(input), "Line 1\n\nLine 2\n");
    }

    #[test]
    fn clean_blank_lines_keeps_code_blank_lines() {
        let input = "a\n```\n\n\n\n```\nb";
        assert_eq!(clean_blank_lines(input), input);
    }

    #[test]
    fn normalize_line_endings_converts_crlf() {
        assert_eq!(normalize_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn ensure_trailing_newline_normalizes_multiple() {
        assert_eq!(ensure_trailing_newline("text\n\n\n"), "text\n");
        assert_eq!(ensure_trailing_newline("text"), "text\n");
    }

    #[test]
    fn full_pipeline_cleans_markdown() {
        let input = "\n#  Incident summary  \n\n\n\n* Router pods crashed   \n+ Rolled back\n";
        assert_eq!(
            run_pipeline(input),
            "# Incident summary\n\n- Router pods crashed\n- Rolled back\n"
        );
    }
}
