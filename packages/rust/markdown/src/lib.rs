//! Markdown normalization for generated summaries.
//!
//! [`normalize`] rejects text that cannot be treated as Markdown and
//! otherwise canonicalizes it through a series of cleanup passes.

mod cleanup;

use tracing::{debug, instrument};

use summarizer_shared::{Result, SummarizerError};

/// Canonicalize `text` as Markdown.
///
/// Fails with [`SummarizerError::Conversion`] on NUL bytes or an
/// unterminated code fence. Blank input normalizes to an empty string.
#[instrument(skip_all, fields(len = text.len()))]
pub fn normalize(text: &str) -> Result<String> {
    if text.contains('\0') {
        return Err(SummarizerError::Conversion(
            "text contains NUL bytes".into(),
        ));
    }

    if let Some(line) = unterminated_fence(text) {
        return Err(SummarizerError::Conversion(format!(
            "unterminated code fence opened on line {line}"
        )));
    }

    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let result = cleanup::run_pipeline(text);
    debug!(final_len = result.len(), "markdown normalized");
    Ok(result)
}

/// 1-based line of a fence that is never closed.
fn unterminated_fence(text: &str) -> Option<usize> {
    let mut open: Option<(cleanup::Fence, usize)> = None;

    for (idx, line) in text.lines().enumerate() {
        let Some(parsed) = cleanup::fence(line) else {
            continue;
        };
        match open {
            None => open = Some((parsed, idx + 1)),
            Some((current, _)) if parsed.closes(&current) => open = None,
            Some(_) => {}
        }
    }

    open.map(|(_, line)| line)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_canonicalizes_summary() {
        let input = "##Impact\n\n*  Ingress unavailable   \n\n\n\n## Resolution\n+ Rolled back";
        let result = normalize(input).unwrap();
        assert_eq!(
            result,
            "##Impact\n\n- Ingress unavailable\n\n## Resolution\n- Rolled back\n"
        );
    }

    #[test]
    fn normalize_is_stable() {
        let once = normalize("# Title\n\n* a\n* b\n\n```\ncode\n```").unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unterminated_fence_is_conversion_error() {
        let err = normalize("Summary\n\n```\nlog line").unwrap_err();
        assert!(matches!(err, SummarizerError::Conversion(ref m) if m.contains("line 3")));
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let err = normalize("bad\0text").unwrap_err();
        assert!(matches!(err, SummarizerError::Conversion(_)));
    }

    #[test]
    fn blank_input_normalizes_to_empty() {
        assert_eq!(normalize("  \n\n").unwrap(), "");
    }

    #[test]
    fn horizontal_rule_survives_normalization() {
        let result = normalize("Impact\n\n* * *\n\nResolution").unwrap();
        assert_eq!(result, "Impact\n\n* * *\n\nResolution\n");
    }

    #[test]
    fn info_string_line_does_not_close_fence() {
        assert!(normalize("```python\nprint(1)\n```").is_ok());
        let err = normalize("```\nlog line\n```python\n").unwrap_err();
        assert!(matches!(err, SummarizerError::Conversion(ref m) if m.contains("line 1")));
    }

    #[test]
    fn mixed_fence_markers_pair_correctly() {
        assert!(normalize("~~~\n```\n~~~").is_ok());
        assert!(normalize("~~~\n```\n").is_err());
    }
}
