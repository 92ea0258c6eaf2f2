//! Pattern matcher: turns content search hits into breakpoint candidates

use crate::common::config::EngineConfig;
use crate::common::Result;

use super::observer::ScriptDescriptor;
use super::DebuggerProtocol;

/// A location where a pattern was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub url: String,
    pub line: u32,
    /// UTF-16 offset within the line, as the debugger counts columns
    pub column: u32,
    pub pattern: String,
    pub line_text: String,
}

/// Search one script for one pattern
///
/// Errors are returned to the caller, which decides whether to log them.
pub async fn find_candidates<P: DebuggerProtocol + ?Sized>(
    protocol: &P,
    config: &EngineConfig,
    script: &ScriptDescriptor,
    pattern: &str,
) -> Result<Vec<MatchCandidate>> {
    let matches = protocol
        .search_in_content(&script.script_id, pattern, config.case_sensitive)
        .await?;

    let mut candidates = Vec::new();
    for m in matches {
        let columns = match m.column {
            Some(column) => vec![column],
            None => locate(&m.text, pattern, config.case_sensitive, config.all_occurrences),
        };

        if columns.is_empty() {
            tracing::debug!(url = %script.url, line = m.line, pattern, "Search hit not found in line text");
            continue;
        }

        candidates.extend(columns.into_iter().map(|column| MatchCandidate {
            url: script.url.clone(),
            line: m.line,
            column,
            pattern: pattern.to_string(),
            line_text: m.text.clone(),
        }));
    }

    Ok(candidates)
}

/// Offsets of `pattern` in `line`, in UTF-16 code units
///
/// Returns only the first occurrence unless `all` is set, in which case
/// every non-overlapping occurrence is returned.
pub fn locate(line: &str, pattern: &str, case_sensitive: bool, all: bool) -> Vec<u32> {
    let fold = |c: char| {
        if case_sensitive {
            c
        } else {
            c.to_lowercase().next().unwrap_or(c)
        }
    };

    let haystack: Vec<char> = line.chars().collect();
    let needle: Vec<char> = pattern.chars().map(fold).collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    let mut offsets = Vec::new();
    let mut utf16 = 0u32;
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        let window = &haystack[i..i + needle.len()];
        if window.iter().zip(&needle).all(|(&h, &n)| fold(h) == n) {
            offsets.push(utf16);
            if !all {
                break;
            }
            utf16 += window.iter().map(|c| c.len_utf16() as u32).sum::<u32>();
            i += needle.len();
        } else {
            utf16 += haystack[i].len_utf16() as u32;
            i += 1;
        }
    }
    offsets
}

/// Longest line text shown in logs
pub const EXCERPT_CHARS: usize = 80;

/// Short rendering of `line` around a UTF-16 `column`, for logging
///
/// Lines that fit are returned trimmed. Longer ones (minified bundles are
/// often a single line) are cut to a window that starts a little before the
/// column, with `...` marking the cut ends.
pub fn excerpt(line: &str, column: u32) -> String {
    let total = line.chars().count();
    if total <= EXCERPT_CHARS {
        return line.trim().to_string();
    }

    let mut units = 0u32;
    let at = line
        .chars()
        .take_while(|c| {
            let before = units < column;
            units += c.len_utf16() as u32;
            before
        })
        .count();
    let start = at
        .saturating_sub(EXCERPT_CHARS / 4)
        .min(total - EXCERPT_CHARS);
    let window: String = line.chars().skip(start).take(EXCERPT_CHARS).collect();

    let mut out = String::with_capacity(window.len() + 6);
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(window.trim());
    if start + EXCERPT_CHARS < total {
        out.push_str("...");
    }
    out
}
