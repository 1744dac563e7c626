//! Small markdown field grammar shared by the dependency and maintenance parsers.
//!
//! Two shapes are recognized:
//! - field lines: `**Key**: value` or `Key: value`, optional list bullet,
//!   value cut at an inline comment marker;
//! - inline tokens: `[key=value]`, anywhere on a line, in any order.

use regex::Regex;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z][A-Za-z0-9_-]*)=([^\]]*)\]").expect("token regex"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+").expect("bullet regex"));

const COMMENT_MARKERS: &[&str] = &["<!--", " #", "//"];
const PLACEHOLDER_MARKERS: &[&str] = &["[", "<", "{{", "TODO", "TBD"];

/// Build the matcher for one field name. Case-insensitive; the key may be
/// wrapped in `**` with the colon inside or outside the emphasis.
fn field_regex(key: &str) -> Regex {
    let key = regex::escape(key).replace(' ', r"\s+");
    let pattern = format!(
        r"(?i)^\s*(?:[-*+]\s+)?(?:\*\*{key}\*\*\s*:|\*\*{key}\s*:\*\*|{key}\s*:)(.*)$"
    );
    Regex::new(&pattern).expect("field regex")
}

/// Value of the first line carrying `key`, with any trailing comment removed
/// and whitespace trimmed. `None` when no line declares the field.
pub fn field_value(doc: &str, key: &str) -> Option<String> {
    let re = field_regex(key);
    doc.lines().find_map(|line| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| strip_comment(m.as_str()).trim().to_string())
    })
}

pub fn strip_comment(value: &str) -> &str {
    let cut = COMMENT_MARKERS
        .iter()
        .filter_map(|m| value.find(m))
        .min()
        .unwrap_or(value.len());
    &value[..cut]
}

/// Template text that was never filled in.
pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_MARKERS.iter().any(|m| value.contains(m))
}

/// Comma-separated list, entries trimmed, empties dropped.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A bullet line split into its `[key=value]` tokens and the remaining text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLine {
    pub tokens: Vec<(String, String)>,
    pub text: String,
}

impl TokenLine {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

pub fn is_bullet(line: &str) -> bool {
    BULLET_RE.is_match(line)
}

/// Tokenize a bullet line. The display text is the line without the bullet
/// marker and tokens, with whitespace collapsed.
pub fn tokenize_line(line: &str) -> TokenLine {
    let tokens = TOKEN_RE
        .captures_iter(line)
        .map(|c| (c[1].to_string(), c[2].trim().to_string()))
        .collect();
    let without_bullet = BULLET_RE.replace(line, "");
    let stripped = TOKEN_RE.replace_all(&without_bullet, " ");
    let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    TokenLine { tokens, text }
}

/// Lines of the `## <heading>` section, up to the next `## ` heading or end
/// of document. Each entry carries its 1-based line number.
pub fn section<'a>(doc: &'a str, heading: &str) -> Option<Vec<(usize, &'a str)>> {
    let mut lines = doc.lines().enumerate();
    lines.find(|(_, l)| {
        l.trim_end()
            .strip_prefix("## ")
            .is_some_and(|h| h.trim().eq_ignore_ascii_case(heading))
    })?;
    Some(
        lines
            .take_while(|(_, l)| !l.starts_with("## "))
            .map(|(i, l)| (i + 1, l))
            .collect(),
    )
}
