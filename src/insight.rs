//! Parser for the `Tags:` / `Importance:` reply format.
//!
//! The [`TemplateKind::ArticleInsight`](crate::prompt::TemplateKind) prompt
//! asks for exactly these two labelled lines. Replies are matched by label,
//! not by line position, and anything unexpected is an explicit error.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub tags: Vec<String>,
    /// 1 (minor) ..= 5 (major).
    pub importance: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsightError {
    #[error("reply has no '{0}:' line")]
    MissingLine(&'static str),
    #[error("reply lists no tags")]
    EmptyTags,
    #[error("importance '{0}' is not an integer from 1 to 5")]
    BadImportance(String),
}

pub fn parse_insight(text: &str) -> Result<Insight, InsightError> {
    let mut tags_line = None;
    let mut importance_line = None;

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '•', '#']).trim();
        if let Some(rest) = strip_label(line, "tags") {
            tags_line.get_or_insert(rest);
        } else if let Some(rest) = strip_label(line, "importance") {
            importance_line.get_or_insert(rest);
        }
    }

    let tags_line = tags_line.ok_or(InsightError::MissingLine("Tags"))?;
    let importance_line = importance_line.ok_or(InsightError::MissingLine("Importance"))?;

    let tags: Vec<String> = tags_line
        .split([',', '，'])
        .map(|t| t.trim().trim_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        return Err(InsightError::EmptyTags);
    }

    let raw = importance_line.trim_matches('*').trim();
    // Accept "4" and "4/5".
    let number = raw.split('/').next().unwrap_or(raw).trim();
    let importance = number
        .parse::<u8>()
        .ok()
        .filter(|n| (1..=5).contains(n))
        .ok_or_else(|| InsightError::BadImportance(raw.to_string()))?;

    Ok(Insight { tags, importance })
}

/// `"Tags: a, b"` → `Some("a, b")`; label match is case-insensitive and
/// tolerates markdown bold around the label.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim_start_matches('*');
    if line.len() < label.len() || !line.is_char_boundary(label.len()) {
        return None;
    }
    let (head, rest) = line.split_at(label.len());
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = rest.trim_start_matches('*').trim_start();
    rest.strip_prefix(':').map(|r| r.trim_start_matches('*').trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_reply() {
        let insight = parse_insight("Tags: semiconductors, exports, Korea\nImportance: 4").unwrap();
        assert_eq!(insight.tags, vec!["semiconductors", "exports", "Korea"]);
        assert_eq!(insight.importance, 4);
    }

    #[test]
    fn test_markdown_and_order_tolerated() {
        let reply = "Here you go:\n- **Importance:** 2/5\n- **Tags:** #ai, #policy\n";
        let insight = parse_insight(reply).unwrap();
        assert_eq!(insight.tags, vec!["ai", "policy"]);
        assert_eq!(insight.importance, 2);
    }

    #[test]
    fn test_missing_importance() {
        assert_eq!(
            parse_insight("Tags: a, b"),
            Err(InsightError::MissingLine("Importance"))
        );
    }

    #[test]
    fn test_out_of_range_importance() {
        assert_eq!(
            parse_insight("Tags: a\nImportance: 9"),
            Err(InsightError::BadImportance("9".to_string()))
        );
    }

    #[test]
    fn test_empty_tags() {
        assert_eq!(
            parse_insight("Tags: , ,\nImportance: 3"),
            Err(InsightError::EmptyTags)
        );
    }

    #[test]
    fn test_label_prefix_is_not_enough() {
        assert_eq!(
            parse_insight("Tagsline a\nImportance: 3"),
            Err(InsightError::MissingLine("Tags"))
        );
    }
}
